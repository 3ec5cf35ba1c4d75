use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{ClassifierSpec, GradientBoostingParams, XGBoostParams};
use crate::data_handling::validate_xy;
use crate::error::{BenchError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::factory::build_model;
use crate::models::utils::{sample_features, share_of};

/// Settings passed through to the `gbdt` crate.
#[derive(Debug, Clone, PartialEq)]
struct BoostSettings {
    iterations: usize,
    shrinkage: f64,
    max_depth: usize,
    data_sample_ratio: f64,
    feature_sample_ratio: f64,
    min_leaf_size: usize,
    /// Sample weight of positive rows; negatives weigh 1.
    positive_weight: f64,
    seed: u64,
    init: Option<ClassifierSpec>,
}

/// Starting margin for a probability under the log-likelihood loss, which
/// maps a margin `f` to `1 / (1 + exp(-2f))`.
fn initial_margin(p: f64) -> f32 {
    let p = p.clamp(1e-6, 1.0 - 1e-6);
    (0.5 * (p / (1.0 - p)).ln()) as f32
}

/// Log-likelihood GBDT shared by both boosting families.
///
/// Row and column subsampling is drawn once per fit from a seeded generator and
/// the backend always trains on the full subset, so a fit is reproducible.
struct BoostedTrees {
    settings: BoostSettings,
    model: Option<GBDT>,
    init: Option<Box<dyn Classifier>>,
    n_features: usize,
    columns: Vec<usize>,
}

impl BoostedTrees {
    fn new(settings: BoostSettings) -> Self {
        BoostedTrees {
            settings,
            model: None,
            init: None,
            n_features: 0,
            columns: Vec::new(),
        }
    }

    /// Starting margins of `x`'s rows: the init estimator's, or none.
    fn initial_guesses(&self, x: ArrayView2<f64>) -> Result<Option<Array1<f32>>> {
        match &self.init {
            Some(init) => Ok(Some(init.predict_proba(x)?.mapv(initial_margin))),
            None => Ok(None),
        }
    }

    fn rows_to_data(&self, x: ArrayView2<f64>, guesses: Option<&Array1<f32>>) -> DataVec {
        let selected: Array2<f64> = x.select(Axis(1), &self.columns);
        let mut data = DataVec::with_capacity(selected.nrows());
        for (i, row) in selected.outer_iter().enumerate() {
            let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
            data.push(match guesses {
                Some(g) => Data::new_training_data(features, 1.0, 0.0, Some(g[i])),
                None => Data::new_test_data(features, None),
            });
        }
        data
    }

    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<()> {
        validate_xy(x, y)?;
        let s = self.settings.clone();
        let mut rng = StdRng::seed_from_u64(s.seed);

        let n_rows = share_of(s.data_sample_ratio, x.nrows()).min(x.nrows());
        let rows = sample_features(x.nrows(), n_rows, &mut rng);
        let n_cols = share_of(s.feature_sample_ratio, x.ncols()).min(x.ncols());
        self.columns = sample_features(x.ncols(), n_cols, &mut rng);
        self.n_features = x.ncols();

        self.init = match &s.init {
            Some(spec) => {
                let mut init = build_model(spec)?;
                init.fit(x, y)?;
                Some(init)
            }
            None => None,
        };

        let x_rows = x.select(Axis(0), &rows);
        let y_rows = y.select(Axis(0), &rows);
        let guesses = self.initial_guesses(x_rows.view())?;

        let mut config = Config::new();
        config.set_feature_size(self.columns.len());
        config.set_shrinkage(s.shrinkage as f32);
        config.set_max_depth(s.max_depth as u32);
        config.set_iterations(s.iterations);
        config.set_data_sample_ratio(1.0);
        config.set_feature_sample_ratio(1.0);
        config.set_min_leaf_size(s.min_leaf_size);
        config.set_debug(false);
        config.set_training_optimization_level(2);
        config.set_loss("LogLikelyhood");
        config.enabled_initial_guess(guesses.is_some());

        let mut gbdt = GBDT::new(&config);

        // log-likelihood loss expects labels in {-1, 1}
        let selected = x_rows.select(Axis(1), &self.columns);
        let mut train_x = DataVec::with_capacity(selected.nrows());
        for (i, (row, &label)) in selected.outer_iter().zip(y_rows.iter()).enumerate() {
            let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
            let (target, weight) = if label == 1 {
                (1.0, s.positive_weight as f32)
            } else {
                (-1.0, 1.0)
            };
            let guess = guesses.as_ref().map(|g| g[i]);
            train_x.push(Data::new_training_data(features, weight, target, guess));
        }

        gbdt.fit(&mut train_x);

        self.model = Some(gbdt);
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>, model_name: &str) -> Result<Array1<f64>> {
        let gbdt = self.model.as_ref().ok_or_else(|| BenchError::UnfittedModel {
            model: model_name.to_string(),
        })?;
        if x.ncols() != self.n_features {
            return Err(BenchError::invalid(
                "features",
                format!("model was fit on {} columns, got {}", self.n_features, x.ncols()),
            ));
        }
        let guesses = self.initial_guesses(x)?;
        let test_x = self.rows_to_data(x, guesses.as_ref());
        let predictions = gbdt.predict(&test_x);
        Ok(predictions.into_iter().map(f64::from).collect())
    }
}

/// Gradient boosting with log-likelihood loss.
pub struct GradientBoostingClassifier {
    inner: BoostedTrees,
}

impl GradientBoostingClassifier {
    pub fn new(params: GradientBoostingParams) -> Self {
        GradientBoostingClassifier {
            inner: BoostedTrees::new(BoostSettings {
                iterations: params.n_estimators,
                shrinkage: params.learning_rate,
                max_depth: params.max_depth,
                data_sample_ratio: params.subsample,
                feature_sample_ratio: params.max_features,
                min_leaf_size: 1,
                positive_weight: 1.0,
                seed: params.seed,
                init: params.init.map(|spec| *spec),
            }),
        }
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<()> {
        self.inner.fit(x, y)?;
        log::debug!(
            "Fitted gradient boosting: {} rounds, depth {}",
            self.inner.settings.iterations,
            self.inner.settings.max_depth
        );
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.inner.predict_proba(x, self.name())
    }

    fn name(&self) -> &str {
        "gradient_boosting"
    }
}

/// Extreme gradient boosting: the same booster with seeded row and column
/// subsampling and a weight on the positive class.
pub struct XGBoostClassifier {
    inner: BoostedTrees,
}

impl XGBoostClassifier {
    pub fn new(params: XGBoostParams) -> Self {
        XGBoostClassifier {
            inner: BoostedTrees::new(BoostSettings {
                iterations: params.n_estimators,
                shrinkage: params.learning_rate,
                max_depth: params.max_depth,
                data_sample_ratio: params.subsample,
                feature_sample_ratio: params.colsample_bytree,
                min_leaf_size: params.min_child_samples,
                positive_weight: params.scale_pos_weight,
                seed: params.seed,
                init: None,
            }),
        }
    }
}

impl Classifier for XGBoostClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<()> {
        self.inner.fit(x, y)?;
        log::debug!(
            "Fitted xgboost-style booster: {} rounds, depth {}, positive weight {}",
            self.inner.settings.iterations,
            self.inner.settings.max_depth,
            self.inner.settings.positive_weight
        );
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.inner.predict_proba(x, self.name())
    }

    fn name(&self) -> &str {
        "xgboost"
    }
}
