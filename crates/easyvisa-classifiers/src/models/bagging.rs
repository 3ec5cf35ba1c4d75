//! Bootstrap ensembles of `linfa-trees` decision trees: bagging and random forest.
//!
//! Every member is fit on a bootstrap sample of the rows restricted to a
//! subset of the columns. Samples are drawn up front from one seeded RNG, so
//! the ensemble is reproducible even though members are fit in parallel.
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::{BaggingParams, ForestParams, TreeParams};
use crate::data_handling::validate_xy;
use crate::error::{BenchError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::decision_tree::{fit_weighted_tree, predict_tree, tree_importances, Tree};
use crate::models::utils::{
    bootstrap_indices, normalize, out_of_bag, sample_features, sample_weights, share_of,
};

struct Member {
    tree: Tree,
    columns: Vec<usize>,
}

struct DrawnSample {
    rows: Vec<usize>,
    columns: Vec<usize>,
}

/// Fitted ensemble shared by both bootstrap families.
struct TreeEnsemble {
    members: Vec<Member>,
    n_features: usize,
}

impl TreeEnsemble {
    fn fit(
        x: ArrayView2<f64>,
        y: ArrayView1<usize>,
        weights: &Array1<f32>,
        samples: &[DrawnSample],
        tree_params: &TreeParams,
        model: &str,
    ) -> Result<Self> {
        let members = samples
            .par_iter()
            .map(|s| {
                let xs = x.select(Axis(0), &s.rows).select(Axis(1), &s.columns);
                let ys = y.select(Axis(0), &s.rows);
                let ws = weights.select(Axis(0), &s.rows);
                let tree = fit_weighted_tree(xs.view(), ys.view(), ws, tree_params, model)?;
                Ok(Member {
                    tree,
                    columns: s.columns.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TreeEnsemble {
            members,
            n_features: x.ncols(),
        })
    }

    fn member_votes(member: &Member, x: ArrayView2<f64>) -> Array1<usize> {
        let xs = x.select(Axis(1), &member.columns);
        predict_tree(&member.tree, xs.view())
    }

    /// Share of members voting for the positive class.
    fn vote_fraction(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(BenchError::invalid(
                "features",
                format!("model was fit on {} columns, got {}", self.n_features, x.ncols()),
            ));
        }
        let mut positive = Array1::<f64>::zeros(x.nrows());
        for member in &self.members {
            let votes = Self::member_votes(member, x);
            positive.zip_mut_with(&votes, |acc, &v| *acc += v as f64);
        }
        Ok(positive / self.members.len() as f64)
    }

    /// Mean of member importances, each mapped back to the full column space.
    fn importances(&self) -> Array1<f64> {
        let mut total = Array1::<f64>::zeros(self.n_features);
        for member in &self.members {
            let local = tree_importances(&member.tree);
            for (&column, &value) in member.columns.iter().zip(local.iter()) {
                total[column] += value;
            }
        }
        normalize(total / self.members.len() as f64)
    }
}

fn unfitted(model: &str) -> BenchError {
    BenchError::UnfittedModel {
        model: model.to_string(),
    }
}

/// Bagging of unpruned decision trees.
pub struct BaggingClassifier {
    params: BaggingParams,
    ensemble: Option<TreeEnsemble>,
}

impl BaggingClassifier {
    pub fn new(params: BaggingParams) -> Self {
        BaggingClassifier {
            params,
            ensemble: None,
        }
    }
}

impl Classifier for BaggingClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<()> {
        validate_xy(x, y)?;
        if self.params.n_estimators == 0 {
            return Err(BenchError::invalid("n_estimators", "must be at least 1"));
        }
        let (n, p) = (x.nrows(), x.ncols());
        let n_rows = share_of(self.params.max_samples, n);
        let n_columns = share_of(self.params.max_features, p).min(p);

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let samples: Vec<DrawnSample> = (0..self.params.n_estimators)
            .map(|_| DrawnSample {
                rows: bootstrap_indices(n, n_rows, &mut rng),
                columns: sample_features(p, n_columns, &mut rng),
            })
            .collect();

        let weights = Array1::<f32>::ones(n);
        let ensemble = TreeEnsemble::fit(x, y, &weights, &samples, &TreeParams::default(), self.name())?;
        log::debug!(
            "Fitted bagging ensemble: {} trees, {} rows x {} columns each",
            ensemble.members.len(),
            n_rows,
            n_columns
        );
        self.ensemble = Some(ensemble);
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.ensemble
            .as_ref()
            .ok_or_else(|| unfitted(self.name()))?
            .vote_fraction(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.ensemble.as_ref().map(TreeEnsemble::importances)
    }

    fn name(&self) -> &str {
        "bagging"
    }
}

/// Random forest: bootstrap rows and a random feature subspace per tree.
pub struct RandomForestClassifier {
    params: ForestParams,
    ensemble: Option<TreeEnsemble>,
    oob_accuracy: Option<f64>,
}

impl RandomForestClassifier {
    pub fn new(params: ForestParams) -> Self {
        RandomForestClassifier {
            params,
            ensemble: None,
            oob_accuracy: None,
        }
    }

    /// Out-of-bag accuracy, when the forest was fit with `oob_score`.
    pub fn oob_accuracy(&self) -> Option<f64> {
        self.oob_accuracy
    }

    fn compute_oob_accuracy(
        ensemble: &TreeEnsemble,
        samples: &[DrawnSample],
        x: ArrayView2<f64>,
        y: ArrayView1<usize>,
    ) -> Option<f64> {
        let n = x.nrows();
        let mut votes = vec![(0usize, 0usize); n];
        for (member, sample) in ensemble.members.iter().zip(samples) {
            let held_out = out_of_bag(n, &sample.rows);
            if held_out.is_empty() {
                continue;
            }
            let xs = x.select(Axis(0), &held_out);
            let predicted = TreeEnsemble::member_votes(member, xs.view());
            for (&row, &label) in held_out.iter().zip(predicted.iter()) {
                votes[row].0 += 1;
                votes[row].1 += label;
            }
        }
        let scored: Vec<(usize, bool)> = votes
            .iter()
            .enumerate()
            .filter(|(_, (total, _))| *total > 0)
            .map(|(row, &(total, positive))| (row, 2 * positive > total))
            .collect();
        if scored.is_empty() {
            return None;
        }
        let correct = scored
            .iter()
            .filter(|&&(row, predicted)| usize::from(predicted) == y[row])
            .count();
        Some(correct as f64 / scored.len() as f64)
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<()> {
        validate_xy(x, y)?;
        if self.params.n_estimators == 0 {
            return Err(BenchError::invalid("n_estimators", "must be at least 1"));
        }
        let (n, p) = (x.nrows(), x.ncols());
        let n_columns = self.params.max_features.resolve(p);

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let samples: Vec<DrawnSample> = (0..self.params.n_estimators)
            .map(|_| DrawnSample {
                rows: bootstrap_indices(n, n, &mut rng),
                columns: sample_features(p, n_columns, &mut rng),
            })
            .collect();

        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            class_weight: self.params.class_weight,
            ..TreeParams::default()
        };
        let weights = sample_weights(y, self.params.class_weight);
        let ensemble = TreeEnsemble::fit(x, y, &weights, &samples, &tree_params, self.name())?;

        self.oob_accuracy = if self.params.oob_score {
            let score = Self::compute_oob_accuracy(&ensemble, &samples, x, y);
            match score {
                Some(s) => log::info!("Random forest out-of-bag accuracy: {:.4}", s),
                None => log::warn!("No out-of-bag rows; out-of-bag accuracy is undefined"),
            }
            score
        } else {
            None
        };
        log::debug!(
            "Fitted random forest: {} trees, {} of {} columns each",
            ensemble.members.len(),
            n_columns,
            p
        );
        self.ensemble = Some(ensemble);
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.ensemble
            .as_ref()
            .ok_or_else(|| unfitted(self.name()))?
            .vote_fraction(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.ensemble.as_ref().map(TreeEnsemble::importances)
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaxFeatures;
    use ndarray::Array2;

    fn data() -> (Array2<f64>, Array1<usize>) {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| match j {
            0 => i as f64,
            1 => (i * 7 % 11) as f64,
            _ => (i % 2) as f64,
        });
        let y = Array1::from_shape_fn(60, |i| usize::from(i >= 30));
        (x, y)
    }

    #[test]
    fn bagging_is_reproducible_for_a_seed() {
        let (x, y) = data();
        let params = BaggingParams {
            n_estimators: 8,
            max_samples: 0.8,
            ..BaggingParams::default()
        };
        let mut a = BaggingClassifier::new(params.clone());
        let mut b = BaggingClassifier::new(params);
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(
            a.predict_proba(x.view()).unwrap(),
            b.predict_proba(x.view()).unwrap()
        );
        let importances = a.feature_importances().unwrap();
        assert_eq!(importances.len(), 3);
        assert!((importances.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn forest_probabilities_are_vote_shares() {
        let (x, y) = data();
        let mut forest = RandomForestClassifier::new(ForestParams {
            n_estimators: 10,
            max_features: MaxFeatures::All,
            oob_score: true,
            ..ForestParams::default()
        });
        forest.fit(x.view(), y.view()).unwrap();
        let proba = forest.predict_proba(x.view()).unwrap();
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
        let predicted = forest.predict(x.view()).unwrap();
        let correct = predicted.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 54);
        let oob = forest.oob_accuracy().unwrap();
        assert!(oob > 0.8);
    }

    #[test]
    fn unfitted_forest_refuses_to_predict() {
        let forest = RandomForestClassifier::new(ForestParams::default());
        let x = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            forest.predict_proba(x.view()),
            Err(BenchError::UnfittedModel { .. })
        ));
    }
}
