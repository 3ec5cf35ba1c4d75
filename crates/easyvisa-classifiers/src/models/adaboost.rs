//! Discrete AdaBoost (SAMME with two classes) over weighted `linfa-trees` learners.
use ndarray::{Array1, ArrayView1, ArrayView2, Zip};

use crate::config::{AdaBoostParams, TreeParams};
use crate::data_handling::validate_xy;
use crate::error::{BenchError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::decision_tree::{fit_tree_with_limits, predict_tree, tree_importances, Tree};
use crate::models::utils::{normalize, sample_weights};

const MIN_LEAF_WEIGHT: f32 = 1e-3;

struct WeakLearner {
    tree: Tree,
    alpha: f64,
}

pub struct AdaBoostClassifier {
    params: AdaBoostParams,
    learners: Vec<WeakLearner>,
}

impl AdaBoostClassifier {
    pub fn new(params: AdaBoostParams) -> Self {
        AdaBoostClassifier {
            params,
            learners: Vec::new(),
        }
    }

    /// Number of boosting rounds actually kept; may stop early.
    pub fn n_learners(&self) -> usize {
        self.learners.len()
    }

    /// Weighted vote in [-1, 1]; positive means certified.
    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if self.learners.is_empty() {
            return Err(BenchError::UnfittedModel {
                model: self.name().to_string(),
            });
        }
        let mut score = Array1::<f64>::zeros(x.nrows());
        let mut total_alpha = 0.0;
        for learner in &self.learners {
            let votes = predict_tree(&learner.tree, x);
            score.zip_mut_with(&votes, |s, &v| {
                *s += if v == 1 { learner.alpha } else { -learner.alpha }
            });
            total_alpha += learner.alpha;
        }
        Ok(score / total_alpha)
    }
}

impl Classifier for AdaBoostClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<()> {
        validate_xy(x, y)?;
        if self.params.n_estimators == 0 {
            return Err(BenchError::invalid("n_estimators", "must be at least 1"));
        }
        let n = y.len();
        let tree_params = TreeParams {
            max_depth: Some(self.params.base_max_depth),
            ..TreeParams::default()
        };
        let class_factor = sample_weights(y, self.params.class_weight).mapv(f64::from);
        let mut boost = Array1::<f64>::from_elem(n, 1.0 / n as f64);
        self.learners.clear();

        for round in 0..self.params.n_estimators {
            // learner weights: boosting weight times class weight, scaled to sum to n
            let mut fit_weights = &boost * &class_factor;
            let scale = n as f64 / fit_weights.sum();
            fit_weights *= scale;
            let tree = fit_tree_with_limits(
                x,
                y,
                fit_weights.mapv(|w| w as f32),
                &tree_params,
                2.0 * MIN_LEAF_WEIGHT,
                MIN_LEAF_WEIGHT,
                self.name(),
            )?;
            let predicted = predict_tree(&tree, x);
            let mut error = 0.0;
            Zip::from(&boost)
                .and(&predicted)
                .and(y)
                .for_each(|&w, &p, &t| {
                    if p != t {
                        error += w;
                    }
                });
            error /= boost.sum();

            if error <= 0.0 {
                log::debug!("AdaBoost round {} fits the training data exactly; stopping", round);
                self.learners.push(WeakLearner { tree, alpha: 1.0 });
                break;
            }
            if error >= 0.5 {
                if self.learners.is_empty() {
                    return Err(BenchError::backend(
                        self.name(),
                        format!("first weak learner is no better than chance (error {:.4})", error),
                    ));
                }
                log::debug!("AdaBoost round {} error {:.4} >= 0.5; stopping", round, error);
                break;
            }

            let alpha = self.params.learning_rate * ((1.0 - error) / error).ln();
            Zip::from(&mut boost)
                .and(&predicted)
                .and(y)
                .for_each(|w, &p, &t| {
                    if p != t {
                        *w *= alpha.exp();
                    }
                });
            let total = boost.sum();
            boost /= total;
            log::trace!("AdaBoost round {}: error {:.4}, alpha {:.4}", round, error, alpha);
            self.learners.push(WeakLearner { tree, alpha });
        }

        log::debug!("Fitted AdaBoost with {} weak learners", self.learners.len());
        Ok(())
    }

    /// Logistic transform of the normalised vote.
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let decision = self.decision_function(x)?;
        Ok(decision.mapv(|d| 1.0 / (1.0 + (-d).exp())))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        let first = self.learners.first()?;
        let mut total = Array1::<f64>::zeros(tree_importances(&first.tree).len());
        for learner in &self.learners {
            total.scaled_add(learner.alpha, &tree_importances(&learner.tree));
        }
        Some(normalize(total))
    }

    fn name(&self) -> &str {
        "adaboost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Positive in one corner of a 10 x 8 grid; no single stump separates it.
    fn quadrant_data() -> (Array2<f64>, Array1<usize>) {
        let n = 80;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let v = if j == 0 { i % 10 } else { i / 10 };
            v as f64 / 10.0 + 0.05
        });
        let y = Array1::from_shape_fn(n, |i| usize::from(i % 10 >= 5 && i / 10 >= 4));
        (x, y)
    }

    #[test]
    fn boosting_stumps_beats_a_single_stump() {
        let (x, y) = quadrant_data();
        let mut single = AdaBoostClassifier::new(AdaBoostParams {
            n_estimators: 1,
            ..AdaBoostParams::default()
        });
        single.fit(x.view(), y.view()).unwrap();
        let mut boosted = AdaBoostClassifier::new(AdaBoostParams {
            n_estimators: 30,
            ..AdaBoostParams::default()
        });
        boosted.fit(x.view(), y.view()).unwrap();

        let accuracy = |m: &AdaBoostClassifier| {
            let p = m.predict(x.view()).unwrap();
            p.iter().zip(y.iter()).filter(|(a, b)| a == b).count()
        };
        assert_eq!(single.n_learners(), 1);
        assert!(boosted.n_learners() > 1);
        assert!(accuracy(&boosted) >= accuracy(&single));
        assert!(accuracy(&boosted) >= 72);

        let proba = boosted.predict_proba(x.view()).unwrap();
        assert!(proba.iter().all(|&p| p > 0.0 && p < 1.0));
        let importances = boosted.feature_importances().unwrap();
        assert!((importances.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unfitted_model_is_reported() {
        let model = AdaBoostClassifier::new(AdaBoostParams::default());
        let x = Array2::<f64>::zeros((1, 2));
        assert!(matches!(
            model.predict(x.view()),
            Err(BenchError::UnfittedModel { .. })
        ));
    }

    #[test]
    fn probability_is_the_logistic_of_the_vote() {
        let (x, y) = quadrant_data();
        let mut single = AdaBoostClassifier::new(AdaBoostParams {
            n_estimators: 1,
            ..AdaBoostParams::default()
        });
        single.fit(x.view(), y.view()).unwrap();

        // one learner votes +1 or -1 after normalisation
        let high = 1.0 / (1.0 + (-1.0f64).exp());
        let proba = single.predict_proba(x.view()).unwrap();
        assert!(proba
            .iter()
            .all(|&p| (p - high).abs() < 1e-12 || (p - (1.0 - high)).abs() < 1e-12));
    }
}
