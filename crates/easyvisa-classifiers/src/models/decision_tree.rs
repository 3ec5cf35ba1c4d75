use linfa::Dataset;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::config::{TreeParams, MIN_IMPURITY_DECREASE};
use crate::data_handling::validate_xy;
use crate::error::{BenchError, Result};
use crate::models::classifier_trait::Classifier;
use crate::models::utils::{normalize, sample_weights};

pub(crate) type Tree = DecisionTree<f64, usize>;

/// Fit a Gini CART tree with explicit per-row weights.
///
/// `min_samples_*` are expressed as minimum weight, so with unit weights they
/// behave as row counts.
pub(crate) fn fit_weighted_tree(
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
    weights: Array1<f32>,
    params: &TreeParams,
    model: &str,
) -> Result<Tree> {
    let min_leaf = params.min_samples_leaf as f32;
    let min_split = (params.min_samples_split as f32).max(2.0 * min_leaf);
    fit_tree_with_limits(x, y, weights, params, min_split, min_leaf, model)
}

pub(crate) fn fit_tree_with_limits(
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
    weights: Array1<f32>,
    params: &TreeParams,
    min_weight_split: f32,
    min_weight_leaf: f32,
    model: &str,
) -> Result<Tree> {
    use linfa::traits::Fit;

    let dataset = Dataset::new(x.to_owned(), y.to_owned()).with_weights(weights);
    DecisionTree::params()
        .split_quality(SplitQuality::Gini)
        .max_depth(params.max_depth)
        .min_weight_split(min_weight_split)
        .min_weight_leaf(min_weight_leaf)
        .min_impurity_decrease(params.min_impurity_decrease.max(MIN_IMPURITY_DECREASE))
        .fit(&dataset)
        .map_err(|e| BenchError::backend(model, e))
}

pub(crate) fn predict_tree(tree: &Tree, x: ArrayView2<f64>) -> Array1<usize> {
    use linfa::traits::Predict;

    tree.predict(&x)
}

/// Normalised impurity importances of a fitted tree.
pub(crate) fn tree_importances(tree: &Tree) -> Array1<f64> {
    normalize(tree.feature_importance().iter().copied().collect())
}

/// Single CART tree backed by `linfa-trees`.
pub struct DecisionTreeClassifier {
    params: TreeParams,
    model: Option<Tree>,
}

impl DecisionTreeClassifier {
    pub fn new(params: TreeParams) -> Self {
        DecisionTreeClassifier {
            params,
            model: None,
        }
    }

    fn fitted(&self) -> Result<&Tree> {
        self.model.as_ref().ok_or_else(|| BenchError::UnfittedModel {
            model: self.name().to_string(),
        })
    }
}

impl Classifier for DecisionTreeClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<()> {
        validate_xy(x, y)?;
        let weights = sample_weights(y, self.params.class_weight);
        let tree = fit_weighted_tree(x, y, weights, &self.params, self.name())?;
        log::trace!(
            "Fitted decision tree on {} rows, depth limit {:?}",
            x.nrows(),
            self.params.max_depth
        );
        self.model = Some(tree);
        Ok(())
    }

    /// Leaf majority vote, so probabilities are 0 or 1.
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let labels = Classifier::predict(self, x)?;
        Ok(labels.mapv(|l| l as f64))
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>> {
        Ok(predict_tree(self.fitted()?, x))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.model.as_ref().map(tree_importances)
    }

    fn name(&self) -> &str {
        "decision_tree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn threshold_data() -> (Array2<f64>, Array1<usize>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = Array1::from_shape_fn(40, |i| usize::from(i >= 20));
        (x, y)
    }

    #[test]
    fn learns_a_threshold_split() {
        let (x, y) = threshold_data();
        let mut model = DecisionTreeClassifier::new(TreeParams::default());
        model.fit(x.view(), y.view()).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), y);

        let importances = model.feature_importances().unwrap();
        assert!((importances.sum() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn predict_before_fit_is_an_error() {
        let model = DecisionTreeClassifier::new(TreeParams::default());
        let x = array![[0.0, 1.0]];
        assert!(matches!(
            model.predict(x.view()),
            Err(BenchError::UnfittedModel { .. })
        ));
        assert!(model.feature_importances().is_none());
    }
}
