use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::Result;

/// Contract shared by every classifier family in the benchmark.
///
/// Labels use the crate convention: 1 for certified, 0 for denied.
/// `predict`, `predict_proba` and `feature_importances` are only meaningful
/// after a successful `fit`; calling them earlier yields `UnfittedModel`.
pub trait Classifier: Send {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<()>;

    /// Probability of the positive class for each row.
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Hard labels, thresholding the positive-class probability at 0.5.
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>> {
        Ok(self.predict_proba(x)?.mapv(|p| usize::from(p > 0.5)))
    }

    /// Impurity-based importances over the input columns, summing to 1, when
    /// the family exposes them.
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    fn name(&self) -> &str {
        "classifier"
    }
}
