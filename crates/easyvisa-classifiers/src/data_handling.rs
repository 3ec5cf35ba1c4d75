//! Labelled dataset splits and the stratified train/test split.
//!
//! A `DatasetSplit` pairs an encoded feature matrix with a binary label
//! vector (1 = certified, 0 = denied). Its constructor is the single place
//! the row-count and label invariants are enforced.
use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{BenchError, Result};

/// Which partition a split represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitKind {
    Train,
    Test,
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitKind::Train => write!(f, "train"),
            SplitKind::Test => write!(f, "test"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetSplit {
    kind: SplitKind,
    features: Array2<f64>,
    labels: Array1<usize>,
    feature_names: Vec<String>,
}

impl DatasetSplit {
    pub fn new(
        kind: SplitKind,
        features: Array2<f64>,
        labels: Array1<usize>,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        validate_xy(features.view(), labels.view())?;
        if feature_names.len() != features.ncols() {
            return Err(BenchError::invalid(
                "feature_names",
                format!(
                    "{} names for {} feature columns",
                    feature_names.len(),
                    features.ncols()
                ),
            ));
        }
        Ok(Self {
            kind,
            features,
            labels,
            feature_names,
        })
    }

    pub fn kind(&self) -> SplitKind {
        self.kind
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> ArrayView1<'_, usize> {
        self.labels.view()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// `(denied, certified)` counts.
    pub fn class_counts(&self) -> (usize, usize) {
        class_counts(self.labels.view())
    }

    pub fn log_summary(&self) {
        let (negatives, positives) = self.class_counts();
        let n = self.n_samples().max(1) as f64;
        log::info!(
            "{} split: {} rows x {} features, {:.2}% certified / {:.2}% denied",
            self.kind,
            self.n_samples(),
            self.features.ncols(),
            positives as f64 / n * 100.0,
            negatives as f64 / n * 100.0
        );
    }
}

/// Check that features and labels agree in length and that labels are binary.
pub fn validate_xy(x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(BenchError::ShapeMismatch {
            features: x.nrows(),
            labels: y.len(),
        });
    }
    if y.is_empty() {
        return Err(BenchError::EmptyLabels);
    }
    if let Some((row, &value)) = y.iter().enumerate().find(|(_, &v)| v > 1) {
        return Err(BenchError::InvalidLabel { row, value });
    }
    Ok(())
}

/// `(negatives, positives)` in a binary label vector.
pub fn class_counts(y: ArrayView1<usize>) -> (usize, usize) {
    let positives = y.iter().filter(|&&v| v == 1).count();
    (y.len() - positives, positives)
}

/// Stratified, seeded train/test split.
///
/// Each class is shuffled independently and `round(n_class * test_fraction)`
/// of its rows go to the test split. Row order inside each split follows the
/// original row order.
pub fn train_test_split(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    feature_names: &[String],
    test_fraction: f64,
    seed: u64,
) -> Result<(DatasetSplit, DatasetSplit)> {
    validate_xy(features.view(), labels.view())?;
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(BenchError::invalid(
            "test_fraction",
            format!("must be in (0, 1), got {}", test_fraction),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();

    for class in [0usize, 1] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        members.shuffle(&mut rng);
        let n_test = (members.len() as f64 * test_fraction).round() as usize;
        test_indices.extend_from_slice(&members[..n_test]);
        train_indices.extend_from_slice(&members[n_test..]);
    }

    train_indices.sort_unstable();
    test_indices.sort_unstable();

    if train_indices.is_empty() || test_indices.is_empty() {
        return Err(BenchError::invalid(
            "test_fraction",
            format!(
                "{} leaves an empty split for {} rows",
                test_fraction,
                labels.len()
            ),
        ));
    }

    let train = DatasetSplit::new(
        SplitKind::Train,
        features.select(Axis(0), &train_indices),
        labels.select(Axis(0), &train_indices),
        feature_names.to_vec(),
    )?;
    let test = DatasetSplit::new(
        SplitKind::Test,
        features.select(Axis(0), &test_indices),
        labels.select(Axis(0), &test_indices),
        feature_names.to_vec(),
    )?;

    train.log_summary();
    test.log_summary();

    Ok((train, test))
}
