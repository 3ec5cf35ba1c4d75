//! Metric Evaluator: classification metrics and confusion matrices.
//!
//! All metrics treat label 1 (certified) as the positive class. Any ratio
//! whose denominator is zero evaluates to 0.0 instead of failing, so an
//! all-negative split yields recall, precision and F1 of 0.
use std::fmt;

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::data_handling::validate_xy;
use crate::error::{BenchError, Result};
use crate::models::classifier_trait::Classifier;

/// The four metrics reported for every model and split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    Recall,
    Precision,
    F1,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Accuracy, Metric::Recall, Metric::Precision, Metric::F1];

    pub fn compute(self, truth: ArrayView1<usize>, predicted: ArrayView1<usize>) -> f64 {
        let cm = ConfusionMatrix::from_labels(truth, predicted);
        match self {
            Metric::Accuracy => cm.accuracy(),
            Metric::Recall => cm.recall(),
            Metric::Precision => cm.precision(),
            Metric::F1 => cm.f1(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Accuracy => "Accuracy",
            Metric::Recall => "Recall",
            Metric::Precision => "Precision",
            Metric::F1 => "F1",
        }
    }
}

pub fn accuracy_score(truth: ArrayView1<usize>, predicted: ArrayView1<usize>) -> f64 {
    Metric::Accuracy.compute(truth, predicted)
}

pub fn recall_score(truth: ArrayView1<usize>, predicted: ArrayView1<usize>) -> f64 {
    Metric::Recall.compute(truth, predicted)
}

pub fn precision_score(truth: ArrayView1<usize>, predicted: ArrayView1<usize>) -> f64 {
    Metric::Precision.compute(truth, predicted)
}

pub fn f1_score(truth: ArrayView1<usize>, predicted: ArrayView1<usize>) -> f64 {
    Metric::F1.compute(truth, predicted)
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accuracy" => Ok(Metric::Accuracy),
            "recall" => Ok(Metric::Recall),
            "precision" => Ok(Metric::Precision),
            "f1" => Ok(Metric::F1),
            _ => Err(format!("Unknown metric: {}", s)),
        }
    }
}

/// A "higher is better" score over (true labels, predicted labels).
pub trait Scorer: Sync {
    fn score(&self, truth: ArrayView1<usize>, predicted: ArrayView1<usize>) -> f64;

    fn name(&self) -> &str;
}

impl Scorer for Metric {
    fn score(&self, truth: ArrayView1<usize>, predicted: ArrayView1<usize>) -> f64 {
        self.compute(truth, predicted)
    }

    fn name(&self) -> &str {
        self.label()
    }
}

/// Adapts a closure into a [`Scorer`].
pub struct ScoreFn<F> {
    name: String,
    f: F,
}

impl<F> ScoreFn<F>
where
    F: Fn(ArrayView1<usize>, ArrayView1<usize>) -> f64 + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Scorer for ScoreFn<F>
where
    F: Fn(ArrayView1<usize>, ArrayView1<usize>) -> f64 + Sync,
{
    fn score(&self, truth: ArrayView1<usize>, predicted: ArrayView1<usize>) -> f64 {
        (self.f)(truth, predicted)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Metrics of one model on one split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub accuracy: f64,
    pub recall: f64,
    pub precision: f64,
    pub f1: f64,
}

impl PerformanceRecord {
    pub fn from_labels(truth: ArrayView1<usize>, predicted: ArrayView1<usize>) -> Self {
        let cm = ConfusionMatrix::from_labels(truth, predicted);
        PerformanceRecord {
            accuracy: cm.accuracy(),
            recall: cm.recall(),
            precision: cm.precision(),
            f1: cm.f1(),
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Accuracy => self.accuracy,
            Metric::Recall => self.recall,
            Metric::Precision => self.precision,
            Metric::F1 => self.f1,
        }
    }

    pub fn metrics(&self) -> [(Metric, f64); 4] {
        Metric::ALL.map(|m| (m, self.get(m)))
    }
}

impl fmt::Display for PerformanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Accuracy {:.6}  Recall {:.6}  Precision {:.6}  F1 {:.6}",
            self.accuracy, self.recall, self.precision, self.f1
        )
    }
}

/// 2x2 confusion matrix, `counts[true][predicted]`, class 0 first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 2]; 2],
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ConfusionMatrix {
    /// Build from two equally long binary label vectors. Labels other than 1
    /// count as the negative class.
    pub fn from_labels(truth: ArrayView1<usize>, predicted: ArrayView1<usize>) -> Self {
        let mut counts = [[0usize; 2]; 2];
        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            counts[usize::from(t == 1)][usize::from(p == 1)] += 1;
        }
        ConfusionMatrix { counts }
    }

    pub fn true_negatives(&self) -> usize {
        self.counts[0][0]
    }

    pub fn false_positives(&self) -> usize {
        self.counts[0][1]
    }

    pub fn false_negatives(&self) -> usize {
        self.counts[1][0]
    }

    pub fn true_positives(&self) -> usize {
        self.counts[1][1]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Share of the grand total in a cell, in [0, 1].
    pub fn fraction(&self, truth: usize, predicted: usize) -> f64 {
        ratio(self.counts[truth][predicted], self.total())
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives() + self.true_negatives(), self.total())
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives(), self.true_positives() + self.false_negatives())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives(), self.true_positives() + self.false_positives())
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Cell annotation: count on the first line, percentage of total on the second.
    pub fn annotation(&self, truth: usize, predicted: usize) -> String {
        format!(
            "{}\n{:.2}%",
            self.counts[truth][predicted],
            self.fraction(truth, predicted) * 100.0
        )
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<14}{:>18}{:>18}", "true \\ pred", "0 (Denied)", "1 (Certified)")?;
        for (t, name) in ["0 (Denied)", "1 (Certified)"].iter().enumerate() {
            let cells: Vec<String> = (0..2)
                .map(|p| {
                    format!(
                        "{} ({:.2}%)",
                        self.counts[t][p],
                        self.fraction(t, p) * 100.0
                    )
                })
                .collect();
            write!(f, "{:<14}{:>18}{:>18}", name, cells[0], cells[1])?;
            if t == 0 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

fn predict_checked(
    model: &dyn Classifier,
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
) -> Result<ndarray::Array1<usize>> {
    validate_xy(x, y)?;
    let predicted = model.predict(x)?;
    if predicted.len() != y.len() {
        return Err(BenchError::ShapeMismatch {
            features: predicted.len(),
            labels: y.len(),
        });
    }
    Ok(predicted)
}

/// Predict with a fitted model and score the predictions against `y`.
pub fn evaluate(
    model: &dyn Classifier,
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
) -> Result<PerformanceRecord> {
    let predicted = predict_checked(model, x, y)?;
    Ok(PerformanceRecord::from_labels(y, predicted.view()))
}

/// Confusion matrix of a fitted model on `(x, y)`, for inspection.
pub fn render_confusion_matrix(
    model: &dyn Classifier,
    x: ArrayView2<f64>,
    y: ArrayView1<usize>,
) -> Result<ConfusionMatrix> {
    let predicted = predict_checked(model, x, y)?;
    Ok(ConfusionMatrix::from_labels(y, predicted.view()))
}
