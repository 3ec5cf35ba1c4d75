//! Error type shared by the evaluator, the tuning harness and the models.

/// Errors raised by evaluation, tuning, table building and model fitting.
///
/// All of these indicate a defect in the caller's inputs; none are retried.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Feature and label row counts disagree.
    #[error("feature matrix has {features} rows but label vector has {labels} entries")]
    ShapeMismatch { features: usize, labels: usize },

    /// `predict` was called on a model that has not been fit.
    #[error("model '{model}' must be fit before predicting")]
    UnfittedModel { model: String },

    /// A hyperparameter has no candidate values.
    #[error("hyperparameter '{parameter}' has no candidate values")]
    EmptyGrid { parameter: String },

    /// A class has too few samples to populate every fold.
    #[error("class {class} has {count} samples, fewer than the {folds} folds requested")]
    InsufficientData {
        class: usize,
        count: usize,
        folds: usize,
    },

    /// A comparison table column is missing one of the four metrics.
    #[error("record for '{model}' is missing metric '{metric}'")]
    IncompleteRecord { model: String, metric: String },

    /// Label vector is empty.
    #[error("label vector is empty")]
    EmptyLabels,

    /// A label other than 0 or 1 was found.
    #[error("label {value} at row {row} is not binary (expected 0 or 1)")]
    InvalidLabel { row: usize, value: usize },

    /// Fewer than two cross-validation folds were requested.
    #[error("cv_folds must be at least 2, got {0}")]
    InvalidFolds(usize),

    /// A grid names a parameter the classifier family does not recognise.
    #[error("{family} has no hyperparameter named '{parameter}'")]
    UnknownParameter { family: String, parameter: String },

    /// A parameter value has the wrong type or is out of range.
    #[error("invalid value for '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    /// The backing ML crate rejected the fit.
    #[error("{model} backend error: {message}")]
    Backend { model: String, message: String },

    /// Tuning was interrupted before any candidate finished.
    #[error("tuning cancelled before any candidate completed")]
    Cancelled,

    /// Every tuning candidate failed to fit.
    #[error("all {0} tuning candidates failed")]
    NoViableCandidate(usize),
}

impl BenchError {
    pub(crate) fn backend(model: &str, err: impl std::fmt::Display) -> Self {
        BenchError::Backend {
            model: model.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid(parameter: &str, reason: impl Into<String>) -> Self {
        BenchError::InvalidParameter {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
