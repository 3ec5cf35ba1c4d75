//! easyvisa-classifiers: benchmarking tree-ensemble classifiers on the EasyVisa
//! visa-certification dataset.
//!
//! The crate loads and encodes the applications CSV, fits a family of
//! classifiers (decision tree, bagging, random forest, AdaBoost, gradient
//! boosting, an XGBoost-style booster and a stacking ensemble), tunes them with
//! stratified cross-validation, and collects train and test metrics into
//! comparison tables. An HTML report summarises a run.
pub mod benchmark;
pub mod comparison;
pub mod config;
pub mod data_handling;
pub mod error;
pub mod evaluation;
pub mod importance;
pub mod io;
pub mod models;
pub mod preprocessing;
pub mod report;
pub mod stats;
pub mod tuning;

pub use error::{BenchError, Result};
