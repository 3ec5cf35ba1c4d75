//! Cleaning and one-hot encoding of EasyVisa rows.
//!
//! The encoder lays columns out as the numeric predictors first, followed by
//! one indicator column per non-reference category of each categorical
//! predictor. Categories are sorted and the first is dropped as reference.

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};

use crate::io::VisaApplication;

pub const NUMERIC_COLUMNS: [&str; 3] = ["no_of_employees", "yr_of_estab", "prevailing_wage"];

pub const CATEGORICAL_COLUMNS: [&str; 7] = [
    "continent",
    "education_of_employee",
    "has_job_experience",
    "requires_job_training",
    "region_of_employment",
    "unit_of_wage",
    "full_time_position",
];

/// Replace negative employee counts by their absolute value.
///
/// Returns the number of rows that were corrected.
pub fn clean(records: &mut [VisaApplication]) -> usize {
    let mut fixed = 0;
    for record in records.iter_mut() {
        if record.no_of_employees < 0 {
            record.no_of_employees = record.no_of_employees.abs();
            fixed += 1;
        }
    }
    if fixed > 0 {
        log::info!("Replaced {} negative employee counts by their absolute value", fixed);
    }
    fixed
}

/// Binary case-status labels, 1 for certified.
pub fn labels(records: &[VisaApplication]) -> Result<Array1<usize>> {
    records
        .iter()
        .enumerate()
        .map(|(row, r)| {
            r.status()
                .map(|s| s.label())
                .with_context(|| format!("Invalid case status at row {}", row + 1))
        })
        .collect::<Result<Vec<_>>>()
        .map(Array1::from_vec)
}

/// One-hot encoder fit on a set of applications.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    /// For each categorical column, the categories that get an indicator.
    encoded: Vec<(String, Vec<String>)>,
}

impl FeatureEncoder {
    pub fn fit(records: &[VisaApplication]) -> Self {
        let encoded = CATEGORICAL_COLUMNS
            .iter()
            .map(|&column| {
                let mut categories: Vec<String> = records
                    .iter()
                    .filter_map(|r| r.categorical(column))
                    .map(str::to_string)
                    .collect();
                categories.sort();
                categories.dedup();
                // the first category is the reference level
                let kept = categories.into_iter().skip(1).collect();
                (column.to_string(), kept)
            })
            .collect();
        FeatureEncoder { encoded }
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect();
        for (column, categories) in &self.encoded {
            for category in categories {
                names.push(format!("{}_{}", column, category));
            }
        }
        names
    }

    pub fn n_features(&self) -> usize {
        NUMERIC_COLUMNS.len() + self.encoded.iter().map(|(_, c)| c.len()).sum::<usize>()
    }

    /// Encode rows into a dense feature matrix. Unseen categories map to all zeros.
    pub fn transform(&self, records: &[VisaApplication]) -> Array2<f64> {
        let n_features = self.n_features();
        let mut x = Array2::<f64>::zeros((records.len(), n_features));

        for (row, record) in records.iter().enumerate() {
            let mut col = 0;
            for column in NUMERIC_COLUMNS {
                x[(row, col)] = record.numeric(column).unwrap_or(f64::NAN);
                col += 1;
            }
            for (column, categories) in &self.encoded {
                let value = record.categorical(column).unwrap_or_default();
                if let Some(offset) = categories.iter().position(|c| c == value) {
                    x[(row, col + offset)] = 1.0;
                }
                col += categories.len();
            }
        }

        x
    }
}

/// Encoded features, labels and column names for a full dataset.
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub features: Array2<f64>,
    pub labels: Array1<usize>,
    pub feature_names: Vec<String>,
}

/// Fit an encoder on `records` and encode them. `case_id` never becomes a feature.
pub fn encode(records: &[VisaApplication]) -> Result<EncodedDataset> {
    let encoder = FeatureEncoder::fit(records);
    let features = encoder.transform(records);
    let labels = labels(records)?;
    log::debug!(
        "Encoded {} rows into {} feature columns",
        features.nrows(),
        features.ncols()
    );
    Ok(EncodedDataset {
        features,
        labels,
        feature_names: encoder.feature_names(),
    })
}
