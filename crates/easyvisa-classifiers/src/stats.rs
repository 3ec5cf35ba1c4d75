//! Descriptive statistics for the raw EasyVisa table.
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use statrs::statistics::{Data, OrderStatistics, Statistics};

use crate::io::VisaApplication;
use crate::preprocessing::{CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};

#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoricalSummary {
    pub column: String,
    /// Category counts, most frequent first.
    pub counts: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    /// Rows identical to an earlier row on every column except `case_id`.
    pub duplicated_rows: usize,
    pub numeric: Vec<NumericSummary>,
    pub categorical: Vec<CategoricalSummary>,
}

/// Summary statistics for a numeric sample. Sample standard deviation (n - 1).
pub fn summarize_numeric(column: &str, values: Vec<f64>) -> NumericSummary {
    let count = values.len();
    if count == 0 {
        return NumericSummary {
            column: column.to_string(),
            count,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            q25: f64::NAN,
            median: f64::NAN,
            q75: f64::NAN,
            max: f64::NAN,
        };
    }

    let mean = Statistics::mean(values.iter());
    let std = Statistics::std_dev(values.iter());
    let min = Statistics::min(values.iter());
    let max = Statistics::max(values.iter());

    let mut data = Data::new(values);
    NumericSummary {
        column: column.to_string(),
        count,
        mean,
        std,
        min,
        q25: data.lower_quartile(),
        median: data.median(),
        q75: data.upper_quartile(),
        max,
    }
}

fn summarize_categorical<'a>(column: &str, values: impl Iterator<Item = &'a str>) -> CategoricalSummary {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    CategoricalSummary {
        column: column.to_string(),
        counts,
    }
}

fn count_duplicates(records: &[VisaApplication]) -> usize {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| {
            let key = format!(
                "{}|{}|{}|{}|{}|{}|{}|{:?}|{}|{}|{}",
                r.continent,
                r.education_of_employee,
                r.has_job_experience,
                r.requires_job_training,
                r.no_of_employees,
                r.yr_of_estab,
                r.region_of_employment,
                r.prevailing_wage,
                r.unit_of_wage,
                r.full_time_position,
                r.case_status
            );
            !seen.insert(key)
        })
        .count()
}

/// Summarise every numeric and categorical column, including `case_status`.
pub fn describe(records: &[VisaApplication]) -> DatasetSummary {
    let numeric = NUMERIC_COLUMNS
        .iter()
        .map(|&column| {
            let values = records.iter().filter_map(|r| r.numeric(column)).collect();
            summarize_numeric(column, values)
        })
        .collect();

    let categorical = CATEGORICAL_COLUMNS
        .iter()
        .chain(std::iter::once(&"case_status"))
        .map(|&column| {
            summarize_categorical(column, records.iter().filter_map(|r| r.categorical(column)))
        })
        .collect();

    DatasetSummary {
        rows: records.len(),
        duplicated_rows: count_duplicates(records),
        numeric,
        categorical,
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----- Input Data Summary -----")?;
        writeln!(f, "{} rows, {} duplicated", self.rows, self.duplicated_rows)?;
        writeln!(
            f,
            "{:<18} {:>8} {:>12} {:>12} {:>10} {:>10} {:>10} {:>10} {:>12}",
            "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        for s in &self.numeric {
            writeln!(
                f,
                "{:<18} {:>8} {:>12.2} {:>12.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>12.2}",
                s.column, s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
            )?;
        }
        for c in &self.categorical {
            writeln!(f, "{}", "-".repeat(50))?;
            writeln!(f, "{}", c.column)?;
            for (category, count) in &c.counts {
                writeln!(f, "  {:<28} {:>8}", category, count)?;
            }
        }
        write!(f, "-------------------------------")
    }
}
