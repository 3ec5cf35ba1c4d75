//! Comparison Table Builder: models side by side, one row per metric.
use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::error::{BenchError, Result};
use crate::evaluation::{Metric, PerformanceRecord};

/// Model name x metric table, columns in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonTable {
    columns: Vec<String>,
    /// `values[column][metric]`, metrics in `Metric::ALL` order.
    values: Vec<[f64; 4]>,
}

impl ComparisonTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a model column. All four metrics must be present.
    pub fn add_column(&mut self, model: impl Into<String>, metrics: &[(Metric, f64)]) -> Result<()> {
        let model = model.into();
        let mut row = [0.0; 4];
        for (slot, metric) in Metric::ALL.iter().enumerate() {
            row[slot] = metrics
                .iter()
                .find(|(m, _)| m == metric)
                .map(|&(_, v)| v)
                .ok_or_else(|| BenchError::IncompleteRecord {
                    model: model.clone(),
                    metric: metric.label().to_string(),
                })?;
        }
        self.columns.push(model);
        self.values.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, model: &str, metric: Metric) -> Option<f64> {
        let column = self.columns.iter().position(|c| c == model)?;
        let row = Metric::ALL.iter().position(|&m| m == metric)?;
        Some(self.values[column][row])
    }

    /// One metric across all models, in column order.
    pub fn row(&self, metric: Metric) -> Vec<f64> {
        let Some(row) = Metric::ALL.iter().position(|&m| m == metric) else {
            return Vec::new();
        };
        self.values.iter().map(|v| v[row]).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Metric rows, model columns, first column the metric name.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut header = vec![String::new()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;
        for metric in Metric::ALL {
            let mut record = vec![metric.label().to_string()];
            record.extend(self.row(metric).iter().map(|v| format!("{:.6}", v)));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        log::info!("Wrote comparison table to {}", path.display());
        Ok(())
    }
}

/// Build a table from `(model name, record)` pairs, keeping their order.
pub fn build_table<I, S>(records: I) -> Result<ComparisonTable>
where
    I: IntoIterator<Item = (S, PerformanceRecord)>,
    S: Into<String>,
{
    let mut table = ComparisonTable::new();
    for (name, record) in records {
        table.add_column(name, &record.metrics())?;
    }
    Ok(table)
}

impl fmt::Display for ComparisonTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<usize> = self.columns.iter().map(|c| c.len().max(8)).collect();
        write!(f, "{:<10}", "")?;
        for (column, width) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>w$}", column, w = width)?;
        }
        for metric in Metric::ALL {
            writeln!(f)?;
            write!(f, "{:<10}", metric.label())?;
            for (value, width) in self.row(metric).iter().zip(&widths) {
                write!(f, "  {:>w$.6}", value, w = width)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_metric_is_rejected() {
        let mut table = ComparisonTable::new();
        let err = table
            .add_column("tree", &[(Metric::Accuracy, 0.9), (Metric::Recall, 0.8), (Metric::F1, 0.7)])
            .unwrap_err();
        assert!(matches!(err, BenchError::IncompleteRecord { ref metric, .. } if metric == "Precision"));
        assert!(table.is_empty());
    }

    #[test]
    fn display_lists_every_metric_row() {
        let record = PerformanceRecord {
            accuracy: 1.0,
            recall: 0.5,
            precision: 0.25,
            f1: 0.125,
        };
        let table = build_table([("Decision Tree", record)]).unwrap();
        let text = table.to_string();
        assert!(text.contains("Decision Tree"));
        assert!(text.contains("0.125000"));
        assert_eq!(text.lines().count(), 5);
    }
}
