use std::fmt;

use ndarray::ArrayView1;
use serde::Serialize;

use crate::error::{BenchError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Pair importances with feature names, most important first.
///
/// Equal importances keep the input column order.
pub fn rank_feature_importances(
    feature_names: &[String],
    importances: ArrayView1<f64>,
) -> Result<Vec<FeatureImportance>> {
    if feature_names.len() != importances.len() {
        return Err(BenchError::ShapeMismatch {
            features: importances.len(),
            labels: feature_names.len(),
        });
    }
    let mut ranked: Vec<FeatureImportance> = feature_names
        .iter()
        .zip(importances.iter())
        .map(|(feature, &importance)| FeatureImportance {
            feature: feature.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    Ok(ranked)
}

/// Aligned two-column listing of ranked importances.
pub struct ImportanceListing<'a>(pub &'a [FeatureImportance]);

impl fmt::Display for ImportanceListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.0.iter().map(|r| r.feature.len()).max().unwrap_or(7).max(7);
        write!(f, "{:<w$}  {:>10}", "feature", "importance", w = width)?;
        for r in self.0 {
            write!(f, "\n{:<w$}  {:>10.6}", r.feature, r.importance, w = width)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn ranks_descending_with_stable_ties() {
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let ranked = rank_feature_importances(&names, array![0.1, 0.4, 0.1, 0.4].view()).unwrap();
        let order: Vec<&str> = ranked.iter().map(|r| r.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let names = vec!["a".to_string()];
        assert!(rank_feature_importances(&names, array![0.5, 0.5].view()).is_err());
    }
}
