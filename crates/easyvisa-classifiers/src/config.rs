//! Classifier specifications: one typed parameter struct per family.
//!
//! A `ClassifierSpec` fully describes an unfitted estimator. Tuning grids are
//! applied to a spec by parameter name; names a family does not know and
//! values of the wrong type are rejected rather than ignored.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::tuning::grid::{ParamSet, ParamValue};

/// Per-class sample weighting applied when fitting trees.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    #[default]
    None,
    /// `n_samples / (2 * n_class)` for each class.
    Balanced,
}

impl ClassWeight {
    fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Null => Ok(ClassWeight::None),
            ParamValue::Text(s) if s.eq_ignore_ascii_case("none") => Ok(ClassWeight::None),
            ParamValue::Text(s) if s.eq_ignore_ascii_case("balanced") => Ok(ClassWeight::Balanced),
            other => Err(BenchError::invalid(
                name,
                format!("expected \"balanced\" or null, got {}", other),
            )),
        }
    }
}

/// How many feature columns an ensemble member sees.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(try_from = "ParamValue", into = "ParamValue")]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    /// Share of the columns, in (0, 1].
    Fraction(f64),
    Count(usize),
}

impl MaxFeatures {
    /// Number of columns to draw out of `n_features`, at least one.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => n.sqrt().floor() as usize,
            MaxFeatures::Log2 => n.log2().floor() as usize,
            MaxFeatures::Fraction(f) => (f * n).floor() as usize,
            MaxFeatures::Count(c) => c,
        };
        k.clamp(1, n_features.max(1))
    }
}

impl TryFrom<ParamValue> for MaxFeatures {
    type Error = BenchError;

    fn try_from(value: ParamValue) -> Result<Self> {
        match value {
            ParamValue::Null => Ok(MaxFeatures::All),
            ParamValue::Text(s) => match s.to_lowercase().as_str() {
                "sqrt" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                "all" => Ok(MaxFeatures::All),
                _ => Err(BenchError::invalid("max_features", format!("unknown rule '{}'", s))),
            },
            ParamValue::Float(f) if f > 0.0 && f <= 1.0 => Ok(MaxFeatures::Fraction(f)),
            ParamValue::Int(c) if c > 0 => Ok(MaxFeatures::Count(c as usize)),
            other => Err(BenchError::invalid(
                "max_features",
                format!("expected sqrt, log2, a fraction in (0, 1] or a positive count, got {}", other),
            )),
        }
    }
}

impl From<MaxFeatures> for ParamValue {
    fn from(value: MaxFeatures) -> Self {
        match value {
            MaxFeatures::All => ParamValue::Null,
            MaxFeatures::Sqrt => ParamValue::from("sqrt"),
            MaxFeatures::Log2 => ParamValue::from("log2"),
            MaxFeatures::Fraction(f) => ParamValue::Float(f),
            MaxFeatures::Count(c) => ParamValue::from(c),
        }
    }
}

fn fraction(name: &str, value: &ParamValue) -> Result<f64> {
    let v = value.as_f64(name)?;
    if v > 0.0 && v <= 1.0 {
        Ok(v)
    } else {
        Err(BenchError::invalid(name, format!("must be in (0, 1], got {}", v)))
    }
}

fn positive(name: &str, value: &ParamValue) -> Result<f64> {
    let v = value.as_f64(name)?;
    if v > 0.0 && v.is_finite() {
        Ok(v)
    } else {
        Err(BenchError::invalid(name, format!("must be positive, got {}", v)))
    }
}

fn at_least(name: &str, value: &ParamValue, min: usize) -> Result<usize> {
    let v = value.as_usize(name)?;
    if v >= min {
        Ok(v)
    } else {
        Err(BenchError::invalid(name, format!("must be at least {}, got {}", min, v)))
    }
}

/// Smallest impurity decrease the tree backend accepts.
pub const MIN_IMPURITY_DECREASE: f64 = 1e-7;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub min_impurity_decrease: f64,
    pub class_weight: ClassWeight,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            min_impurity_decrease: 1e-5,
            class_weight: ClassWeight::None,
        }
    }
}

impl TreeParams {
    fn apply(&mut self, name: &str, value: &ParamValue) -> Result<bool> {
        match name {
            "max_depth" => self.max_depth = value.as_opt_usize(name)?,
            "min_samples_split" => self.min_samples_split = at_least(name, value, 2)?,
            "min_samples_leaf" => self.min_samples_leaf = at_least(name, value, 1)?,
            "min_impurity_decrease" => {
                let v = value.as_f64(name)?;
                if v < 0.0 {
                    return Err(BenchError::invalid(name, "must not be negative"));
                }
                self.min_impurity_decrease = v;
            }
            "class_weight" => self.class_weight = ClassWeight::from_param(name, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BaggingParams {
    pub n_estimators: usize,
    /// Bootstrap sample size as a share of the training rows.
    pub max_samples: f64,
    /// Share of feature columns drawn (without replacement) per estimator.
    pub max_features: f64,
    pub seed: u64,
}

impl Default for BaggingParams {
    fn default() -> Self {
        Self {
            n_estimators: 10,
            max_samples: 1.0,
            max_features: 1.0,
            seed: 1,
        }
    }
}

impl BaggingParams {
    fn apply(&mut self, name: &str, value: &ParamValue) -> Result<bool> {
        match name {
            "n_estimators" => self.n_estimators = at_least(name, value, 1)?,
            "max_samples" => self.max_samples = fraction(name, value)?,
            "max_features" => self.max_features = fraction(name, value)?,
            "seed" => self.seed = value.as_usize(name)? as u64,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub max_features: MaxFeatures,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub class_weight: ClassWeight,
    /// Score each tree on the rows its bootstrap left out.
    pub oob_score: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            max_features: MaxFeatures::Sqrt,
            min_samples_split: 2,
            min_samples_leaf: 1,
            class_weight: ClassWeight::None,
            oob_score: false,
            seed: 1,
        }
    }
}

impl ForestParams {
    fn apply(&mut self, name: &str, value: &ParamValue) -> Result<bool> {
        match name {
            "n_estimators" => self.n_estimators = at_least(name, value, 1)?,
            "max_depth" => self.max_depth = value.as_opt_usize(name)?,
            "max_features" => self.max_features = MaxFeatures::try_from(value.clone())?,
            "min_samples_split" => self.min_samples_split = at_least(name, value, 2)?,
            "min_samples_leaf" => self.min_samples_leaf = at_least(name, value, 1)?,
            "class_weight" => self.class_weight = ClassWeight::from_param(name, value)?,
            "oob_score" => self.oob_score = value.as_bool(name)?,
            "seed" => self.seed = value.as_usize(name)? as u64,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AdaBoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of each weak learner; 1 gives decision stumps.
    pub base_max_depth: usize,
    /// Class weighting of the weak learners.
    pub class_weight: ClassWeight,
}

impl Default for AdaBoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            learning_rate: 1.0,
            base_max_depth: 1,
            class_weight: ClassWeight::None,
        }
    }
}

impl AdaBoostParams {
    fn apply(&mut self, name: &str, value: &ParamValue) -> Result<bool> {
        match name {
            "n_estimators" => self.n_estimators = at_least(name, value, 1)?,
            "learning_rate" => self.learning_rate = positive(name, value)?,
            "base_max_depth" => self.base_max_depth = at_least(name, value, 1)?,
            "class_weight" => self.class_weight = ClassWeight::from_param(name, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Row share drawn once per fit from `seed`.
    pub subsample: f64,
    /// Column share drawn once per fit from `seed`.
    pub max_features: f64,
    pub seed: u64,
    /// Estimator whose probabilities give the starting margin of every row.
    pub init: Option<Box<ClassifierSpec>>,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            subsample: 1.0,
            max_features: 1.0,
            seed: 1,
            init: None,
        }
    }
}

impl GradientBoostingParams {
    fn apply(&mut self, name: &str, value: &ParamValue) -> Result<bool> {
        match name {
            "n_estimators" => self.n_estimators = at_least(name, value, 1)?,
            "learning_rate" => self.learning_rate = positive(name, value)?,
            "max_depth" => self.max_depth = at_least(name, value, 1)?,
            "subsample" => self.subsample = fraction(name, value)?,
            "max_features" => self.max_features = fraction(name, value)?,
            "seed" => self.seed = value.as_usize(name)? as u64,
            "init" => {
                let init: ClassifierSpec =
                    value.as_str(name)?.parse().map_err(|e: String| BenchError::invalid(name, e))?;
                self.init = Some(Box::new(init));
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct XGBoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub seed: u64,
    /// Sample weight given to positive rows.
    pub scale_pos_weight: f64,
    pub min_child_samples: usize,
}

impl Default for XGBoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            subsample: 1.0,
            colsample_bytree: 1.0,
            seed: 1,
            scale_pos_weight: 1.0,
            min_child_samples: 1,
        }
    }
}

impl XGBoostParams {
    fn apply(&mut self, name: &str, value: &ParamValue) -> Result<bool> {
        match name {
            "n_estimators" => self.n_estimators = at_least(name, value, 1)?,
            "learning_rate" => self.learning_rate = positive(name, value)?,
            "max_depth" => self.max_depth = at_least(name, value, 1)?,
            "subsample" => self.subsample = fraction(name, value)?,
            "colsample_bytree" => self.colsample_bytree = fraction(name, value)?,
            "seed" => self.seed = value.as_usize(name)? as u64,
            "scale_pos_weight" => self.scale_pos_weight = positive(name, value)?,
            "min_child_samples" => self.min_child_samples = at_least(name, value, 1)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// A base estimator of a stacking ensemble.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct NamedSpec {
    pub name: String,
    pub spec: ClassifierSpec,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StackingParams {
    pub estimators: Vec<NamedSpec>,
    pub final_estimator: Box<ClassifierSpec>,
    #[serde(default = "default_stacking_folds")]
    pub cv_folds: usize,
}

fn default_stacking_folds() -> usize {
    5
}

impl Default for StackingParams {
    fn default() -> Self {
        Self {
            estimators: vec![
                NamedSpec {
                    name: "AdaBoost".to_string(),
                    spec: ClassifierSpec::AdaBoost(AdaBoostParams::default()),
                },
                NamedSpec {
                    name: "Gradient Boosting".to_string(),
                    spec: ClassifierSpec::GradientBoosting(GradientBoostingParams::default()),
                },
                NamedSpec {
                    name: "Random Forest".to_string(),
                    spec: ClassifierSpec::RandomForest(ForestParams::default()),
                },
            ],
            final_estimator: Box::new(ClassifierSpec::XGBoost(XGBoostParams::default())),
            cv_folds: default_stacking_folds(),
        }
    }
}

impl StackingParams {
    fn apply(&mut self, name: &str, value: &ParamValue) -> Result<bool> {
        match name {
            "cv_folds" => self.cv_folds = at_least(name, value, 2)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// An unfitted estimator: family plus its hyperparameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ClassifierSpec {
    DecisionTree(TreeParams),
    Bagging(BaggingParams),
    RandomForest(ForestParams),
    #[serde(rename = "adaboost")]
    AdaBoost(AdaBoostParams),
    GradientBoosting(GradientBoostingParams),
    #[serde(rename = "xgboost")]
    XGBoost(XGBoostParams),
    Stacking(StackingParams),
}

impl ClassifierSpec {
    pub fn family_name(&self) -> &'static str {
        match self {
            ClassifierSpec::DecisionTree(_) => "decision_tree",
            ClassifierSpec::Bagging(_) => "bagging",
            ClassifierSpec::RandomForest(_) => "random_forest",
            ClassifierSpec::AdaBoost(_) => "adaboost",
            ClassifierSpec::GradientBoosting(_) => "gradient_boosting",
            ClassifierSpec::XGBoost(_) => "xgboost",
            ClassifierSpec::Stacking(_) => "stacking",
        }
    }

    /// Set one hyperparameter by name.
    pub fn apply(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let known = match self {
            ClassifierSpec::DecisionTree(p) => p.apply(name, value)?,
            ClassifierSpec::Bagging(p) => p.apply(name, value)?,
            ClassifierSpec::RandomForest(p) => p.apply(name, value)?,
            ClassifierSpec::AdaBoost(p) => p.apply(name, value)?,
            ClassifierSpec::GradientBoosting(p) => p.apply(name, value)?,
            ClassifierSpec::XGBoost(p) => p.apply(name, value)?,
            ClassifierSpec::Stacking(p) => p.apply(name, value)?,
        };
        if known {
            Ok(())
        } else {
            Err(BenchError::UnknownParameter {
                family: self.family_name().to_string(),
                parameter: name.to_string(),
            })
        }
    }

    /// Range checks for specs that were deserialised rather than built by `apply`.
    pub fn validate(&self) -> Result<()> {
        let check_fraction = |name: &str, v: f64| fraction(name, &ParamValue::Float(v)).map(drop);
        let check_positive = |name: &str, v: f64| positive(name, &ParamValue::Float(v)).map(drop);
        let check_count = |name: &str, v: usize, min: usize| at_least(name, &ParamValue::from(v), min).map(drop);
        match self {
            ClassifierSpec::DecisionTree(p) => {
                check_count("min_samples_split", p.min_samples_split, 2)?;
                check_count("min_samples_leaf", p.min_samples_leaf, 1)
            }
            ClassifierSpec::Bagging(p) => {
                check_count("n_estimators", p.n_estimators, 1)?;
                check_fraction("max_samples", p.max_samples)?;
                check_fraction("max_features", p.max_features)
            }
            ClassifierSpec::RandomForest(p) => {
                check_count("n_estimators", p.n_estimators, 1)?;
                check_count("min_samples_split", p.min_samples_split, 2)?;
                check_count("min_samples_leaf", p.min_samples_leaf, 1)
            }
            ClassifierSpec::AdaBoost(p) => {
                check_count("n_estimators", p.n_estimators, 1)?;
                check_count("base_max_depth", p.base_max_depth, 1)?;
                check_positive("learning_rate", p.learning_rate)
            }
            ClassifierSpec::GradientBoosting(p) => {
                check_count("n_estimators", p.n_estimators, 1)?;
                check_count("max_depth", p.max_depth, 1)?;
                check_positive("learning_rate", p.learning_rate)?;
                check_fraction("subsample", p.subsample)?;
                check_fraction("max_features", p.max_features)?;
                match &p.init {
                    Some(init) => init.validate(),
                    None => Ok(()),
                }
            }
            ClassifierSpec::XGBoost(p) => {
                check_count("n_estimators", p.n_estimators, 1)?;
                check_count("max_depth", p.max_depth, 1)?;
                check_count("min_child_samples", p.min_child_samples, 1)?;
                check_positive("learning_rate", p.learning_rate)?;
                check_positive("scale_pos_weight", p.scale_pos_weight)?;
                check_fraction("subsample", p.subsample)?;
                check_fraction("colsample_bytree", p.colsample_bytree)
            }
            ClassifierSpec::Stacking(p) => {
                check_count("cv_folds", p.cv_folds, 2)?;
                if p.estimators.is_empty() {
                    return Err(BenchError::invalid("estimators", "stacking needs at least one base estimator"));
                }
                for named in &p.estimators {
                    named.spec.validate()?;
                }
                p.final_estimator.validate()
            }
        }
    }

    /// A copy of this spec with every parameter in `params` applied.
    pub fn with_params(&self, params: &ParamSet) -> Result<ClassifierSpec> {
        let mut spec = self.clone();
        for (name, value) in params.iter() {
            spec.apply(name, value)?;
        }
        Ok(spec)
    }
}

impl fmt::Display for ClassifierSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.family_name())
    }
}

impl FromStr for ClassifierSpec {
    type Err = String;

    /// Family name to a spec with default parameters.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "decision_tree" | "tree" => Ok(ClassifierSpec::DecisionTree(TreeParams::default())),
            "bagging" => Ok(ClassifierSpec::Bagging(BaggingParams::default())),
            "random_forest" | "forest" => Ok(ClassifierSpec::RandomForest(ForestParams::default())),
            "adaboost" => Ok(ClassifierSpec::AdaBoost(AdaBoostParams::default())),
            "gradient_boosting" | "gbdt" => {
                Ok(ClassifierSpec::GradientBoosting(GradientBoostingParams::default()))
            }
            "xgboost" => Ok(ClassifierSpec::XGBoost(XGBoostParams::default())),
            "stacking" => Ok(ClassifierSpec::Stacking(StackingParams::default())),
            _ => Err(format!("Unknown classifier family: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_values_are_applied_by_name() {
        let spec: ClassifierSpec = "decision_tree".parse().unwrap();
        let params = ParamSet(vec![
            ("max_depth".to_string(), ParamValue::from(5)),
            ("class_weight".to_string(), ParamValue::from("balanced")),
        ]);
        let tuned = spec.with_params(&params).unwrap();
        match tuned {
            ClassifierSpec::DecisionTree(p) => {
                assert_eq!(p.max_depth, Some(5));
                assert_eq!(p.class_weight, ClassWeight::Balanced);
            }
            other => panic!("unexpected family {}", other),
        }
    }

    #[test]
    fn unknown_and_mistyped_parameters_are_rejected() {
        let mut spec: ClassifierSpec = "bagging".parse().unwrap();
        assert!(matches!(
            spec.apply("max_leaf_nodes", &ParamValue::from(5)),
            Err(BenchError::UnknownParameter { .. })
        ));
        assert!(matches!(
            spec.apply("max_samples", &ParamValue::from(1.5)),
            Err(BenchError::InvalidParameter { .. })
        ));
        assert!(matches!(
            spec.apply("n_estimators", &ParamValue::from("many")),
            Err(BenchError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn max_features_rules_resolve_to_column_counts() {
        assert_eq!(MaxFeatures::Sqrt.resolve(21), 4);
        assert_eq!(MaxFeatures::Log2.resolve(21), 4);
        assert_eq!(MaxFeatures::Fraction(0.7).resolve(21), 14);
        assert_eq!(MaxFeatures::Count(50).resolve(21), 21);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
    }

    #[test]
    fn spec_json_is_tagged_by_family() {
        let json = r#"{"family": "random_forest", "max_features": "log2", "n_estimators": 20}"#;
        let spec: ClassifierSpec = serde_json::from_str(json).unwrap();
        match &spec {
            ClassifierSpec::RandomForest(p) => {
                assert_eq!(p.max_features, MaxFeatures::Log2);
                assert_eq!(p.n_estimators, 20);
                assert_eq!(p.min_samples_split, 2);
            }
            other => panic!("unexpected family {}", other),
        }
        let back: ClassifierSpec = serde_json::from_str(&serde_json::to_string(&spec).unwrap()).unwrap();
        assert_eq!(back, spec);
    }
}
