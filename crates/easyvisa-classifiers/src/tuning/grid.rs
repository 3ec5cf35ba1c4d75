//! Hyperparameter grids and the candidate configurations they expand to.
use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// A single candidate value for a hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Int(v) => Ok(*v as f64),
            ParamValue::Float(v) => Ok(*v),
            other => Err(BenchError::invalid(name, format!("expected a number, got {}", other))),
        }
    }

    /// Non-negative integer. Floats are accepted when they hold an integral value.
    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            ParamValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Ok(*v as usize),
            other => Err(BenchError::invalid(
                name,
                format!("expected a non-negative integer, got {}", other),
            )),
        }
    }

    /// `null` maps to `None`, otherwise as [`ParamValue::as_usize`].
    pub fn as_opt_usize(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::Null => Ok(None),
            other => other.as_usize(name).map(Some),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(BenchError::invalid(name, format!("expected a boolean, got {}", other))),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Text(v) => Ok(v),
            other => Err(BenchError::invalid(name, format!("expected a string, got {}", other))),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "null"),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamValue::Null, Into::into)
    }
}

/// One concrete configuration: parameter names paired with chosen values, in grid order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(pub Vec<(String, ParamValue)>);

impl ParamSet {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "{{}}");
        }
        let parts: Vec<String> = self.0.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Ordered mapping from parameter name to its candidate values.
///
/// Candidates enumerate the cartesian product with the first parameter
/// varying slowest and the last fastest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    axes: Vec<GridAxis>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a parameter's candidate values.
    pub fn with<V, I>(mut self, name: &str, values: I) -> Self
    where
        V: Into<ParamValue>,
        I: IntoIterator<Item = V>,
    {
        let values: Vec<ParamValue> = values.into_iter().map(Into::into).collect();
        match self.axes.iter_mut().find(|a| a.name == name) {
            Some(axis) => axis.values = values,
            None => self.axes.push(GridAxis {
                name: name.to_string(),
                values,
            }),
        }
        self
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    /// Fails with `EmptyGrid` if any parameter has no candidates, and with
    /// `InvalidParameter` if a parameter is named twice.
    pub fn validate(&self) -> Result<()> {
        if let Some(axis) = self.axes.iter().find(|a| a.values.is_empty()) {
            return Err(BenchError::EmptyGrid {
                parameter: axis.name.clone(),
            });
        }
        for (i, axis) in self.axes.iter().enumerate() {
            if self.axes[..i].iter().any(|a| a.name == axis.name) {
                return Err(BenchError::invalid(&axis.name, "appears more than once in the grid"));
            }
        }
        Ok(())
    }

    /// Size of the cartesian product. A grid without parameters has one (empty) candidate.
    pub fn candidate_count(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// The `index`-th candidate in product order.
    pub fn candidate(&self, index: usize) -> ParamSet {
        let mut remainder = index;
        let mut chosen = vec![ParamValue::Null; self.axes.len()];
        for (slot, axis) in self.axes.iter().enumerate().rev() {
            let n = axis.values.len();
            chosen[slot] = axis.values[remainder % n].clone();
            remainder /= n;
        }
        ParamSet(
            self.axes
                .iter()
                .map(|a| a.name.clone())
                .zip(chosen)
                .collect(),
        )
    }

    pub fn candidates(&self) -> Result<Vec<ParamSet>> {
        self.validate()?;
        Ok((0..self.candidate_count()).map(|i| self.candidate(i)).collect())
    }

    /// `n_iter` distinct candidates drawn with a seeded RNG, returned in product order.
    pub fn sample(&self, n_iter: usize, seed: u64) -> Result<Vec<ParamSet>> {
        self.validate()?;
        let total = self.candidate_count();
        if n_iter >= total {
            return self.candidates();
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut picked = rand::seq::index::sample(&mut rng, total, n_iter).into_vec();
        picked.sort_unstable();
        Ok(picked.into_iter().map(|i| self.candidate(i)).collect())
    }
}

/// How candidates are drawn from a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    Exhaustive,
    Randomized { n_iter: usize },
}

impl Default for SearchStrategy {
    fn default() -> Self {
        SearchStrategy::Exhaustive
    }
}
