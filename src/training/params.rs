//! Hyperparameter values, parameter sets and exhaustive grids

use crate::error::{TrainerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    /// No limit (e.g. unbounded tree depth)
    Unset,
}

impl ParamValue {
    /// Read as a non-negative integer
    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            other => Err(invalid(name, other, "expected a non-negative integer")),
        }
    }

    /// Read as an optional non-negative integer, `Unset` meaning no limit
    pub fn as_opt_usize(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::Unset => Ok(None),
            other => other.as_usize(name).map(Some),
        }
    }

    /// Read as a float (integers are widened)
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(invalid(name, other, "expected a number")),
        }
    }

    /// Read as a strictly positive float
    pub fn as_positive_f64(&self, name: &str) -> Result<f64> {
        let v = self.as_f64(name)?;
        if v > 0.0 && v.is_finite() {
            Ok(v)
        } else {
            Err(invalid(name, self, "must be positive"))
        }
    }

    /// Read as a fraction in (0, 1]
    pub fn as_fraction(&self, name: &str) -> Result<f64> {
        let v = self.as_f64(name)?;
        if v > 0.0 && v <= 1.0 {
            Ok(v)
        } else {
            Err(invalid(name, self, "must be in (0, 1]"))
        }
    }

    /// Read as a boolean
    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(invalid(name, other, "expected a boolean")),
        }
    }

    /// Read as a string
    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Text(v) => Ok(v.as_str()),
            other => Err(invalid(name, other, "expected a string")),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
            ParamValue::Unset => write!(f, "None"),
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

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Unset)
    }
}

/// Build the error raised for a bad hyperparameter
pub(crate) fn invalid(name: &str, value: &ParamValue, reason: &str) -> TrainerError {
    TrainerError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Error for a parameter name an estimator does not know
pub(crate) fn unknown(name: &str, value: &ParamValue, estimator: &str) -> TrainerError {
    invalid(name, value, &format!("unknown parameter for {}", estimator))
}

/// One concrete hyperparameter assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
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
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

impl std::ops::Index<&str> for ParamSet {
    type Output = ParamValue;

    fn index(&self, name: &str) -> &ParamValue {
        &self.0[name]
    }
}

/// Exhaustive search space: an ordered list of parameters and their candidate values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    params: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter with its candidate values
    pub fn add<V, I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        V: Into<ParamValue>,
        I: IntoIterator<Item = V>,
    {
        self.params
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// True when there is nothing to tune
    pub fn is_empty(&self) -> bool {
        self.params.iter().all(|(_, values)| values.is_empty())
    }

    /// Parameter names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(name, _)| name.as_str())
    }

    /// Parameters and their candidate values in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ParamValue])> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Number of configurations in the cartesian product
    pub fn n_configurations(&self) -> usize {
        if self.is_empty() {
            return 1;
        }
        self.params
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(_, values)| values.len())
            .product()
    }

    /// All configurations; the last parameter varies fastest
    pub fn configurations(&self) -> Vec<ParamSet> {
        let mut configs = vec![ParamSet::new()];
        for (name, values) in &self.params {
            if values.is_empty() {
                continue;
            }
            configs = configs
                .iter()
                .flat_map(|base| {
                    values.iter().map(move |v| {
                        let mut next = base.clone();
                        next.insert(name.clone(), v.clone());
                        next
                    })
                })
                .collect();
        }
        configs
    }
}
