use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A value held by a model variable or a parameter binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(value) => Some(*value),
            _ => None,
        }
    }

    /// NaN and empty text count as "not given".
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Real(value) => value.is_nan(),
            Value::Text(text) => text.trim().is_empty(),
            Value::Bool(_) => false,
        }
    }

    /// Parse an operator-typed literal: null markers, booleans, then numbers,
    /// else text. A null marker yields a value that counts as missing.
    pub fn parse_literal(raw: &str) -> Value {
        let trimmed = raw.trim();
        match trimmed {
            "None" | "none" | "null" | "NULL" => return Value::Text(String::new()),
            "true" | "True" => return Value::Bool(true),
            "false" | "False" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(number) = trimmed.parse::<f64>() {
            return Value::Real(number);
        }
        let unquoted = trimmed
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
            .or_else(|| {
                trimmed
                    .strip_prefix('"')
                    .and_then(|rest| rest.strip_suffix('"'))
            })
            .unwrap_or(trimmed);
        Value::Text(unquoted.to_string())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{value}"),
            Value::Real(value) => write!(f, "{value}"),
            Value::Text(text) => write!(f, "'{text}'"),
        }
    }
}

/// Description and unit of a model variable. Either may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableMetadata {
    pub description: String,
    pub unit: String,
}

/// Whether the unit integrates itself (co-simulation) or is stepped by a
/// host solver (model exchange). Decides how solver logging is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interface {
    #[serde(rename = "ME", alias = "me")]
    #[default]
    ModelExchange,
    #[serde(rename = "CS", alias = "cs")]
    CoSimulation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultHandling {
    /// Full result written in the unit's binary result format.
    Binary,
    /// Result kept in memory only.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverLog {
    Silent,
    Verbosity(u32),
}

/// Options handed to [`ModelUnit::simulate`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulateOptions {
    /// Number of communication points, i.e. output intervals in the window.
    pub ncp: usize,
    pub result_handling: ResultHandling,
    pub solver_log: SolverLog,
    /// Series to record besides `time`. Empty means every variable.
    pub outputs: Vec<String>,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            ncp: 500,
            result_handling: ResultHandling::Binary,
            solver_log: SolverLog::Verbosity(50),
            outputs: Vec::new(),
        }
    }
}

/// Named time series produced by one `simulate` call. `time` is always present
/// and every series has the same number of samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    series: IndexMap<String, Vec<f64>>,
}

impl ResultSet {
    pub const TIME: &'static str = "time";

    pub fn new(time: Vec<f64>) -> Self {
        let mut series = IndexMap::new();
        series.insert(Self::TIME.to_string(), time);
        Self { series }
    }

    pub fn insert(&mut self, name: impl Into<String>, samples: Vec<f64>) {
        self.series.insert(name.into(), samples);
    }

    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    pub fn time(&self) -> &[f64] {
        self.series(Self::TIME).unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn samples(&self) -> usize {
        self.time().len()
    }

    pub fn final_value(&self, name: &str) -> Option<f64> {
        self.series(name).and_then(|samples| samples.last().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("variable `{0}` does not exist in the model")]
    UnknownVariable(String),
    #[error("variable `{address}` expects a {expected} value, got {got}")]
    TypeMismatch {
        address: String,
        expected: &'static str,
        got: Value,
    },
    #[error("variable `{0}` cannot be set")]
    NotSettable(String),
    #[error("solver failed at t = {time}: {reason}")]
    SolverFailed { time: f64, reason: String },
    #[error("invalid simulation window [{start}, {stop}]")]
    InvalidWindow { start: f64, stop: f64 },
}

/// Capability interface of a pre-built simulation unit.
///
/// The controller is the only writer. Every call runs to completion; a failed
/// `simulate` leaves the unit in an unspecified state that `reset` recovers.
pub trait ModelUnit {
    fn name(&self) -> &str;

    fn reset(&mut self) -> Result<(), ModelError>;

    fn get(&self, address: &str) -> Result<Value, ModelError>;

    fn set(&mut self, address: &str, value: &Value) -> Result<(), ModelError>;

    fn simulate(
        &mut self,
        start: f64,
        stop: f64,
        options: &SimulateOptions,
    ) -> Result<ResultSet, ModelError>;

    fn variable_metadata(&self, address: &str) -> Result<VariableMetadata, ModelError>;

    /// Names of the continuous states, in the unit's own order.
    fn continuous_states(&self) -> Vec<String>;

    /// Every variable name the unit exposes.
    fn variables(&self) -> Vec<String>;

    /// Time reached by the last completed `simulate` call.
    fn time(&self) -> f64;
}

impl<M: ModelUnit + ?Sized> ModelUnit for Box<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn reset(&mut self) -> Result<(), ModelError> {
        (**self).reset()
    }

    fn get(&self, address: &str) -> Result<Value, ModelError> {
        (**self).get(address)
    }

    fn set(&mut self, address: &str, value: &Value) -> Result<(), ModelError> {
        (**self).set(address, value)
    }

    fn simulate(
        &mut self,
        start: f64,
        stop: f64,
        options: &SimulateOptions,
    ) -> Result<ResultSet, ModelError> {
        (**self).simulate(start, stop, options)
    }

    fn variable_metadata(&self, address: &str) -> Result<VariableMetadata, ModelError> {
        (**self).variable_metadata(address)
    }

    fn continuous_states(&self) -> Vec<String> {
        (**self).continuous_states()
    }

    fn variables(&self) -> Vec<String> {
        (**self).variables()
    }

    fn time(&self) -> f64 {
        (**self).time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal() {
        assert_eq!(Value::parse_literal("0.5"), Value::Real(0.5));
        assert_eq!(Value::parse_literal("10"), Value::Real(10.0));
        assert_eq!(Value::parse_literal("true"), Value::Bool(true));
        assert_eq!(Value::parse_literal("'abc'"), Value::Text("abc".into()));
        assert_eq!(Value::parse_literal(""), Value::Text(String::new()));
        assert!(Value::parse_literal("nan").is_missing());
        for null in ["None", "null"] {
            assert!(Value::parse_literal(null).is_missing(), "{null}");
        }
        assert!(!Value::parse_literal("'None'").is_missing());
    }

    #[test]
    fn test_missing_values() {
        assert!(Value::Real(f64::NAN).is_missing());
        assert!(Value::Text("  ".into()).is_missing());
        assert!(!Value::Real(0.0).is_missing());
        assert!(!Value::Bool(false).is_missing());
    }

    #[test]
    fn test_result_set_time_first() {
        let mut result = ResultSet::new(vec![0.0, 1.0]);
        result.insert("x", vec![2.0, 3.0]);
        assert_eq!(result.names().collect::<Vec<_>>(), vec!["time", "x"]);
        assert_eq!(result.samples(), 2);
        assert_eq!(result.final_value("x"), Some(3.0));
        assert_eq!(result.series("y"), None);
    }
}
