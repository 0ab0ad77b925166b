use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::config::ConfigError;
use crate::error::ExploreError;
use crate::model::Value;

/// Operator-facing name bound to a model address and its current value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub address: String,
    /// `None` when the application leaves the value unset.
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
}

impl Comparison {
    const ALL: [(&'static str, Comparison); 6] = [
        (">=", Comparison::GreaterOrEqual),
        ("<=", Comparison::LessOrEqual),
        ("==", Comparison::Equal),
        ("!=", Comparison::NotEqual),
        (">", Comparison::Greater),
        ("<", Comparison::Less),
    ];

    fn symbol(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, comparison)| *comparison == self)
            .map(|(symbol, _)| *symbol)
            .unwrap_or("?")
    }

    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Greater => lhs > rhs,
            Comparison::GreaterOrEqual => lhs >= rhs,
            Comparison::Less => lhs < rhs,
            Comparison::LessOrEqual => lhs <= rhs,
            Comparison::Equal => lhs == rhs,
            Comparison::NotEqual => lhs != rhs,
        }
    }
}

/// Validity requirement `<parameter> <comparison> <bound>`, e.g. `Y > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub parameter: String,
    pub comparison: Comparison,
    pub bound: f64,
}

impl Predicate {
    /// Non-numeric and missing values never satisfy a requirement.
    pub fn holds(&self, value: Option<&Value>) -> bool {
        value
            .and_then(Value::as_real)
            .is_some_and(|lhs| self.comparison.holds(lhs, self.bound))
    }
}

impl FromStr for Predicate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidCheck(s.to_string());
        let op_start = s
            .find(|c: char| matches!(c, '<' | '>' | '=' | '!'))
            .ok_or_else(invalid)?;
        let parameter = s[..op_start].trim();
        let rest = &s[op_start..];
        let (symbol, comparison) = Comparison::ALL
            .iter()
            .find(|(symbol, _)| rest.starts_with(symbol))
            .ok_or_else(invalid)?;
        let bound = rest[symbol.len()..]
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid())?;
        if parameter.is_empty() {
            return Err(invalid());
        }
        Ok(Predicate {
            parameter: parameter.to_string(),
            comparison: *comparison,
            bound,
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.parameter,
            self.comparison.symbol(),
            self.bound
        )
    }
}

/// Outcome of a `par`/`init` call. Accepted keys are applied even when other
/// keys are rejected or requirements fail afterwards.
#[derive(Debug, Default)]
pub struct SetReport {
    pub applied: Vec<String>,
    pub rejected: Vec<ExploreError>,
    pub violations: Vec<Predicate>,
}

impl SetReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.violations.is_empty()
    }

    /// Every problem, per-key rejections first, then one violation report.
    pub fn diagnostics(self) -> Vec<ExploreError> {
        let mut diagnostics = self.rejected;
        if !self.violations.is_empty() {
            diagnostics.push(ExploreError::PredicateViolation {
                violations: self.violations,
            });
        }
        diagnostics
    }
}

/// Parameter and initial-value bindings with their model addresses.
///
/// Names and addresses form a bijection across bindings and describe-only
/// aliases; this is checked when the store is built.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    bindings: IndexMap<String, Parameter>,
    aliases: IndexMap<String, String>,
    by_address: HashMap<String, String>,
    predicates: Vec<Predicate>,
    initial_marker: String,
}

impl ParameterStore {
    pub fn new(
        parameters: impl IntoIterator<Item = Parameter>,
        aliases: impl IntoIterator<Item = (String, String)>,
        predicates: Vec<Predicate>,
        initial_marker: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let mut store = Self {
            bindings: IndexMap::new(),
            aliases: IndexMap::new(),
            by_address: HashMap::new(),
            predicates: Vec::new(),
            initial_marker: initial_marker.into(),
        };

        for parameter in parameters {
            store.claim(&parameter.name, &parameter.address)?;
            store.bindings.insert(parameter.name.clone(), parameter);
        }
        for (name, address) in aliases {
            store.claim(&name, &address)?;
            store.aliases.insert(name, address);
        }
        for predicate in &predicates {
            if !store.bindings.contains_key(&predicate.parameter) {
                return Err(ConfigError::UnknownCheckParameter(predicate.to_string()));
            }
        }
        store.predicates = predicates;

        Ok(store)
    }

    fn claim(&mut self, name: &str, address: &str) -> Result<(), ConfigError> {
        if self.bindings.contains_key(name) || self.aliases.contains_key(name) {
            return Err(ConfigError::DuplicateName(name.to_string()));
        }
        if let Some(owner) = self.by_address.get(address) {
            return Err(ConfigError::DuplicateAddress {
                address: address.to_string(),
                first: owner.clone(),
                second: name.to_string(),
            });
        }
        self.by_address
            .insert(address.to_string(), name.to_string());
        Ok(())
    }

    /// Update known parameters. Unknown keys are reported and skipped.
    pub fn set<K, I>(&mut self, updates: I) -> SetReport
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        self.stage_and_apply(updates, |_| None)
    }

    /// Update initial values only; keys must carry the start marker.
    pub fn set_initial<K, I>(&mut self, updates: I) -> SetReport
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let marker = self.initial_marker.clone();
        self.stage_and_apply(updates, |key| {
            (!key.contains(marker.as_str())).then(|| ExploreError::NotInitialValue {
                key: key.to_string(),
            })
        })
    }

    fn stage_and_apply<K, I>(
        &mut self,
        updates: I,
        screen: impl Fn(&str) -> Option<ExploreError>,
    ) -> SetReport
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut report = SetReport::default();
        let mut staged = Vec::new();

        for (key, value) in updates {
            let key = key.into();
            if let Some(error) = screen(&key) {
                report.rejected.push(error);
            } else if self.bindings.contains_key(&key) {
                staged.push((key, value));
            } else {
                report.rejected.push(ExploreError::UnknownParameter { key });
            }
        }

        for (key, value) in staged {
            if let Some(parameter) = self.bindings.get_mut(&key) {
                debug!(parameter = %key, %value, "parameter staged");
                parameter.value = Some(value);
                report.applied.push(key);
            }
        }

        report.violations = self.check();
        report
    }

    /// Every requirement that fails against the current values.
    pub fn check(&self) -> Vec<Predicate> {
        self.predicates
            .iter()
            .filter(|predicate| {
                let value = self
                    .bindings
                    .get(&predicate.parameter)
                    .and_then(|parameter| parameter.value.as_ref());
                !predicate.holds(value)
            })
            .cloned()
            .collect()
    }

    /// Names of bindings whose value is unset, NaN or empty.
    pub fn missing_values(&self) -> Vec<String> {
        self.bindings
            .values()
            .filter(|parameter| parameter.value.as_ref().is_none_or(Value::is_missing))
            .map(|parameter| parameter.name.clone())
            .collect()
    }

    /// Address and cached value. Describe-only aliases have no value.
    pub fn get(&self, name: &str) -> Option<(&str, Option<&Value>)> {
        if let Some(parameter) = self.bindings.get(name) {
            return Some((parameter.address.as_str(), parameter.value.as_ref()));
        }
        self.aliases
            .get(name)
            .map(|address| (address.as_str(), None))
    }

    pub fn address_of(&self, name: &str) -> Option<&str> {
        self.get(name).map(|(address, _)| address)
    }

    pub fn name_of(&self, address: &str) -> Option<&str> {
        self.by_address.get(address).map(String::as_str)
    }

    /// Bindings in declaration order.
    pub fn bindings(&self) -> impl Iterator<Item = &Parameter> {
        self.bindings.values()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn initial_marker(&self) -> &str {
        &self.initial_marker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ParameterStore {
        let parameters = [
            ("V_start", "bioreactor.V_start", 1.0),
            ("Y", "bioreactor.culture.Y", 0.5),
            ("Ks", "bioreactor.culture.Ks", 0.1),
        ]
        .into_iter()
        .map(|(name, address, value)| Parameter {
            name: name.into(),
            address: address.into(),
            value: Some(Value::Real(value)),
        });
        let predicates = vec!["Y > 0".parse().unwrap(), "Ks > 0".parse().unwrap()];
        ParameterStore::new(
            parameters,
            [("mu".to_string(), "bioreactor.culture.mu".to_string())],
            predicates,
            "_start",
        )
        .unwrap()
    }

    #[test]
    fn test_predicate_parsing() {
        let predicate: Predicate = "VX_start >= 0".parse().unwrap();
        assert_eq!(predicate.parameter, "VX_start");
        assert_eq!(predicate.comparison, Comparison::GreaterOrEqual);
        assert_eq!(predicate.bound, 0.0);
        assert_eq!(predicate.to_string(), "VX_start >= 0");
        assert!("Y >".parse::<Predicate>().is_err());
        assert!("> 0".parse::<Predicate>().is_err());
        assert!("Y 0".parse::<Predicate>().is_err());
    }

    #[test]
    fn test_partial_success() {
        let mut store = store();
        let report = store.set([("Y", Value::Real(0.7)), ("Yx", Value::Real(1.0))]);
        assert_eq!(report.applied, vec!["Y"]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(store.get("Y").unwrap().1, Some(&Value::Real(0.7)));
    }

    #[test]
    fn test_violations_do_not_roll_back() {
        let mut store = store();
        let report = store.set([("Y", Value::Real(-1.0)), ("Ks", Value::Real(0.0))]);
        assert_eq!(report.violations.len(), 2);
        assert_eq!(store.get("Y").unwrap().1, Some(&Value::Real(-1.0)));
    }

    #[test]
    fn test_initial_marker_required() {
        let mut store = store();
        let report = store.set_initial([("Y", Value::Real(0.9)), ("V_start", Value::Real(2.0))]);
        assert_eq!(report.applied, vec!["V_start"]);
        assert!(matches!(
            report.rejected.as_slice(),
            [ExploreError::NotInitialValue { key }] if key == "Y"
        ));
        assert_eq!(store.get("Y").unwrap().1, Some(&Value::Real(0.5)));
    }

    #[test]
    fn test_missing_values() {
        let mut store = store();
        assert!(store.missing_values().is_empty());
        store.set([("Y", Value::Real(f64::NAN)), ("Ks", Value::Text(String::new()))]);
        assert_eq!(store.missing_values(), vec!["Y", "Ks"]);
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let parameters = ["a", "b"].into_iter().map(|name| Parameter {
            name: name.into(),
            address: "same.address".into(),
            value: None,
        });
        let err = ParameterStore::new(parameters, [], Vec::new(), "_start").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAddress { .. }));
    }

    #[test]
    fn test_alias_lookup() {
        let store = store();
        assert_eq!(store.address_of("mu"), Some("bioreactor.culture.mu"));
        assert_eq!(store.get("mu").unwrap().1, None);
        assert_eq!(store.name_of("bioreactor.culture.Y"), Some("Y"));
    }
}
