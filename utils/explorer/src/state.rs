use indexmap::IndexMap;
use tracing::debug;

use crate::model::{ModelError, ModelUnit, Value};
use crate::restart::{TranslationError, translate};

/// Captured value of one state and where it must be written to resume.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartBinding {
    pub state: String,
    pub address: String,
    pub value: f64,
}

/// Final state values of the last completed run, keyed by the model's state
/// names. Keys are fixed when the session starts; captures only overwrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStore {
    values: IndexMap<String, Option<f64>>,
}

impl StateStore {
    /// Continuous states start uncaptured; time-discrete states carry their
    /// configured initial value.
    pub fn new(
        continuous: impl IntoIterator<Item = String>,
        discrete: impl IntoIterator<Item = (String, f64)>,
    ) -> Self {
        let mut values: IndexMap<String, Option<f64>> = continuous
            .into_iter()
            .map(|name| (name, None))
            .collect();
        values.extend(discrete.into_iter().map(|(name, value)| (name, Some(value))));
        Self { values }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Re-read every tracked state from the model. Either all entries are
    /// overwritten or none are.
    pub fn capture<M: ModelUnit + ?Sized>(&mut self, model: &M) -> Result<(), ModelError> {
        let mut fresh = Vec::with_capacity(self.values.len());
        for name in self.values.keys() {
            let value = match model.get(name)? {
                Value::Real(value) => value,
                Value::Bool(flag) => f64::from(u8::from(flag)),
                other => {
                    return Err(ModelError::TypeMismatch {
                        address: name.clone(),
                        expected: "real",
                        got: other,
                    });
                }
            };
            fresh.push(value);
        }

        for (slot, value) in self.values.values_mut().zip(fresh) {
            *slot = Some(value);
        }
        debug!(states = self.values.len(), "state captured");
        Ok(())
    }

    /// Restart address for every captured state. Fails on the first name the
    /// naming convention cannot express; nothing is returned in that case.
    pub fn restart_bindings(&self) -> Result<Vec<RestartBinding>, TranslationError> {
        self.values
            .iter()
            .filter_map(|(name, value)| value.map(|value| (name, value)))
            .map(|(name, value)| {
                Ok(RestartBinding {
                    state: name.clone(),
                    address: translate(name)?,
                    value,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_bindings_skip_uncaptured() {
        let store = StateStore::new(
            ["bioreactor.m[1]".to_string()],
            [("dosage.count".to_string(), 3.0)],
        );
        let bindings = store.restart_bindings().unwrap();
        assert_eq!(
            bindings,
            vec![RestartBinding {
                state: "dosage.count".into(),
                address: "dosage.count_start".into(),
                value: 3.0,
            }]
        );
    }

    #[test]
    fn test_restart_bindings_reject_bad_name() {
        let store = StateStore::new(Vec::new(), [("x[1000]".to_string(), 1.0)]);
        assert!(store.restart_bindings().is_err());
    }
}
