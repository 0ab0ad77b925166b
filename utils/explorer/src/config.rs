use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::model::Interface;
use crate::parameters::{Parameter, ParameterStore, Predicate};

/// Application description shipped with the binary.
pub const BUILTIN: &str = include_str!("../configs/bpl_test2_batch.yaml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed application description: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("check `{0}` is not of the form `<name> <op> <number>`")]
    InvalidCheck(String),
    #[error("name `{0}` is bound more than once")]
    DuplicateName(String),
    #[error("address `{address}` is bound to both `{first}` and `{second}`")]
    DuplicateAddress {
        address: String,
        first: String,
        second: String,
    },
    #[error("check `{0}` refers to a name that is not a parameter")]
    UnknownCheckParameter(String),
    #[error("unknown model `{0}`")]
    UnknownModel(String),
    #[error("unknown plot layout `{0}`")]
    UnknownLayout(String),
}

#[derive(Deserialize, Debug, Clone)]
pub struct PlotConfig {
    pub layout: String,
    pub title: String,
}

/// A broth substance listed by `describe broth`.
#[derive(Deserialize, Debug, Clone)]
pub struct Substance {
    pub variable: String,
    pub molecular_weight: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Topics {
    #[serde(default)]
    pub culture: String,
    #[serde(default)]
    pub broth: Vec<Substance>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Components {
    /// Always listed, whether or not the model variables mention them.
    #[serde(default)]
    pub minimum: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Versions {
    #[serde(default)]
    pub msl: String,
    #[serde(default)]
    pub msl_usage: String,
    #[serde(default)]
    pub library: String,
    #[serde(default)]
    pub explore: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub application: String,
    /// Identifier passed to [`crate::models::create_model`].
    pub model: String,
    #[serde(default)]
    pub interface: Interface,
    pub simulation_time: f64,
    #[serde(default = "default_start_marker")]
    pub start_marker: String,
    pub parameters: Vec<Parameter>,
    /// Describe-only names, never written to the model.
    #[serde(default)]
    pub aliases: IndexMap<String, String>,
    #[serde(default)]
    pub checks: Vec<String>,
    #[serde(default)]
    pub key_variables: Vec<String>,
    #[serde(default)]
    pub time_discrete_states: IndexMap<String, f64>,
    pub plot: PlotConfig,
    #[serde(default)]
    pub topics: Topics,
    #[serde(default)]
    pub components: Components,
    #[serde(default)]
    pub versions: Versions,
    #[serde(default = "default_decimals")]
    pub decimals: usize,
    #[serde(default = "default_time_unit")]
    pub time_unit: String,
}

fn default_start_marker() -> String {
    "_start".to_string()
}

fn default_decimals() -> usize {
    3
}

fn default_time_unit() -> String {
    "h".to_string()
}

impl AppConfig {
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(BUILTIN)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn predicates(&self) -> Result<Vec<Predicate>, ConfigError> {
        self.checks.iter().map(|check| check.parse()).collect()
    }

    pub fn parameter_store(&self) -> Result<ParameterStore, ConfigError> {
        ParameterStore::new(
            self.parameters.iter().cloned(),
            self.aliases
                .iter()
                .map(|(name, address)| (name.clone(), address.clone())),
            self.predicates()?,
            self.start_marker.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    #[test]
    fn test_builtin_application() {
        let config = AppConfig::builtin().unwrap();
        assert_eq!(config.application, "BPL_TEST2_Batch");
        assert_eq!(config.simulation_time, 5.0);
        assert_eq!(config.plot.layout, "TimeSeries");

        let store = config.parameter_store().unwrap();
        assert_eq!(store.bindings().count(), 6);
        assert_eq!(store.predicates().len(), 6);
        assert_eq!(store.address_of("VX_start"), Some("bioreactor.m_start[1]"));
        assert_eq!(store.get("Y").unwrap().1, Some(&Value::Real(0.5)));
        assert!(store.check().is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = format!("{BUILTIN}\nextra: 1\n");
        assert!(matches!(
            AppConfig::from_yaml(&yaml),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_check_on_alias_rejected() {
        let mut config = AppConfig::builtin().unwrap();
        config.checks.push("mu > 0".to_string());
        assert!(matches!(
            config.parameter_store(),
            Err(ConfigError::UnknownCheckParameter(_))
        ));
    }
}
