use std::fmt;

use crate::config::AppConfig;
use crate::error::ExploreError;
use crate::model::{ModelUnit, Value};
use crate::parameters::ParameterStore;

/// Component prefixes that never name a model part.
const SCRATCH_COMPONENTS: &[&str] = &[
    "der", "temp_1", "temp_2", "temp_3", "temp_4", "temp_5", "temp_6", "temp_7",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispMode {
    /// `name : value`
    #[default]
    Short,
    /// `address : name : value`
    Long,
}

impl std::str::FromStr for DispMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(DispMode::Short),
            "long" | "location" => Ok(DispMode::Long),
            _ => Err(format!("Unknown disp mode: '{}'", s)),
        }
    }
}

/// 2^53, from where on `f64` has no fractional digits.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A model value rounded for display. Booleans and text pass through.
pub struct Rounded<'a> {
    value: &'a Value,
    decimals: usize,
}

impl<'a> Rounded<'a> {
    pub fn new(value: &'a Value, decimals: usize) -> Self {
        Self { value, decimals }
    }
}

impl fmt::Display for Rounded<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Value::Real(value) = self.value else {
            return write!(f, "{}", self.value);
        };
        let scale = 10f64.powi(self.decimals.min(15) as i32);
        // Beyond 2^53 every float is already integral; scaling could overflow.
        let rounded = if value.abs() >= MAX_EXACT_INTEGER || !(value * scale).is_finite() {
            *value
        } else {
            (value * scale).round() / scale
        };
        if rounded.is_finite() && rounded.fract() == 0.0 {
            write!(f, "{rounded:.1}")
        } else {
            write!(f, "{rounded}")
        }
    }
}

/// First segment of a variable name, cut at `.` or `(`.
fn component(variable: &str) -> &str {
    if variable.starts_with('_') {
        return "";
    }
    let end = variable.find(|c: char| c == '.' || c == '(').unwrap_or(variable.len());
    let name = &variable[..end];
    if SCRATCH_COMPONENTS.contains(&name) {
        ""
    } else {
        name
    }
}

/// Read-only queries over the parameter bindings and the model unit.
pub struct Introspector<'a, M: ModelUnit + ?Sized> {
    model: &'a M,
    parameters: &'a ParameterStore,
    config: &'a AppConfig,
}

impl<'a, M: ModelUnit + ?Sized> Introspector<'a, M> {
    pub fn new(model: &'a M, parameters: &'a ParameterStore, config: &'a AppConfig) -> Self {
        Self {
            model,
            parameters,
            config,
        }
    }

    /// Report lines for a topic, a parameter name, or a model variable.
    pub fn describe(&self, name: &str, decimals: usize) -> Result<Vec<String>, ExploreError> {
        match name {
            "culture" => Ok(vec![self.config.topics.culture.clone()]),
            "broth" | "liquidphase" | "media" => self.broth(),
            "parts" => Ok(vec![self.parts()]),
            "MSL" => Ok(vec![format!("MSL: {}", self.config.versions.msl_usage)]),
            "time" => Ok(vec![format!("Time [ {} ]", self.config.time_unit)]),
            _ => self.variable(name, decimals).map(|line| vec![line]),
        }
    }

    fn broth(&self) -> Result<Vec<String>, ExploreError> {
        let mut lines = vec![
            String::new(),
            "Reactor broth substances included in the model".to_string(),
            String::new(),
        ];
        for substance in &self.config.topics.broth {
            let description = self.model.variable_metadata(&substance.variable)?.description;
            let index = self.model.get(&substance.variable)?;
            let weight = self.model.get(&substance.molecular_weight)?;
            lines.push(format!(
                "{description} index = {index} molecular weight = {weight} Da"
            ));
        }
        Ok(lines)
    }

    /// Model parts from the variable names, merged into the configured
    /// minimum list and sorted without regard to case.
    pub fn components(&self) -> Vec<String> {
        let mut components = self.config.components.minimum.clone();
        for variable in self.model.variables() {
            let name = component(&variable);
            if !components.iter().any(|known| known == name)
                && !self.config.components.excluded.iter().any(|skip| skip == name)
            {
                components.push(name.to_string());
            }
        }
        components.sort_by_key(|name| name.to_lowercase());
        components
    }

    fn parts(&self) -> String {
        let quoted: Vec<String> = self
            .components()
            .iter()
            .map(|name| format!("'{name}'"))
            .collect();
        format!("[{}]", quoted.join(", "))
    }

    fn variable(&self, name: &str, decimals: usize) -> Result<String, ExploreError> {
        let address = self.parameters.address_of(name).unwrap_or(name);
        let metadata = self.model.variable_metadata(address)?;
        let value = self.model.get(address)?;
        let shown = Rounded::new(&value, decimals);
        if metadata.unit.is_empty() {
            Ok(format!("{} : {shown}", metadata.description))
        } else {
            Ok(format!("{} : {shown} [ {} ]", metadata.description, metadata.unit))
        }
    }

    /// Bindings whose name or address contains `filter`, with values read
    /// from the model rather than the store.
    pub fn disp(
        &self,
        filter: &str,
        mode: DispMode,
        decimals: usize,
    ) -> Result<Vec<String>, ExploreError> {
        let mut lines = Vec::new();
        for parameter in self.parameters.bindings() {
            if !(parameter.name.contains(filter) || parameter.address.contains(filter)) {
                continue;
            }
            let value = self.model.get(&parameter.address)?;
            let shown = Rounded::new(&value, decimals);
            lines.push(match mode {
                DispMode::Short => format!("{} : {shown}", parameter.name),
                DispMode::Long => format!("{} : {} : {shown}", parameter.address, parameter.name),
            });
        }
        Ok(lines)
    }

    /// Platform, model and library versions.
    pub fn system_info(&self) -> Vec<String> {
        let versions = &self.config.versions;
        vec![
            String::new(),
            "System information".to_string(),
            format!(" -OS: {}", std::env::consts::OS),
            format!(" -Explorer: {}", env!("CARGO_PKG_VERSION")),
            format!(" -Name: {}", self.model.name()),
            format!(" -Type: {:?}", self.config.interface),
            format!(" -MSL: {}", versions.msl),
            format!(" -Library: {}", versions.library),
            format!(" -{}", versions.explore),
        ]
    }
}
