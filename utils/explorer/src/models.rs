//! Built-in model units.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::config::ConfigError;
use crate::model::{
    ModelError, ModelUnit, ResultSet, SimulateOptions, Value, VariableMetadata,
};

pub const BATCH_REACTOR: &str = "batch-reactor";

pub const MODELS: &[&str] = &[BATCH_REACTOR];

pub fn available_models() -> &'static [&'static str] {
    MODELS
}

pub fn create_model(model_id: &str) -> Result<Box<dyn ModelUnit>, ConfigError> {
    match model_id {
        BATCH_REACTOR => Ok(Box::new(BatchReactor::new())),
        _ => Err(ConfigError::UnknownModel(model_id.to_string())),
    }
}

/// Longest integration step. Output intervals are split into equal substeps
/// no longer than this, so windows that share a grid share their steps.
const MAX_STEP: f64 = 0.01;

/// Integration steps one `simulate` call may take before it gives up.
const MAX_STEPS: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    Parameter(f64),
    Constant(f64),
    State,
    Output,
}

struct Variable {
    name: &'static str,
    role: Role,
    description: &'static str,
    unit: &'static str,
}

const fn var(
    name: &'static str,
    role: Role,
    description: &'static str,
    unit: &'static str,
) -> Variable {
    Variable {
        name,
        role,
        description,
        unit,
    }
}

const VARIABLES: &[Variable] = &[
    var("bioreactor.V_start", Role::Parameter(1.0), "Broth volume at start", "L"),
    var("bioreactor.m_start[1]", Role::Parameter(1.0), "Cell mass at start", "g"),
    var("bioreactor.m_start[2]", Role::Parameter(10.0), "Substrate mass at start", "g"),
    var("bioreactor.culture.Y", Role::Parameter(0.5), "Cell yield", "Xmol/Smol"),
    var("bioreactor.culture.qSmax", Role::Parameter(1.0), "Maximal specific substrate uptake rate", "mol/(Xmol*h)"),
    var("bioreactor.culture.Ks", Role::Parameter(0.1), "Half saturation substrate concentration", "mol/L"),
    var("bioreactor.V", Role::State, "Broth volume", "L"),
    var("bioreactor.m[1]", Role::State, "Cell mass", "g"),
    var("bioreactor.m[2]", Role::State, "Substrate mass", "g"),
    var("der(bioreactor.m[1])", Role::Output, "der(Cell mass)", "g/h"),
    var("der(bioreactor.m[2])", Role::Output, "der(Substrate mass)", "g/h"),
    var("bioreactor.c[1]", Role::Output, "Cell concentration", "g/L"),
    var("bioreactor.c[2]", Role::Output, "Substrate concentration", "g/L"),
    var("bioreactor.culture.q[1]", Role::Output, "Specific cell growth rate", "1/h"),
    var("bioreactor.culture.q[2]", Role::Output, "Specific substrate rate", "1/h"),
    var("bioreactor.culture.mu", Role::Output, "Cell specific growth rate variable", "1/h"),
    var("liquidphase.X", Role::Constant(1.0), "Cell concentration", ""),
    var("liquidphase.S", Role::Constant(2.0), "Substrate", ""),
    var("liquidphase.mw[1]", Role::Constant(24.6), "Molecular weight of cells", "Da"),
    var("liquidphase.mw[2]", Role::Constant(180.0), "Molecular weight of substrate", "Da"),
];

fn lookup(address: &str) -> Result<&'static Variable, ModelError> {
    VARIABLES
        .iter()
        .find(|variable| variable.name == address)
        .ok_or_else(|| ModelError::UnknownVariable(address.to_string()))
}

/// Volume, cell mass, substrate mass.
type Broth = [f64; 3];

#[derive(Debug, Clone, Copy)]
struct Culture {
    y: f64,
    qs_max: f64,
    ks: f64,
}

impl Culture {
    /// Specific rates `(mu, -qS)` at the broth composition.
    fn rates(&self, broth: &Broth) -> (f64, f64) {
        let [v, _, m_s] = *broth;
        let s = m_s / v;
        let qs = self.qs_max * s / (self.ks + s);
        (self.y * qs, -qs)
    }

    fn derivative(&self, broth: &Broth) -> Broth {
        let (q_x, q_s) = self.rates(broth);
        let m_x = broth[1];
        [0.0, q_x * m_x, q_s * m_x]
    }

    fn rk4(&self, broth: &Broth, h: f64) -> Broth {
        let shifted = |base: &Broth, k: &Broth, scale: f64| -> Broth {
            [
                base[0] + scale * k[0],
                base[1] + scale * k[1],
                base[2] + scale * k[2],
            ]
        };
        let k1 = self.derivative(broth);
        let k2 = self.derivative(&shifted(broth, &k1, h / 2.0));
        let k3 = self.derivative(&shifted(broth, &k2, h / 2.0));
        let k4 = self.derivative(&shifted(broth, &k3, h));
        std::array::from_fn(|i| broth[i] + h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
    }
}

/// Batch cultivation of the textbook culture: cells grow on a single
/// substrate with Monod kinetics in a constant volume.
#[derive(Debug, Clone)]
pub struct BatchReactor {
    parameters: IndexMap<&'static str, f64>,
    broth: Broth,
    time: f64,
}

impl Default for BatchReactor {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchReactor {
    pub fn new() -> Self {
        let parameters = VARIABLES
            .iter()
            .filter_map(|variable| match variable.role {
                Role::Parameter(default) => Some((variable.name, default)),
                _ => None,
            })
            .collect();
        let mut model = Self {
            parameters,
            broth: [0.0; 3],
            time: 0.0,
        };
        model.broth = model.start_broth();
        model
    }

    fn parameter(&self, name: &str) -> f64 {
        self.parameters.get(name).copied().unwrap_or(f64::NAN)
    }

    fn start_broth(&self) -> Broth {
        [
            self.parameter("bioreactor.V_start"),
            self.parameter("bioreactor.m_start[1]"),
            self.parameter("bioreactor.m_start[2]"),
        ]
    }

    fn culture(&self) -> Culture {
        Culture {
            y: self.parameter("bioreactor.culture.Y"),
            qs_max: self.parameter("bioreactor.culture.qSmax"),
            ks: self.parameter("bioreactor.culture.Ks"),
        }
    }

    fn output(&self, broth: &Broth, name: &str) -> Option<f64> {
        let culture = self.culture();
        let [v, m_x, m_s] = *broth;
        let value = match name {
            "bioreactor.V" => v,
            "bioreactor.m[1]" => m_x,
            "bioreactor.m[2]" => m_s,
            "bioreactor.c[1]" => m_x / v,
            "bioreactor.c[2]" => m_s / v,
            "bioreactor.culture.q[1]" | "bioreactor.culture.mu" => culture.rates(broth).0,
            "bioreactor.culture.q[2]" => culture.rates(broth).1,
            "der(bioreactor.m[1])" => culture.derivative(broth)[1],
            "der(bioreactor.m[2])" => culture.derivative(broth)[2],
            _ => return None,
        };
        Some(value)
    }

    fn check(broth: &Broth, time: f64) -> Result<(), ModelError> {
        if broth.iter().any(|value| !value.is_finite()) {
            return Err(ModelError::SolverFailed {
                time,
                reason: "state is not finite".to_string(),
            });
        }
        if broth[0] <= 0.0 {
            return Err(ModelError::SolverFailed {
                time,
                reason: format!("broth volume {} is not positive", broth[0]),
            });
        }
        Ok(())
    }
}

impl ModelUnit for BatchReactor {
    fn name(&self) -> &str {
        "BPL_TEST2_Batch"
    }

    fn reset(&mut self) -> Result<(), ModelError> {
        *self = Self::new();
        Ok(())
    }

    fn get(&self, address: &str) -> Result<Value, ModelError> {
        let variable = lookup(address)?;
        let value = match variable.role {
            Role::Parameter(_) => self.parameter(address),
            Role::Constant(value) => value,
            Role::State | Role::Output => self
                .output(&self.broth, address)
                .ok_or_else(|| ModelError::UnknownVariable(address.to_string()))?,
        };
        Ok(Value::Real(value))
    }

    fn set(&mut self, address: &str, value: &Value) -> Result<(), ModelError> {
        let variable = lookup(address)?;
        if !matches!(variable.role, Role::Parameter(_)) {
            return Err(ModelError::NotSettable(address.to_string()));
        }
        let Value::Real(number) = value else {
            return Err(ModelError::TypeMismatch {
                address: address.to_string(),
                expected: "real",
                got: value.clone(),
            });
        };
        self.parameters.insert(variable.name, *number);
        Ok(())
    }

    fn simulate(
        &mut self,
        start: f64,
        stop: f64,
        options: &SimulateOptions,
    ) -> Result<ResultSet, ModelError> {
        if !(start.is_finite() && stop.is_finite() && start >= 0.0 && stop > start) {
            return Err(ModelError::InvalidWindow { start, stop });
        }
        let recorded: Vec<&str> = if options.outputs.is_empty() {
            VARIABLES.iter().map(|variable| variable.name).collect()
        } else {
            options
                .outputs
                .iter()
                .map(|name| lookup(name).map(|variable| variable.name))
                .collect::<Result<_, _>>()?
        };

        let ncp = options.ncp.max(1);
        let interval = (stop - start) / ncp as f64;
        let substeps = (interval / MAX_STEP).ceil().max(1.0);
        if substeps * ncp as f64 > MAX_STEPS as f64 {
            return Err(ModelError::SolverFailed {
                time: start,
                reason: format!(
                    "window of {} needs more than {MAX_STEPS} integration steps",
                    stop - start
                ),
            });
        }
        let substeps = substeps as usize;
        let h = interval / substeps as f64;
        debug!(start, stop, ncp, substeps, "batch reactor simulate");
        trace!(handling = ?options.result_handling, log = ?options.solver_log, "result options");

        let culture = self.culture();
        let mut broth = self.start_broth();
        Self::check(&broth, start)?;

        let mut time = Vec::with_capacity(ncp + 1);
        let mut samples: Vec<Vec<f64>> = vec![Vec::with_capacity(ncp + 1); recorded.len()];
        let mut record = |t: f64, broth: &Broth| {
            time.push(t);
            for (name, series) in recorded.iter().zip(samples.iter_mut()) {
                let value = match lookup(name).map(|variable| variable.role) {
                    Ok(Role::Parameter(_)) => self.parameter(name),
                    Ok(Role::Constant(value)) => value,
                    _ => self.output(broth, name).unwrap_or(f64::NAN),
                };
                series.push(value);
            }
        };

        record(start, &broth);
        for point in 1..=ncp {
            for _ in 0..substeps {
                broth = culture.rk4(&broth, h);
            }
            let t = start + interval * point as f64;
            Self::check(&broth, t)?;
            record(t, &broth);
        }

        let mut results = ResultSet::new(time);
        for (name, series) in recorded.into_iter().zip(samples) {
            results.insert(name, series);
        }
        self.broth = broth;
        self.time = stop;
        Ok(results)
    }

    fn variable_metadata(&self, address: &str) -> Result<VariableMetadata, ModelError> {
        let variable = lookup(address)?;
        Ok(VariableMetadata {
            description: variable.description.to_string(),
            unit: variable.unit.to_string(),
        })
    }

    fn continuous_states(&self) -> Vec<String> {
        VARIABLES
            .iter()
            .filter(|variable| variable.role == Role::State)
            .map(|variable| variable.name.to_string())
            .collect()
    }

    fn variables(&self) -> Vec<String> {
        VARIABLES
            .iter()
            .map(|variable| variable.name.to_string())
            .collect()
    }

    fn time(&self) -> f64 {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(model: &BatchReactor, name: &str) -> f64 {
        model.get(name).unwrap().as_real().unwrap()
    }

    #[test]
    fn test_create_model() {
        assert!(create_model(BATCH_REACTOR).is_ok());
        assert!(matches!(
            create_model("svg-micro"),
            Err(ConfigError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_substrate_is_consumed() {
        let mut model = BatchReactor::new();
        let results = model
            .simulate(0.0, 5.0, &SimulateOptions::default())
            .unwrap();
        assert_eq!(results.samples(), 501);
        let s = results.final_value("bioreactor.c[2]").unwrap();
        let x = results.final_value("bioreactor.c[1]").unwrap();
        assert!(s < 10.0 && s >= -1e-6, "S = {s}");
        // Cell mass grows by the yield times the consumed substrate.
        assert!((x - (1.0 + 0.5 * (10.0 - s))).abs() < 1e-6, "X = {x}");
        assert_eq!(model.time(), 5.0);
        assert_eq!(real(&model, "bioreactor.m[1]"), x);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut model = BatchReactor::new();
        model.set("bioreactor.culture.Y", &Value::Real(0.9)).unwrap();
        model.simulate(0.0, 1.0, &SimulateOptions::default()).unwrap();
        model.reset().unwrap();
        assert_eq!(real(&model, "bioreactor.culture.Y"), 0.5);
        assert_eq!(real(&model, "bioreactor.m[1]"), 1.0);
        assert_eq!(model.time(), 0.0);
    }

    #[test]
    fn test_engine_failures() {
        let mut model = BatchReactor::new();
        assert!(matches!(
            model.simulate(2.0, 1.0, &SimulateOptions::default()),
            Err(ModelError::InvalidWindow { .. })
        ));
        model.set("bioreactor.V_start", &Value::Real(0.0)).unwrap();
        assert!(matches!(
            model.simulate(0.0, 1.0, &SimulateOptions::default()),
            Err(ModelError::SolverFailed { .. })
        ));
        assert!(matches!(
            model.set("bioreactor.V", &Value::Real(1.0)),
            Err(ModelError::NotSettable(_))
        ));
        assert!(matches!(
            model.set("bioreactor.culture.Y", &Value::Bool(true)),
            Err(ModelError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_oversized_window_rejected() {
        let mut model = BatchReactor::new();
        for stop in [1e6, 1e18] {
            assert!(matches!(
                model.simulate(0.0, stop, &SimulateOptions::default()),
                Err(ModelError::SolverFailed { time, .. }) if time == 0.0
            ));
        }
        assert_eq!(model.time(), 0.0);
        assert!(model.simulate(0.0, 50.0, &SimulateOptions::default()).is_ok());
    }

    #[test]
    fn test_output_filter() {
        let mut model = BatchReactor::new();
        let options = SimulateOptions {
            ncp: 12,
            outputs: vec!["bioreactor.c[1]".to_string()],
            ..SimulateOptions::default()
        };
        let results = model.simulate(0.0, 1.0, &options).unwrap();
        assert_eq!(
            results.names().collect::<Vec<_>>(),
            vec!["time", "bioreactor.c[1]"]
        );
        assert_eq!(results.samples(), 13);
    }
}
