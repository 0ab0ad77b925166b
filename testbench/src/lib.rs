use std::path::Path;

use anyhow::{Context, Result, bail};
use explorer::canvas::{Canvas, Figure, Pen, Trace};
use explorer::config::AppConfig;
use explorer::model::{
    ModelError, ModelUnit, ResultSet, SimulateOptions, Value, VariableMetadata,
};
use explorer::models::BatchReactor;
use explorer::{SessionController, Shell, translate};
use indexmap::IndexMap;

/// Address of the growth rate every scripted state follows.
pub const RATE: &str = "plant.rate";

/// Model unit call, in the order the controller made it
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Reset,
    Set(String, Value),
    Simulate { start: f64, stop: f64, ncp: usize },
}

/// Deterministic stand-in for a compiled model unit.
///
/// Every state grows linearly at [`RATE`] from the value of its restart
/// address, so a continued run is exact. Failures are injected on demand.
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    defaults: IndexMap<String, f64>,
    values: IndexMap<String, f64>,
    states: Vec<String>,
    time: f64,
    fail_next_simulate: Option<ModelError>,
    unreadable: Option<String>,
    calls: Vec<Call>,
}

impl ScriptedModel {
    /// States whose names have no restart address get none; continuing from
    /// them must fail in the controller.
    pub fn new(states: &[&str]) -> Self {
        let mut defaults = IndexMap::new();
        defaults.insert(RATE.to_string(), 1.0);
        for state in states {
            defaults.insert(state.to_string(), 0.0);
            if let Ok(address) = translate(state) {
                defaults.insert(address, 0.0);
            }
        }
        Self {
            values: defaults.clone(),
            defaults,
            states: states.iter().map(|state| state.to_string()).collect(),
            time: 0.0,
            fail_next_simulate: None,
            unreadable: None,
            calls: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, address: &str, value: f64) -> Self {
        self.defaults.insert(address.to_string(), value);
        self.values.insert(address.to_string(), value);
        self
    }

    /// The next `simulate` call fails with `error`.
    pub fn fail_next_simulate(&mut self, error: ModelError) {
        self.fail_next_simulate = Some(error);
    }

    /// Reads of `address` fail until cleared.
    pub fn make_unreadable(&mut self, address: Option<&str>) {
        self.unreadable = address.map(str::to_string);
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Addresses written since the last reset, in order.
    pub fn writes(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Set(address, _) => Some(address.as_str()),
                _ => None,
            })
            .collect()
    }

    fn state_value(&self, state: &str, start: f64, t: f64) -> f64 {
        let initial = translate(state)
            .ok()
            .and_then(|address| self.values.get(&address).copied())
            .unwrap_or(0.0);
        let rate = self.values.get(RATE).copied().unwrap_or(1.0);
        initial + rate * (t - start)
    }
}

impl ModelUnit for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn reset(&mut self) -> Result<(), ModelError> {
        self.calls.push(Call::Reset);
        self.values = self.defaults.clone();
        self.time = 0.0;
        Ok(())
    }

    fn get(&self, address: &str) -> Result<Value, ModelError> {
        if self.unreadable.as_deref() == Some(address) {
            return Err(ModelError::UnknownVariable(address.to_string()));
        }
        self.values
            .get(address)
            .map(|value| Value::Real(*value))
            .ok_or_else(|| ModelError::UnknownVariable(address.to_string()))
    }

    fn set(&mut self, address: &str, value: &Value) -> Result<(), ModelError> {
        self.calls.push(Call::Set(address.to_string(), value.clone()));
        if self.states.iter().any(|state| state == address) {
            return Err(ModelError::NotSettable(address.to_string()));
        }
        let Some(number) = value.as_real() else {
            return Err(ModelError::TypeMismatch {
                address: address.to_string(),
                expected: "real",
                got: value.clone(),
            });
        };
        match self.values.get_mut(address) {
            Some(slot) => {
                *slot = number;
                Ok(())
            }
            None => Err(ModelError::UnknownVariable(address.to_string())),
        }
    }

    fn simulate(
        &mut self,
        start: f64,
        stop: f64,
        options: &SimulateOptions,
    ) -> Result<ResultSet, ModelError> {
        self.calls.push(Call::Simulate {
            start,
            stop,
            ncp: options.ncp,
        });
        if let Some(error) = self.fail_next_simulate.take() {
            return Err(error);
        }
        if stop <= start {
            return Err(ModelError::InvalidWindow { start, stop });
        }

        let ncp = options.ncp.max(1);
        let time: Vec<f64> = (0..=ncp)
            .map(|i| start + (stop - start) * i as f64 / ncp as f64)
            .collect();
        let mut results = ResultSet::new(time.clone());
        let names: Vec<String> = if options.outputs.is_empty() {
            self.values.keys().cloned().collect()
        } else {
            options.outputs.clone()
        };
        for name in names {
            let samples = if self.states.contains(&name) {
                time.iter()
                    .map(|t| self.state_value(&name, start, *t))
                    .collect()
            } else {
                let value = self
                    .values
                    .get(&name)
                    .copied()
                    .ok_or_else(|| ModelError::UnknownVariable(name.clone()))?;
                vec![value; time.len()]
            };
            results.insert(name, samples);
        }

        for state in self.states.clone() {
            let value = self.state_value(&state, start, stop);
            self.values.insert(state, value);
        }
        self.time = stop;
        Ok(results)
    }

    fn variable_metadata(&self, address: &str) -> Result<VariableMetadata, ModelError> {
        if !self.values.contains_key(address) {
            return Err(ModelError::UnknownVariable(address.to_string()));
        }
        Ok(VariableMetadata {
            description: format!("scripted {address}"),
            unit: String::new(),
        })
    }

    fn continuous_states(&self) -> Vec<String> {
        self.states.clone()
    }

    fn variables(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn time(&self) -> f64 {
        self.time
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    Figure(Figure),
    Plot {
        panel: usize,
        x: String,
        y: String,
        pen: Pen,
        samples: usize,
    },
    Legend(usize, Vec<String>),
    Retitle(usize, String),
}

/// Canvas that keeps every drawing call for inspection.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub events: Vec<CanvasEvent>,
}

impl RecordingCanvas {
    pub fn plots(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                CanvasEvent::Plot { x, y, .. } => Some((x.as_str(), y.as_str())),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for RecordingCanvas {
    fn figure(&mut self, figure: &Figure) {
        self.events.push(CanvasEvent::Figure(figure.clone()));
    }

    fn plot(&mut self, panel: usize, x: &Trace<'_>, y: &Trace<'_>, pen: Pen) {
        self.events.push(CanvasEvent::Plot {
            panel,
            x: x.name.to_string(),
            y: y.name.to_string(),
            pen,
            samples: y.samples.len(),
        });
    }

    fn legend(&mut self, panel: usize, labels: &[&str]) {
        self.events.push(CanvasEvent::Legend(
            panel,
            labels.iter().map(|label| label.to_string()).collect(),
        ));
    }

    fn retitle(&mut self, panel: usize, title: &str) {
        self.events.push(CanvasEvent::Retitle(panel, title.to_string()));
    }
}

/// Application description for a [`ScriptedModel`] with one tank level and
/// one controller integrator.
pub const SCRIPTED_APP: &str = r#"
application: scripted
model: scripted
simulation_time: 2.0
parameters:
  - { name: rate,    address: "plant.rate",        value: 1.0 }
  - { name: L_start, address: "tank.L_start",      value: 0.5 }
  - { name: I_start, address: "ctrl.I_start",      value: 0.0 }
checks:
  - "rate > 0"
  - "L_start >= 0"
plot:
  layout: PhasePlane
  title: scripted
"#;

pub const SCRIPTED_STATES: &[&str] = &["tank.L", "ctrl.limPID.I.y"];

pub fn scripted_controller() -> Result<SessionController<ScriptedModel>> {
    let config = AppConfig::from_yaml(SCRIPTED_APP)?;
    let model = ScriptedModel::new(SCRIPTED_STATES);
    Ok(SessionController::new(model, config)?)
}

pub fn batch_controller() -> Result<SessionController<BatchReactor>> {
    Ok(SessionController::new(
        BatchReactor::new(),
        AppConfig::builtin()?,
    )?)
}

/// Outcome of one checked script line
#[derive(Debug)]
pub struct Mismatch {
    pub line: usize,
    pub command: String,
    pub expected: String,
    pub output: String,
}

/// Run an operator script against the built-in batch application.
///
/// `#> text` asserts that the output of the preceding command contains
/// `text`; `#! text` asserts that it does not. Other `#` lines are comments.
pub fn run_script(script: &str) -> Result<Vec<Mismatch>> {
    let mut shell = Shell::new(batch_controller()?, Vec::<u8>::new());
    let mut mismatches = Vec::new();
    let mut command = String::new();
    let mut output_start = 0;
    let mut output = String::new();

    for (index, line) in script.lines().enumerate() {
        let line = line.trim();
        let expectation = if let Some(text) = line.strip_prefix("#>") {
            Some((text.trim(), true))
        } else {
            line.strip_prefix("#!").map(|text| (text.trim(), false))
        };

        if let Some((text, present)) = expectation {
            if output.contains(text) != present {
                mismatches.push(Mismatch {
                    line: index + 1,
                    command: command.clone(),
                    expected: format!("{}{text}", if present { "" } else { "no " }),
                    output: output.clone(),
                });
            }
            continue;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        command = line.to_string();
        shell
            .execute_line(line)
            .with_context(|| format!("line {}: {}", index + 1, line))?;
        let written = shell.output();
        output = String::from_utf8_lossy(&written[output_start..]).into_owned();
        output_start = written.len();
    }

    Ok(mismatches)
}

pub fn run_script_file(path: &Path) -> Result<()> {
    let script = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mismatches = run_script(&script)?;
    if mismatches.is_empty() {
        return Ok(());
    }
    let mut report = String::new();
    for mismatch in &mismatches {
        report.push_str(&format!(
            "line {}: after `{}` expected {:?}, got:\n{}\n",
            mismatch.line, mismatch.command, mismatch.expected, mismatch.output
        ));
    }
    bail!("{} expectation(s) failed\n{}", mismatches.len(), report)
}
