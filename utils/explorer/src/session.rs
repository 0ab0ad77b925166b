use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::canvas::Canvas;
use crate::config::{AppConfig, ConfigError};
use crate::diagram::{DiagramRegistry, RenderError};
use crate::error::ExploreError;
use crate::introspect::Introspector;
use crate::model::{
    Interface, ModelUnit, ResultHandling, SimulateOptions, SolverLog, Value,
};
use crate::parameters::{ParameterStore, SetReport};
use crate::state::{RestartBinding, StateStore};

/// Named run presets trading resolution for speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationProfile {
    /// Full resolution, binary result capture.
    #[default]
    Standard,
    /// Coarse grid kept in memory.
    Fast,
    /// Coarse grid, binary result capture.
    Data,
}

impl SimulationProfile {
    pub fn options(self, interface: Interface, outputs: Vec<String>) -> SimulateOptions {
        let (ncp, result_handling) = match self {
            SimulationProfile::Standard => (500, ResultHandling::Binary),
            SimulationProfile::Fast => (12, ResultHandling::Memory),
            SimulationProfile::Data => (12, ResultHandling::Binary),
        };
        let solver_log = match interface {
            Interface::CoSimulation => SolverLog::Silent,
            Interface::ModelExchange => SolverLog::Verbosity(50),
        };
        SimulateOptions {
            ncp,
            result_handling,
            solver_log,
            outputs,
        }
    }
}

impl FromStr for SimulationProfile {
    type Err = ExploreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" | "std" | "opts_std" => Ok(SimulationProfile::Standard),
            "fast" | "opts_fast" => Ok(SimulationProfile::Fast),
            "data" | "opts_data" => Ok(SimulationProfile::Data),
            _ => Err(ExploreError::UnknownProfile(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Fresh run from time zero.
    Initial,
    /// Resume from the final state of the previous run.
    Continued,
}

impl FromStr for RunMode {
    type Err = ExploreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Initial" | "initial" | "init" => Ok(RunMode::Initial),
            "Continued" | "continued" | "cont" => Ok(RunMode::Continued),
            _ => Err(ExploreError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Initial => write!(f, "initial"),
            RunMode::Continued => write!(f, "continued"),
        }
    }
}

/// Time bookkeeping shared by the runs of one exploration session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Session {
    /// Mode of the last completed run.
    pub mode: Option<RunMode>,
    /// Window length used when a run does not name one.
    pub duration: f64,
    /// End of the last completed run; zero until one completes.
    pub previous_final_time: f64,
    /// Model clock after the last completed run.
    pub time_cursor: f64,
}

impl Session {
    pub fn new(duration: f64) -> Self {
        Self {
            mode: None,
            duration,
            previous_final_time: 0.0,
            time_cursor: 0.0,
        }
    }

    pub fn can_continue(&self) -> bool {
        self.previous_final_time > 0.0
    }
}

/// Summary of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub mode: RunMode,
    pub start: f64,
    pub stop: f64,
    pub samples: usize,
    pub restarts: Vec<RestartBinding>,
    /// Drawing problems do not fail the run.
    pub render: Option<RenderError>,
}

/// Owns the model unit and every store, and sequences the run cycle.
pub struct SessionController<M: ModelUnit> {
    model: M,
    config: AppConfig,
    parameters: ParameterStore,
    states: StateStore,
    diagrams: DiagramRegistry,
    session: Session,
}

impl<M: ModelUnit> SessionController<M> {
    pub fn new(model: M, config: AppConfig) -> Result<Self, ConfigError> {
        let parameters = config.parameter_store()?;
        let diagrams = DiagramRegistry::new(&config.plot.layout, &config.plot.title)
            .map_err(|_| ConfigError::UnknownLayout(config.plot.layout.clone()))?;
        let states = StateStore::new(
            model.continuous_states(),
            config
                .time_discrete_states
                .iter()
                .map(|(name, value)| (name.clone(), *value)),
        );
        let session = Session::new(config.simulation_time);
        debug!(
            model = model.name(),
            states = states.len(),
            parameters = parameters.bindings().count(),
            "session ready"
        );
        Ok(Self {
            model,
            config,
            parameters,
            states,
            diagrams,
            session,
        })
    }

    pub fn set_parameters<K, I>(&mut self, updates: I) -> SetReport
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        self.parameters.set(updates)
    }

    pub fn set_initial_values<K, I>(&mut self, updates: I) -> SetReport
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        self.parameters.set_initial(updates)
    }

    pub fn select_layout(
        &mut self,
        name: &str,
        title: &str,
        canvas: &mut dyn Canvas,
    ) -> Result<(), ExploreError> {
        self.diagrams.select_layout(name, title, canvas)
    }

    pub fn redisplay(&mut self, canvas: &mut dyn Canvas) -> Result<(), ExploreError> {
        self.diagrams.redisplay(canvas)
    }

    /// One simulation window. Every rejection before `simulate` returns
    /// leaves the session, the state store and the diagrams untouched.
    pub fn run(
        &mut self,
        mode: RunMode,
        duration: Option<f64>,
        profile: SimulationProfile,
        canvas: &mut dyn Canvas,
    ) -> Result<RunReport, ExploreError> {
        let duration = duration.unwrap_or(self.session.duration);
        if !(duration.is_finite() && duration > 0.0) {
            return Err(ExploreError::InvalidDuration(duration));
        }

        let missing = self.parameters.missing_values();
        if !missing.is_empty() {
            return Err(ExploreError::MissingValue { keys: missing });
        }

        let (start, restarts) = match mode {
            RunMode::Initial => (0.0, Vec::new()),
            RunMode::Continued => {
                if !self.session.can_continue() {
                    return Err(ExploreError::Ordering);
                }
                (
                    self.session.previous_final_time,
                    self.states.restart_bindings()?,
                )
            }
        };
        let stop = start + duration;
        info!(%mode, start, stop, ?profile, "simulation started");

        self.model.reset().map_err(ExploreError::Engine)?;
        self.apply(&restarts)?;

        let options = profile.options(self.config.interface, self.outputs());
        let results = self
            .model
            .simulate(start, stop, &options)
            .map_err(ExploreError::Engine)?;
        let samples = results.samples();

        let render = self.diagrams.render(results, canvas).err();
        if let Some(err) = &render {
            warn!("diagram not drawn: {err}");
        }

        if let Err(err) = self.states.capture(&self.model) {
            self.session.previous_final_time = 0.0;
            return Err(ExploreError::Capture(err));
        }

        self.session.mode = Some(mode);
        self.session.previous_final_time = match mode {
            RunMode::Initial => duration,
            RunMode::Continued => self.session.previous_final_time + duration,
        };
        self.session.time_cursor = self.model.time();
        self.session.duration = duration;
        info!(
            final_time = self.session.previous_final_time,
            samples, "simulation finished"
        );

        Ok(RunReport {
            mode,
            start,
            stop,
            samples,
            restarts,
            render,
        })
    }

    /// Write every parameter binding, then the restart values.
    fn apply(&mut self, restarts: &[RestartBinding]) -> Result<(), ExploreError> {
        for parameter in self.parameters.bindings() {
            let Some(value) = &parameter.value else {
                continue;
            };
            debug!(address = %parameter.address, %value, "binding applied");
            self.model
                .set(&parameter.address, value)
                .map_err(|source| ExploreError::Binding {
                    address: parameter.address.clone(),
                    source,
                })?;
        }
        for restart in restarts {
            debug!(state = %restart.state, address = %restart.address, value = restart.value, "restart applied");
            self.model
                .set(&restart.address, &Value::Real(restart.value))
                .map_err(|source| ExploreError::Binding {
                    address: restart.address.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Series the diagrams draw plus the key variables, limited to what the
    /// model exposes.
    fn outputs(&self) -> Vec<String> {
        let known: HashSet<String> = self.model.variables().into_iter().collect();
        let mut outputs = self.diagrams.referenced_series();
        for key in &self.config.key_variables {
            if !outputs.contains(key) {
                outputs.push(key.clone());
            }
        }
        outputs.retain(|name| {
            let present = known.contains(name);
            if !present {
                warn!(series = %name, "not a model variable, not recorded");
            }
            present
        });
        outputs
    }

    pub fn introspect(&self) -> Introspector<'_, M> {
        Introspector::new(&self.model, &self.parameters, &self.config)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    pub fn states(&self) -> &StateStore {
        &self.states
    }

    pub fn diagrams(&self) -> &DiagramRegistry {
        &self.diagrams
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_aliases() {
        for alias in ["Initial", "initial", "init"] {
            assert_eq!(alias.parse::<RunMode>().unwrap(), RunMode::Initial);
        }
        for alias in ["Continued", "continued", "cont"] {
            assert_eq!(alias.parse::<RunMode>().unwrap(), RunMode::Continued);
        }
        assert!(matches!(
            "resume".parse::<RunMode>(),
            Err(ExploreError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_profile_options() {
        let fast = SimulationProfile::Fast.options(Interface::CoSimulation, Vec::new());
        assert_eq!(fast.ncp, 12);
        assert_eq!(fast.result_handling, ResultHandling::Memory);
        assert_eq!(fast.solver_log, SolverLog::Silent);

        let std = SimulationProfile::Standard.options(Interface::ModelExchange, Vec::new());
        assert_eq!(std.ncp, 500);
        assert_eq!(std.solver_log, SolverLog::Verbosity(50));

        let data: SimulationProfile = "opts_data".parse().unwrap();
        assert_eq!(
            data.options(Interface::ModelExchange, Vec::new()).result_handling,
            ResultHandling::Binary
        );
    }
}
