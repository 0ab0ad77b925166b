pub mod canvas;
pub mod command;
pub mod config;
pub mod diagram;
mod error;
pub mod introspect;
pub mod layouts;
pub mod logging;
pub mod model;
pub mod models;
pub mod parameters;
pub mod restart;
pub mod session;
pub mod shell;
pub mod state;

// Re-export public API
pub use config::{AppConfig, ConfigError};
pub use diagram::{DiagramRegistry, DrawDirective, RenderError};
pub use error::ExploreError;
pub use model::{ModelError, ModelUnit, ResultSet, SimulateOptions, Value, VariableMetadata};
pub use models::{available_models, create_model};
pub use parameters::{ParameterStore, Predicate, SetReport};
pub use restart::{TranslationError, translate};
pub use session::{RunMode, RunReport, Session, SessionController, SimulationProfile};
pub use shell::Shell;
pub use state::{RestartBinding, StateStore};
