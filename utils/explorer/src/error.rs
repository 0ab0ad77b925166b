use thiserror::Error;

use crate::diagram::RenderError;
use crate::model::ModelError;
use crate::parameters::Predicate;
use crate::restart::TranslationError;

/// Everything an operator command can report. None of these abort the shell.
#[derive(Debug, Error)]
pub enum ExploreError {
    #[error("{key} - seems not an accessible parameter - check the spelling")]
    UnknownParameter { key: String },

    #[error("{key} - seems not an initial value, use par instead - check the spelling")]
    NotInitialValue { key: String },

    #[error("the following requirements do not hold: {}", list(violations))]
    PredicateViolation { violations: Vec<Predicate> },

    #[error("value missing: {}", keys.join(", "))]
    MissingValue { keys: Vec<String> },

    #[error("simulation must first be done with mode = initial")]
    Ordering,

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error("no simulation completed: {0}")]
    Engine(#[source] ModelError),

    #[error("applying `{address}` to the model failed: {source}")]
    Binding {
        address: String,
        #[source]
        source: ModelError,
    },

    #[error("state capture failed, continuation disabled until the next run: {0}")]
    Capture(#[source] ModelError),

    #[error("simulation time must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("simulation mode `{0}` not correct, use initial or continued")]
    UnknownMode(String),

    #[error("plot window type `{0}` not correct")]
    UnknownLayout(String),

    #[error("unknown simulation profile `{0}`, use standard, fast or data")]
    UnknownProfile(String),

    #[error("no simulation result to show yet")]
    NothingToShow,

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

fn list(predicates: &[Predicate]) -> String {
    predicates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
