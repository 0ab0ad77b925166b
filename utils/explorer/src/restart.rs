//! Translation of captured state names into restart parameter addresses.
//!
//! A model unit resumes from a previous run when every state is written to the
//! start parameter that initialises it. The unit's naming convention is:
//!
//! * `comp.x`         -> `comp.x_start`
//! * `comp.m[1]`      -> `comp.m_start[1]` (index of one to three characters)
//! * `comp.limPID.I.y` -> `comp.I_start` (integrator output)
//! * `comp.limPID.D.x` -> `comp.D_start` (differentiator state)

use thiserror::Error;

/// Marker appended to a state name to address its start value.
pub const START_MARKER: &str = "_start";

/// Length of the trailing block path (`limPID.I.y`) dropped for internal outputs.
const INTERNAL_PATH_LEN: usize = 10;

/// Widest vector index the convention encodes, in characters between brackets.
const MAX_INDEX_WIDTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalKind {
    Integrator,
    Differentiator,
}

impl InternalKind {
    fn suffix(self) -> &'static str {
        match self {
            InternalKind::Integrator => "I.y",
            InternalKind::Differentiator => "D.x",
        }
    }

    fn letter(self) -> &'static str {
        match self {
            InternalKind::Integrator => "I",
            InternalKind::Differentiator => "D",
        }
    }
}

/// Shape of a state name as far as restarting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateName<'a> {
    Scalar { base: &'a str },
    /// `index` keeps its brackets, e.g. `[12]`.
    VectorElement { base: &'a str, index: &'a str },
    InternalOutput { prefix: &'a str, kind: InternalKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot derive restart address for state `{name}`: {reason}")]
pub struct TranslationError {
    pub name: String,
    pub reason: &'static str,
}

impl TranslationError {
    fn new(name: &str, reason: &'static str) -> Self {
        Self {
            name: name.to_string(),
            reason,
        }
    }
}

impl<'a> StateName<'a> {
    pub fn classify(name: &'a str) -> Result<Self, TranslationError> {
        if name.is_empty() {
            return Err(TranslationError::new(name, "empty state name"));
        }

        if name.ends_with(']') {
            // `[` must sit within the last MAX_INDEX_WIDTH + 2 characters.
            for width in 1..=MAX_INDEX_WIDTH {
                let open = match name.len().checked_sub(width + 2) {
                    Some(open) => open,
                    None => break,
                };
                if name.as_bytes()[open] == b'[' {
                    // Both `[` and `]` are ASCII, so these are char boundaries.
                    let (base, index) = name.split_at(open);
                    if base.is_empty() {
                        return Err(TranslationError::new(name, "index without a base name"));
                    }
                    return Ok(StateName::VectorElement { base, index });
                }
            }
            return Err(TranslationError::new(
                name,
                "vector index wider than three characters",
            ));
        }

        for kind in [InternalKind::Integrator, InternalKind::Differentiator] {
            if name.ends_with(kind.suffix()) {
                let prefix = name
                    .len()
                    .checked_sub(INTERNAL_PATH_LEN)
                    .and_then(|cut| name.get(..cut))
                    .filter(|prefix| !prefix.is_empty())
                    .ok_or_else(|| TranslationError::new(name, "internal output path too short"))?;
                return Ok(StateName::InternalOutput { prefix, kind });
            }
        }

        Ok(StateName::Scalar { base: name })
    }

    pub fn restart_address(&self) -> String {
        match self {
            StateName::Scalar { base } => format!("{base}{START_MARKER}"),
            StateName::VectorElement { base, index } => format!("{base}{START_MARKER}{index}"),
            StateName::InternalOutput { prefix, kind } => {
                format!("{prefix}{}{START_MARKER}", kind.letter())
            }
        }
    }
}

/// Restart address for a captured state name.
pub fn translate(name: &str) -> Result<String, TranslationError> {
    StateName::classify(name).map(|state| state.restart_address())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar() {
        assert_eq!(translate("bioreactor.V").unwrap(), "bioreactor.V_start");
    }

    #[test]
    fn test_vector_widths() {
        assert_eq!(translate("bioreactor.m[1]").unwrap(), "bioreactor.m_start[1]");
        assert_eq!(translate("bioreactor.m[12]").unwrap(), "bioreactor.m_start[12]");
        assert_eq!(translate("bioreactor.m[123]").unwrap(), "bioreactor.m_start[123]");
        assert!(translate("bioreactor.m[1234]").is_err());
    }

    #[test]
    fn test_internal_outputs() {
        assert_eq!(
            StateName::classify("PIreg.limPID.I.y").unwrap(),
            StateName::InternalOutput {
                prefix: "PIreg.",
                kind: InternalKind::Integrator
            }
        );
        assert_eq!(translate("PIreg.limPID.I.y").unwrap(), "PIreg.I_start");
        assert_eq!(translate("PIreg.limPID.D.x").unwrap(), "PIreg.D_start");
        assert!(translate("limPID.I.y").is_err());
    }

    #[test]
    fn test_rejects_degenerate_names() {
        assert!(translate("").is_err());
        assert!(translate("[1]").is_err());
        assert!(translate("]").is_err());
    }
}
