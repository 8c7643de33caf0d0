//! Error types for hydraulic calculations.

use cf_core::error::CfError;
use thiserror::Error;

/// Errors that can occur during component calculations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    /// Malformed or inconsistent structure data; fatal before solving.
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    /// Iteration cap reached; `best_estimate` is the closest iterate found.
    #[error(
        "{what} did not converge after {iterations} iterations \
         (best estimate {best_estimate}, residual {residual})"
    )]
    NonConvergence {
        what: &'static str,
        best_estimate: f64,
        residual: f64,
        iterations: usize,
    },

    #[error("Unknown {what} '{id}'")]
    Unknown { what: &'static str, id: String },
}

pub type ComponentResult<T> = Result<T, ComponentError>;

impl ComponentError {
    pub(crate) fn config(what: impl Into<String>) -> Self {
        ComponentError::Configuration { what: what.into() }
    }
}

impl From<ComponentError> for CfError {
    fn from(e: ComponentError) -> Self {
        match e {
            ComponentError::Configuration { what } => CfError::Configuration { what },
            ComponentError::NonConvergence {
                what, residual, ..
            } => CfError::NonConvergence {
                what: what.to_string(),
                residual,
            },
            e @ ComponentError::Unknown { .. } => CfError::Configuration {
                what: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ComponentError::NonConvergence {
            what: "normal depth",
            best_estimate: 1.2,
            residual: 0.4,
            iterations: 50,
        };
        let msg = err.to_string();
        assert!(msg.contains("normal depth"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn error_conversion() {
        let err: CfError = ComponentError::config("negative width").into();
        assert!(matches!(err, CfError::Configuration { .. }));
    }
}
