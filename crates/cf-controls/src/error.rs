//! Error types for control operations.

use crate::mode::ControlMode;
use thiserror::Error;

/// Result type for control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in control operations.
///
/// Communication failures are not errors; they are recorded in the gate's
/// control state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown gate '{gate}'")]
    UnknownGate { gate: String },

    #[error("Gate '{gate}' cannot go from {from} to {to}: {reason}")]
    InvalidTransition {
        gate: String,
        from: ControlMode,
        to: ControlMode,
        reason: &'static str,
    },

    #[error("Gate '{gate}' is {mode}; commands are only accepted in AUTOMATIC")]
    NotAutomatic { gate: String, mode: ControlMode },
}
