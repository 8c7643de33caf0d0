//! Error types for propagation and path queries.

use cf_components::ComponentError;
use cf_core::error::CfError;
use thiserror::Error;

pub type RoutingResult<T> = Result<T, RoutingError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("Unknown node '{name}'")]
    UnknownNode { name: String },

    #[error("Unknown link '{name}'")]
    UnknownLink { name: String },

    /// No directed, flowing route joins the two nodes.
    #[error("'{to}' is not reachable from '{from}'")]
    Unreachable { from: String, to: String },

    #[error("Invalid routing input: {what}")]
    InvalidInput { what: String },

    #[error("Component error: {0}")]
    Component(#[from] ComponentError),
}

impl From<RoutingError> for CfError {
    fn from(e: RoutingError) -> Self {
        match e {
            RoutingError::Unreachable { .. } => CfError::Unreachable {
                what: e.to_string(),
            },
            RoutingError::Component(e) => e.into(),
            other => CfError::Configuration {
                what: other.to_string(),
            },
        }
    }
}
