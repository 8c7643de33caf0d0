//! Graph-specific error types.

use cf_core::{CfError, LinkId, NodeId};
use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

/// Topology construction and validation errors.
///
/// All of these are configuration errors: the network is rejected before any
/// solve is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Link '{link}' refers to non-existent node {node}")]
    InvalidNodeRef { link: String, node: NodeId },

    #[error("Duplicate {what} name '{name}'")]
    DuplicateName { what: &'static str, name: String },

    #[error("Link '{link}' connects node '{node}' to itself")]
    SelfLoop { link: String, node: String },

    #[error("Cycle detected through node '{node}'")]
    Cycle { node: String },

    #[error("Invalid data for node '{node}': {what}")]
    InvalidNodeData { node: String, what: &'static str },

    #[error("Unknown node '{name}'")]
    UnknownNode { name: String },

    #[error("Unknown link {link}")]
    UnknownLink { link: LinkId },
}

impl From<GraphError> for CfError {
    fn from(err: GraphError) -> Self {
        CfError::Configuration {
            what: err.to_string(),
        }
    }
}
