//! Error types for solver operations.

use cf_components::ComponentError;
use cf_controls::ControlError;
use cf_core::error::CfError;
use cf_graph::GraphError;
use thiserror::Error;

use crate::steady::NetworkSolution;

/// Errors that can occur during network solving.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Problem setup error: {what}")]
    Configuration { what: String },

    /// Iteration cap reached. `best` is the lowest-residual state seen.
    #[error("Network did not converge after {iterations} iterations (residual {residual})")]
    NonConvergence {
        iterations: usize,
        residual: f64,
        best: Box<NetworkSolution>,
    },

    #[error("Component error: {0}")]
    Component(#[from] ComponentError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    pub(crate) fn config(what: impl Into<String>) -> Self {
        SolverError::Configuration { what: what.into() }
    }
}

impl From<SolverError> for CfError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::Configuration { what } => CfError::Configuration { what },
            SolverError::NonConvergence { residual, .. } => CfError::NonConvergence {
                what: "network solve".to_string(),
                residual,
            },
            SolverError::Component(e) => e.into(),
            SolverError::Control(e) => CfError::Configuration {
                what: e.to_string(),
            },
            SolverError::Graph(e) => e.into(),
        }
    }
}
