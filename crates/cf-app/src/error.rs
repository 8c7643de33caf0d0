//! Error types for the cf-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates and
/// gives the CLI one error surface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Failed to load network file {path}: {message}")]
    NetworkLoad { path: PathBuf, message: String },

    #[error("Unknown {what} '{id}'")]
    NotFound { what: &'static str, id: String },

    #[error("Structure error: {0}")]
    Component(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Control error: {0}")]
    Control(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for cf-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<cf_project::ProjectError> for AppError {
    fn from(err: cf_project::ProjectError) -> Self {
        AppError::Project(err.to_string())
    }
}

impl From<cf_components::ComponentError> for AppError {
    fn from(err: cf_components::ComponentError) -> Self {
        AppError::Component(err.to_string())
    }
}

impl From<cf_solver::SolverError> for AppError {
    fn from(err: cf_solver::SolverError) -> Self {
        AppError::Solver(err.to_string())
    }
}

impl From<cf_routing::RoutingError> for AppError {
    fn from(err: cf_routing::RoutingError) -> Self {
        AppError::Routing(err.to_string())
    }
}

impl From<cf_controls::ControlError> for AppError {
    fn from(err: cf_controls::ControlError) -> Self {
        AppError::Control(err.to_string())
    }
}
