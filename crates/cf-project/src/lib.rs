//! cf-project: canal network document format, validation and compilation.

pub mod compile;
pub mod schema;
pub mod validate;

use std::path::Path;

use cf_components::ComponentError;
use cf_graph::GraphError;

pub use compile::{compile, operating_mode, CompiledNetwork};
pub use schema::*;
pub use validate::{validate_document, ValidationError, LATEST_VERSION};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unsupported file extension: {path}")]
    UnknownFormat { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Topology error: {0}")]
    Graph(#[from] GraphError),

    #[error("Structure error: {0}")]
    Component(#[from] ComponentError),
}

pub fn load_yaml(path: &Path) -> ProjectResult<TopologyDoc> {
    let content = std::fs::read_to_string(path)?;
    let doc: TopologyDoc = serde_yaml::from_str(&content)?;
    validate_document(&doc)?;
    Ok(doc)
}

pub fn save_yaml(path: &Path, doc: &TopologyDoc) -> ProjectResult<()> {
    validate_document(doc)?;
    let content = serde_yaml::to_string(doc)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &Path) -> ProjectResult<TopologyDoc> {
    let content = std::fs::read_to_string(path)?;
    let doc: TopologyDoc = serde_json::from_str(&content)?;
    validate_document(&doc)?;
    Ok(doc)
}

pub fn save_json(path: &Path, doc: &TopologyDoc) -> ProjectResult<()> {
    validate_document(doc)?;
    let content = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, content)?;
    Ok(())
}

fn is_json(path: &Path) -> ProjectResult<bool> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(true),
        Some("yaml" | "yml") => Ok(false),
        _ => Err(ProjectError::UnknownFormat {
            path: path.display().to_string(),
        }),
    }
}

/// Load a topology document, picking the format from the file extension.
pub fn load_document(path: &Path) -> ProjectResult<TopologyDoc> {
    if is_json(path)? {
        load_json(path)
    } else {
        load_yaml(path)
    }
}

/// Load a communication feed (YAML or JSON).
pub fn load_feed(path: &Path) -> ProjectResult<CommFeedDoc> {
    let content = std::fs::read_to_string(path)?;
    let feed = if is_json(path)? {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(feed)
}
