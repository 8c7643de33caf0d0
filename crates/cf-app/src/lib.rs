//! Application service layer for canalflow.
//!
//! [`CanalService`] is constructed explicitly at startup from a topology
//! document and owns the compiled network and the gate mode machine for the
//! life of the process. The CLI is a thin shell over it.

pub mod error;
pub mod service;

pub use error::{AppError, AppResult};
pub use service::{CanalService, ReplaySummary};
