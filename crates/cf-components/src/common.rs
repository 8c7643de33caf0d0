//! Common utilities for hydraulic calculations.

use crate::error::{ComponentError, ComponentResult};
use cf_core::numeric::{ensure_finite, ensure_non_negative, ensure_positive};

/// Head differences below this are treated as no flow (m).
pub const EPSILON_HEAD: f64 = 1e-9;

/// Flows below this are treated as zero (m³/s).
pub const EPSILON_FLOW: f64 = 1e-12;

fn reject(what: &'static str, value: f64, rule: &str) -> ComponentError {
    ComponentError::config(format!("{what} must be {rule}, got {value}"))
}

/// Ensure a value is finite, returning a configuration error if not.
pub fn check_finite(value: f64, what: &'static str) -> ComponentResult<f64> {
    ensure_finite(value, what).map_err(|_| reject(what, value, "finite"))
}

/// Finite and `>= 0`.
pub fn check_non_negative(value: f64, what: &'static str) -> ComponentResult<f64> {
    check_finite(value, what)?;
    ensure_non_negative(value, what).map_err(|_| reject(what, value, "non-negative"))
}

/// Finite and `> 0`.
pub fn check_positive(value: f64, what: &'static str) -> ComponentResult<f64> {
    check_finite(value, what)?;
    ensure_positive(value, what).map_err(|_| reject(what, value, "positive"))
}
