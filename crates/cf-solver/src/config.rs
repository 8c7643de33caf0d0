//! Solver tunables.

use cf_controls::DeliveryController;
use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

/// Iteration, relaxation and control cadence settings.
///
/// Defaults reproduce the field-tuned reference behavior; all of them are
/// exposed so stability can be checked per network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub max_iterations: usize,
    /// Largest level change (m) still considered settled.
    pub level_tolerance: f64,
    /// Largest node imbalance (m³/s) still considered balanced.
    pub flow_tolerance: f64,
    /// Fraction of the computed level correction applied per iteration.
    pub relaxation: f64,
    /// Pseudo time step (s) dividing the storage term.
    pub time_step: f64,
    /// Plan area (m²) for nodes without one.
    pub default_surface_area: f64,
    /// Cap on a single level correction (m).
    pub max_level_step: f64,
    /// Withdrawals fall linearly to zero as depth drops below this (m).
    pub curtail_depth: f64,
    /// Level perturbation (m) for the finite-difference response.
    pub derivative_step: f64,
    /// Gate openings are adjusted every this many iterations in target mode.
    pub adjust_every: usize,
    pub controller: DeliveryController,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1_000,
            level_tolerance: 1e-3,
            flow_tolerance: 1e-3,
            relaxation: 0.7,
            time_step: 3_600.0,
            default_surface_area: 1_000.0,
            max_level_step: 0.5,
            curtail_depth: 0.1,
            derivative_step: 1e-3,
            adjust_every: 5,
            controller: DeliveryController::default(),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> SolverResult<()> {
        let positive = |v: f64, what: &str| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(SolverError::config(format!("{what} must be positive, got {v}")))
            }
        };
        positive(self.level_tolerance, "level_tolerance")?;
        positive(self.flow_tolerance, "flow_tolerance")?;
        positive(self.time_step, "time_step")?;
        positive(self.default_surface_area, "default_surface_area")?;
        positive(self.max_level_step, "max_level_step")?;
        positive(self.curtail_depth, "curtail_depth")?;
        positive(self.derivative_step, "derivative_step")?;
        if !(self.relaxation > 0.0 && self.relaxation <= 1.0) {
            return Err(SolverError::config(format!(
                "relaxation must lie in (0, 1], got {}",
                self.relaxation
            )));
        }
        if self.max_iterations == 0 || self.adjust_every == 0 {
            return Err(SolverError::config(
                "max_iterations and adjust_every must be at least 1",
            ));
        }
        self.controller.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SolverConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_iterations, 1_000);
        assert_eq!(cfg.adjust_every, 5);
    }

    #[test]
    fn rejects_bad_relaxation() {
        let cfg = SolverConfig {
            relaxation: 1.5,
            ..SolverConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SolverError::Configuration { .. })
        ));
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let cfg: SolverConfig = serde_json::from_str(r#"{"relaxation": 0.5}"#).unwrap();
        assert_eq!(cfg.relaxation, 0.5);
        assert_eq!(cfg.max_iterations, 1_000);
    }
}
