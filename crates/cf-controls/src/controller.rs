//! Proportional gate adjustment toward a delivery target.
//!
//! Output is an opening increment, limited per adjustment and clamped to the
//! gate's travel. Gains are tunables, not physical constants.

use crate::error::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};

/// Proportional controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryController {
    /// Opening change per unit delivery error (m per m³/s).
    pub gain: f64,
    /// Errors within this band are left alone (m³/s).
    pub deadband: f64,
    /// Maximum opening change per adjustment (m).
    pub max_step: f64,
}

impl Default for DeliveryController {
    fn default() -> Self {
        Self {
            gain: 0.05,
            deadband: 0.01,
            max_step: 0.1,
        }
    }
}

/// Outcome of one adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    pub opening: f64,
    /// Opening differs from the input.
    pub changed: bool,
    /// The gate is pinned at a travel limit while the error still pushes it.
    pub saturated: bool,
}

impl DeliveryController {
    pub fn new(gain: f64, deadband: f64, max_step: f64) -> ControlResult<Self> {
        let controller = Self {
            gain,
            deadband,
            max_step,
        };
        controller.validate()?;
        Ok(controller)
    }

    pub fn validate(&self) -> ControlResult<()> {
        if !(self.gain.is_finite() && self.gain > 0.0) {
            return Err(ControlError::InvalidArg {
                what: "gain must be positive",
            });
        }
        if !(self.deadband.is_finite() && self.deadband >= 0.0) {
            return Err(ControlError::InvalidArg {
                what: "deadband must be non-negative",
            });
        }
        if !(self.max_step.is_finite() && self.max_step > 0.0) {
            return Err(ControlError::InvalidArg {
                what: "max_step must be positive",
            });
        }
        Ok(())
    }

    /// Move `opening` toward delivering `target`.
    ///
    /// Positive error (under-delivery) opens the gate, negative error closes
    /// it. `max_opening` is the travel limit for this gate.
    pub fn adjust(
        &self,
        opening: f64,
        max_opening: f64,
        target: f64,
        delivered: f64,
    ) -> Adjustment {
        let error = target - delivered;
        if error.abs() <= self.deadband {
            return Adjustment {
                opening,
                changed: false,
                saturated: false,
            };
        }

        let step = (self.gain * error).clamp(-self.max_step, self.max_step);
        let next = (opening + step).clamp(0.0, max_opening);
        let saturated = (error > 0.0 && next >= max_opening) || (error < 0.0 && next <= 0.0);

        Adjustment {
            opening: next,
            changed: (next - opening).abs() > 1e-12,
            saturated,
        }
    }
}
