//! Per-gate control mode and runtime state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMode {
    Automatic,
    Manual,
    Failed,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControlMode::Automatic => "AUTOMATIC",
            ControlMode::Manual => "MANUAL",
            ControlMode::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Mutable runtime state of one gate.
///
/// Owned by the mode machine; the hydraulic solver never writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateControlState {
    pub gate_id: String,
    pub mode: ControlMode,
    /// When the current mode was entered.
    pub mode_since: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    /// Last opening sent to the gate (m).
    pub commanded_opening: Option<f64>,
    /// Last opening reported back by the gate or the field (m).
    pub confirmed_opening: Option<f64>,
}

impl GateControlState {
    pub fn new(gate_id: impl Into<String>, mode: ControlMode, since: DateTime<Utc>) -> Self {
        Self {
            gate_id: gate_id.into(),
            mode,
            mode_since: since,
            consecutive_failures: 0,
            last_success: None,
            commanded_opening: None,
            confirmed_opening: None,
        }
    }

    /// Contact has been re-established since the current mode was entered.
    pub fn communication_restored(&self) -> bool {
        self.consecutive_failures == 0
            && self.last_success.is_some_and(|t| t >= self.mode_since)
    }
}
