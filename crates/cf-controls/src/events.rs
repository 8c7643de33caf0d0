//! Mode transition events and the append-only audit log.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::mode::ControlMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionCause {
    CommunicationLoss { consecutive_failures: u32 },
    OperatorConfirmation { operator: String },
    FieldClearance { report: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    /// Requires field dispatch.
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub gate_id: String,
    pub from: ControlMode,
    pub to: ControlMode,
    pub cause: TransitionCause,
    pub at: DateTime<Utc>,
    pub severity: Severity,
}

impl TransitionEvent {
    pub(crate) fn new(
        gate_id: &str,
        from: ControlMode,
        to: ControlMode,
        cause: TransitionCause,
        at: DateTime<Utc>,
    ) -> Self {
        let severity = match to {
            ControlMode::Failed => Severity::Critical,
            ControlMode::Manual if from == ControlMode::Automatic => Severity::Warning,
            _ => Severity::Info,
        };
        Self {
            gate_id: gate_id.to_string(),
            from,
            to,
            cause,
            at,
            severity,
        }
    }
}

/// Append-only record of every mode transition.
#[derive(Debug, Default)]
pub struct TransitionLog {
    entries: Mutex<Vec<TransitionEvent>>,
}

impl TransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&self, event: TransitionEvent) {
        self.entries.lock().push(event);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of all entries in append order.
    pub fn snapshot(&self) -> Vec<TransitionEvent> {
        self.entries.lock().clone()
    }

    /// Entries appended at or after position `from`, for incremental export.
    pub fn since(&self, from: usize) -> Vec<TransitionEvent> {
        let entries = self.entries.lock();
        entries.get(from..).map(<[_]>::to_vec).unwrap_or_default()
    }

    pub fn for_gate(&self, gate_id: &str) -> Vec<TransitionEvent> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.gate_id == gate_id)
            .cloned()
            .collect()
    }
}
