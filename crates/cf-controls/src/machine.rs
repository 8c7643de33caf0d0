//! Per-gate control-mode state machines.
//!
//! ```text
//!             N consecutive failures, fallback-eligible
//!   AUTOMATIC ------------------------------------------> MANUAL
//!       |  ^                                                |  ^
//!       |  +---- operator confirmation (contact restored) --+  |
//!       |                                                      |
//!       +-- N consecutive failures, not eligible --> FAILED ---+
//!                                                  field report
//! ```
//!
//! Each gate's state sits behind its own mutex. Reading the failure count,
//! comparing it and writing the new mode happen under one lock.

use std::collections::HashMap;

use cf_components::GateCatalog;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{ControlError, ControlResult};
use crate::events::{TransitionCause, TransitionEvent, TransitionLog};
use crate::mode::{ControlMode, GateControlState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeMachineConfig {
    /// Consecutive failed checks that end automatic operation.
    pub failure_threshold: u32,
}

impl Default for ModeMachineConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
        }
    }
}

/// Static facts copied from the catalog plus the guarded runtime state.
#[derive(Debug)]
struct GateSlot {
    automated: bool,
    fallback_eligible: bool,
    max_opening: f64,
    state: Mutex<GateControlState>,
}

/// Control-mode machines for every gate in a catalog.
#[derive(Debug)]
pub struct ModeMachine {
    config: ModeMachineConfig,
    slots: Vec<GateSlot>,
    index: HashMap<String, usize>,
    log: TransitionLog,
}

impl ModeMachine {
    /// Automated gates start in AUTOMATIC, manual-class gates in MANUAL.
    pub fn new(
        catalog: &GateCatalog,
        config: ModeMachineConfig,
        now: DateTime<Utc>,
    ) -> ControlResult<Self> {
        if config.failure_threshold == 0 {
            return Err(ControlError::InvalidArg {
                what: "failure_threshold must be at least 1",
            });
        }

        let mut slots = Vec::with_capacity(catalog.len());
        let mut index = HashMap::with_capacity(catalog.len());
        for gate in catalog.iter() {
            let mode = if gate.is_automated() {
                ControlMode::Automatic
            } else {
                ControlMode::Manual
            };
            index.insert(gate.id().to_string(), slots.len());
            slots.push(GateSlot {
                automated: gate.is_automated(),
                fallback_eligible: gate.fallback_eligible,
                max_opening: gate.max_opening.value,
                state: Mutex::new(GateControlState::new(gate.id(), mode, now)),
            });
        }

        Ok(Self {
            config,
            slots,
            index,
            log: TransitionLog::new(),
        })
    }

    pub fn config(&self) -> &ModeMachineConfig {
        &self.config
    }

    pub fn log(&self) -> &TransitionLog {
        &self.log
    }

    fn slot(&self, gate: &str) -> ControlResult<&GateSlot> {
        self.index
            .get(gate)
            .map(|&i| &self.slots[i])
            .ok_or_else(|| ControlError::UnknownGate {
                gate: gate.to_string(),
            })
    }

    pub fn get_mode(&self, gate: &str) -> ControlResult<ControlMode> {
        Ok(self.slot(gate)?.state.lock().mode)
    }

    /// Snapshot of a gate's runtime state.
    pub fn state(&self, gate: &str) -> ControlResult<GateControlState> {
        Ok(self.slot(gate)?.state.lock().clone())
    }

    /// Current mode of every gate, in catalog order.
    pub fn modes(&self) -> Vec<(String, ControlMode)> {
        self.slots
            .iter()
            .map(|slot| {
                let state = slot.state.lock();
                (state.gate_id.clone(), state.mode)
            })
            .collect()
    }

    /// Feed one communication-health check.
    ///
    /// Success resets the failure counter but never changes the mode. Failure
    /// increments it; reaching the threshold while AUTOMATIC falls back to
    /// MANUAL or FAILED. Returns the transition, if one happened.
    pub fn report_communication(
        &self,
        gate: &str,
        success: bool,
        at: DateTime<Utc>,
    ) -> ControlResult<Option<TransitionEvent>> {
        let slot = self.slot(gate)?;
        let mut state = slot.state.lock();

        if success {
            if state.consecutive_failures > 0 {
                debug!(
                    gate,
                    failures = state.consecutive_failures,
                    mode = %state.mode,
                    "communication restored"
                );
            }
            state.consecutive_failures = 0;
            state.last_success = Some(at);
            return Ok(None);
        }

        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        debug!(
            gate,
            failures = state.consecutive_failures,
            mode = %state.mode,
            "communication check failed"
        );

        if state.mode != ControlMode::Automatic
            || state.consecutive_failures < self.config.failure_threshold
        {
            return Ok(None);
        }

        let to = if slot.fallback_eligible {
            ControlMode::Manual
        } else {
            ControlMode::Failed
        };
        let cause = TransitionCause::CommunicationLoss {
            consecutive_failures: state.consecutive_failures,
        };
        let event = self.transition_locked(&mut state, to, cause, at);
        match to {
            ControlMode::Failed => error!(
                gate,
                failures = event_failures(&event),
                opening = ?state.confirmed_opening,
                "gate FAILED: no safe manual fallback, field dispatch required"
            ),
            _ => warn!(
                gate,
                failures = event_failures(&event),
                opening = ?state.confirmed_opening,
                "automatic control lost, gate fell back to MANUAL"
            ),
        }
        Ok(Some(event))
    }

    /// Operator hands a MANUAL gate back to automatic control.
    ///
    /// Refused unless the gate is automated by class and has had a
    /// successful contact since it entered MANUAL with no failures after it.
    pub fn confirm_automatic(
        &self,
        gate: &str,
        operator: &str,
        at: DateTime<Utc>,
    ) -> ControlResult<TransitionEvent> {
        let slot = self.slot(gate)?;
        let mut state = slot.state.lock();

        let refuse = |reason: &'static str| ControlError::InvalidTransition {
            gate: gate.to_string(),
            from: state.mode,
            to: ControlMode::Automatic,
            reason,
        };
        if state.mode != ControlMode::Manual {
            return Err(refuse("only MANUAL gates can be confirmed"));
        }
        if !slot.automated {
            return Err(refuse("gate is not fitted for automation"));
        }
        if !state.communication_restored() {
            return Err(refuse("communication has not been restored"));
        }

        let cause = TransitionCause::OperatorConfirmation {
            operator: operator.to_string(),
        };
        let event = self.transition_locked(&mut state, ControlMode::Automatic, cause, at);
        info!(gate, operator, "automatic control resumed on operator confirmation");
        Ok(event)
    }

    /// Field team clears a FAILED gate; it comes back as MANUAL.
    pub fn clear_failure(
        &self,
        gate: &str,
        report: &str,
        at: DateTime<Utc>,
    ) -> ControlResult<TransitionEvent> {
        let slot = self.slot(gate)?;
        let mut state = slot.state.lock();

        if state.mode != ControlMode::Failed {
            return Err(ControlError::InvalidTransition {
                gate: gate.to_string(),
                from: state.mode,
                to: ControlMode::Manual,
                reason: "only FAILED gates can be cleared",
            });
        }

        state.consecutive_failures = 0;
        let cause = TransitionCause::FieldClearance {
            report: report.to_string(),
        };
        let event = self.transition_locked(&mut state, ControlMode::Manual, cause, at);
        info!(gate, report, "gate failure cleared by field report");
        Ok(event)
    }

    /// Record an opening sent to the gate; only allowed in AUTOMATIC.
    pub fn record_command(&self, gate: &str, opening: f64) -> ControlResult<()> {
        let slot = self.slot(gate)?;
        check_opening(opening, slot.max_opening)?;
        let mut state = slot.state.lock();
        if state.mode != ControlMode::Automatic {
            return Err(ControlError::NotAutomatic {
                gate: gate.to_string(),
                mode: state.mode,
            });
        }
        state.commanded_opening = Some(opening);
        Ok(())
    }

    /// Record an opening reported by the gate or a field crew.
    pub fn record_confirmed_opening(&self, gate: &str, opening: f64) -> ControlResult<()> {
        let slot = self.slot(gate)?;
        check_opening(opening, slot.max_opening)?;
        slot.state.lock().confirmed_opening = Some(opening);
        Ok(())
    }

    /// Change mode under the caller's lock and append to the log.
    ///
    /// Openings are left exactly as they were.
    fn transition_locked(
        &self,
        state: &mut GateControlState,
        to: ControlMode,
        cause: TransitionCause,
        at: DateTime<Utc>,
    ) -> TransitionEvent {
        let event = TransitionEvent::new(&state.gate_id, state.mode, to, cause, at);
        state.mode = to;
        state.mode_since = at;
        self.log.append(event.clone());
        event
    }
}

fn event_failures(event: &TransitionEvent) -> u32 {
    match event.cause {
        TransitionCause::CommunicationLoss {
            consecutive_failures,
        } => consecutive_failures,
        _ => 0,
    }
}

fn check_opening(opening: f64, max_opening: f64) -> ControlResult<()> {
    if !opening.is_finite() || opening < 0.0 || opening > max_opening {
        return Err(ControlError::InvalidArg {
            what: "opening must lie within the gate's travel",
        });
    }
    Ok(())
}
