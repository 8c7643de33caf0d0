//! Gate control layer for canalflow.
//!
//! Two independent pieces live here:
//!
//! - [`DeliveryController`]: the proportional gate-adjustment law used by the
//!   network solver when it is asked to hit delivery targets.
//! - [`ModeMachine`]: the runtime safety layer. Each gate runs its own
//!   AUTOMATIC / MANUAL / FAILED machine driven by communication health.
//!
//! # Fail-safe rules
//!
//! - Losing contact for `failure_threshold` consecutive checks drops an
//!   automatic gate to MANUAL if a field crew can operate it, otherwise to
//!   FAILED.
//! - Nothing returns a gate to AUTOMATIC except an explicit operator
//!   confirmation after contact is restored.
//! - FAILED is left only on a field-team report.
//! - Transitions never touch the gate's last commanded or confirmed opening.
//! - Every transition is appended to the [`TransitionLog`].

pub mod controller;
pub mod error;
pub mod events;
pub mod machine;
pub mod mode;

pub use controller::{Adjustment, DeliveryController};
pub use error::{ControlError, ControlResult};
pub use events::{Severity, TransitionCause, TransitionEvent, TransitionLog};
pub use machine::{ModeMachine, ModeMachineConfig};
pub use mode::{ControlMode, GateControlState};
