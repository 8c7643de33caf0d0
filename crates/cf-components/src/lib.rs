//! cf-components: hydraulic structures of a gravity-fed canal network.
//!
//! Provides:
//! - `Gate`: calibrated orifice discharge through a sluice gate
//! - `CanalSection`: trapezoidal channel geometry and normal-depth solving
//! - `GateCatalog` / `CanalGeometryStore`: immutable registries shared by
//!   the solver, the flow propagator and the control layer
//!
//! All hydraulic functions are pure functions of their inputs and the static
//! calibration, so registries can be shared across concurrent solves.
//!
//! # Example
//!
//! ```
//! use cf_components::{Calibration, Gate};
//! use cf_core::units::m;
//!
//! let gate = Gate::new("G1", "head", "farm", m(3.5), m(2.0))
//!     .with_calibration(Calibration::Rated { k1: 0.85, k2: 0.0 });
//!
//! let q = gate.discharge(m(10.0), m(3.0), m(2.0)).unwrap();
//! assert!(q.value > 15.5 && q.value < 15.9);
//! ```

pub mod catalog;
pub mod channel;
pub mod common;
pub mod error;
pub mod gate;

pub use catalog::{CanalGeometryStore, GateCatalog};
pub use channel::{CanalSection, NormalDepth, NormalDepthConfig};
pub use error::{ComponentError, ComponentResult};
pub use gate::{AutomationClass, Calibration, Gate};
