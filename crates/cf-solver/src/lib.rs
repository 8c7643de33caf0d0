//! Steady-state hydraulic solver for gravity-fed canal networks.
//!
//! Unknowns are the water levels of free nodes. Each iteration evaluates
//! every gate and canal discharge from the current levels, measures the mass
//! imbalance at each node and moves its level toward balance. In
//! target-delivery mode a proportional controller also trims the gate
//! openings that feed each delivery.

pub mod config;
pub mod error;
pub mod problem;
pub mod solve;
pub mod steady;

pub use config::SolverConfig;
pub use error::{SolverError, SolverResult};
pub use problem::{Constraints, LinkModel, NetworkProblem, OpeningLimits, OperatingMode};
pub use solve::{feeding_gates, solve};
pub use steady::{DeliveryReport, NetworkSolution};
