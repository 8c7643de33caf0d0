//! Flow propagation and travel times over a canal network.
//!
//! A flow event released at a node is split down the network (explicit
//! per-link fractions, else a solved network's flow proportions, else link
//! design capacity). Every canal link gets a transit time of
//! `length / velocity` at its share of the flow; gates pass water
//! instantly. Arrival times are shortest-time paths from the release point.

pub mod error;
pub mod path;
pub mod propagate;
mod split;

pub use error::{RoutingError, RoutingResult};
pub use propagate::{FlowPropagator, Propagation};
