//! cf-core: stable foundation for canalflow.
//!
//! Contains:
//! - units (uom SI types + constructors, gravity)
//! - numeric (finite / sign guards)
//! - ids (stable compact IDs for network objects)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

pub use error::{CfError, CfResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
