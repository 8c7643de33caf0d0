//! cf-graph: directed canal network topology for canalflow.
//!
//! Provides:
//! - Core graph data structures (Node, Link, Graph)
//! - Incremental graph builder with validation
//! - Cycle detection and a cached topological order
//!
//! # Example
//!
//! ```
//! use cf_graph::{GraphBuilder, LinkKind, NodeSpec};
//!
//! let mut builder = GraphBuilder::new();
//! let head = builder.add_node("headworks", NodeSpec::source(100.0, 5.0));
//! let farm = builder.add_node("farm", NodeSpec::delivery(95.0, 2.0, 1.5));
//! builder.add_link("G1", LinkKind::Gate, head, farm);
//! let graph = builder.build().unwrap();
//!
//! assert_eq!(graph.nodes().len(), 2);
//! assert_eq!(graph.links().len(), 1);
//! ```

pub mod builder;
pub mod error;
pub mod graph;
pub(crate) mod validate;

pub use builder::GraphBuilder;
pub use error::{GraphError, GraphResult};
pub use graph::{Graph, Link, LinkKind, Node, NodeKind, NodeSpec};
