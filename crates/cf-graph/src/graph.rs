//! Core graph data structures.

use std::collections::HashMap;

use cf_core::{LinkId, NodeId};

/// Hydraulic role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Reservoir or headworks with a held water level.
    Source,
    /// Internal canal junction or reach.
    Junction,
    /// Offtake point with a demand flow.
    Delivery,
}

/// Physical data attached to a node at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub kind: NodeKind,
    /// Bed (ground) elevation, m.
    pub bed_elevation: f64,
    /// Maximum design water depth above bed, m.
    pub max_depth: f64,
    /// Held water level, m. Sources default to full supply, sinks to bed.
    pub fixed_level: Option<f64>,
    /// Target demand flow for delivery nodes, m³/s.
    pub demand: f64,
    /// Plan area used as the storage term while solving, m².
    pub surface_area: Option<f64>,
}

impl NodeSpec {
    pub fn source(bed_elevation: f64, max_depth: f64) -> Self {
        Self::new(NodeKind::Source, bed_elevation, max_depth)
    }

    pub fn junction(bed_elevation: f64, max_depth: f64) -> Self {
        Self::new(NodeKind::Junction, bed_elevation, max_depth)
    }

    pub fn delivery(bed_elevation: f64, max_depth: f64, demand: f64) -> Self {
        Self {
            demand,
            ..Self::new(NodeKind::Delivery, bed_elevation, max_depth)
        }
    }

    fn new(kind: NodeKind, bed_elevation: f64, max_depth: f64) -> Self {
        Self {
            kind,
            bed_elevation,
            max_depth,
            fixed_level: None,
            demand: 0.0,
            surface_area: None,
        }
    }

    /// Hold this node at `level`.
    pub fn with_level(mut self, level: f64) -> Self {
        self.fixed_level = Some(level);
        self
    }

    pub fn with_surface_area(mut self, area: f64) -> Self {
        self.surface_area = Some(area);
        self
    }
}

/// A node in the canal network.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub spec: NodeSpec,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.spec.kind
    }

    pub fn bed_elevation(&self) -> f64 {
        self.spec.bed_elevation
    }

    /// Highest admissible water level (bed + design depth).
    pub fn top_level(&self) -> f64 {
        self.spec.bed_elevation + self.spec.max_depth
    }

    pub fn demand(&self) -> f64 {
        self.spec.demand
    }
}

/// What physically connects two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Gate,
    Canal,
}

/// A directed link (upstream -> downstream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    /// Gate identifier for gates, section label for canals.
    pub name: String,
    pub kind: LinkKind,
    pub upstream: NodeId,
    pub downstream: NodeId,
}

/// The network: a validated, immutable, acyclic set of nodes and links.
///
/// Adjacency is stored in compressed form: node i's outgoing links are
/// `out_links[out_offsets[i]..out_offsets[i+1]]`, and likewise for incoming.
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) links: Vec<Link>,
    pub(crate) out_offsets: Vec<usize>,
    pub(crate) out_links: Vec<LinkId>,
    pub(crate) in_offsets: Vec<usize>,
    pub(crate) in_links: Vec<LinkId>,
    pub(crate) node_names: HashMap<String, NodeId>,
    pub(crate) link_names: HashMap<String, LinkId>,
    /// Upstream-first ordering, computed once at build time.
    pub(crate) topo_order: Vec<NodeId>,
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Get a node by ID (returns None if ID out of bounds).
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot())
    }

    /// Get a link by ID (returns None if ID out of bounds).
    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.slot())
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.node_names.get(name).copied()
    }

    pub fn link_by_name(&self, name: &str) -> Option<LinkId> {
        self.link_names.get(name).copied()
    }

    /// Links leaving `node`.
    pub fn outgoing(&self, node: NodeId) -> &[LinkId] {
        let idx = node.slot();
        if idx >= self.nodes.len() {
            return &[];
        }
        &self.out_links[self.out_offsets[idx]..self.out_offsets[idx + 1]]
    }

    /// Links entering `node`.
    pub fn incoming(&self, node: NodeId) -> &[LinkId] {
        let idx = node.slot();
        if idx >= self.nodes.len() {
            return &[];
        }
        &self.in_links[self.in_offsets[idx]..self.in_offsets[idx + 1]]
    }

    /// A node with no outgoing links.
    pub fn is_sink(&self, node: NodeId) -> bool {
        self.outgoing(node).is_empty()
    }

    pub fn sources(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.kind() == NodeKind::Source)
    }

    /// Nodes ordered so every link goes from an earlier to a later entry.
    pub fn topological_order(&self) -> &[NodeId] {
        &self.topo_order
    }

    /// First link running directly from `upstream` to `downstream`.
    pub fn link_between(&self, upstream: NodeId, downstream: NodeId) -> Option<LinkId> {
        self.outgoing(upstream)
            .iter()
            .copied()
            .find(|&l| self.links[l.slot()].downstream == downstream)
    }

    pub fn gates(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(|l| l.kind == LinkKind::Gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_spec_constructors() {
        let s = NodeSpec::source(100.0, 4.0).with_level(103.5);
        assert_eq!(s.kind, NodeKind::Source);
        assert_eq!(s.fixed_level, Some(103.5));

        let d = NodeSpec::delivery(90.0, 1.5, 2.0).with_surface_area(500.0);
        assert_eq!(d.kind, NodeKind::Delivery);
        assert_eq!(d.demand, 2.0);
        assert_eq!(d.surface_area, Some(500.0));
    }

    #[test]
    fn top_level_adds_depth() {
        let node = Node {
            id: NodeId::from_index(0),
            name: "J".into(),
            spec: NodeSpec::junction(50.0, 2.5),
        };
        assert_eq!(node.top_level(), 52.5);
    }
}
