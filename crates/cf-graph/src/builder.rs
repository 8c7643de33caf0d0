//! Incremental graph builder.

use std::collections::HashMap;

use cf_core::{LinkId, NodeId};

use crate::error::GraphResult;
use crate::graph::{Graph, Link, LinkKind, Node, NodeSpec};
use crate::validate;

/// Builder for constructing a network incrementally.
///
/// Use `add_node` and `add_link` to build up the network, then call `build()`
/// to validate and freeze it into an immutable `Graph`.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its handle.
    pub fn add_node(&mut self, name: impl Into<String>, spec: NodeSpec) -> NodeId {
        let id = NodeId::from_index(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            name: name.into(),
            spec,
        });
        id
    }

    /// Add a directed link from `upstream` to `downstream`.
    pub fn add_link(
        &mut self,
        name: impl Into<String>,
        kind: LinkKind,
        upstream: NodeId,
        downstream: NodeId,
    ) -> LinkId {
        let id = LinkId::from_index(self.links.len() as u32);
        self.links.push(Link {
            id,
            name: name.into(),
            kind,
            upstream,
            downstream,
        });
        id
    }

    /// Look up a node added so far by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    /// Validate and freeze the network.
    ///
    /// Rejects dangling references, duplicate names, self loops and cycles.
    pub fn build(self) -> GraphResult<Graph> {
        let node_names = validate::validate_nodes(&self.nodes)?;
        let link_names = validate::validate_links(&self.nodes, &self.links)?;
        let topo_order = validate::topological_order(&self.nodes, &self.links)?;

        let (out_offsets, out_links) =
            Self::build_adjacency(&self.nodes, &self.links, |l| l.upstream);
        let (in_offsets, in_links) =
            Self::build_adjacency(&self.nodes, &self.links, |l| l.downstream);

        Ok(Graph {
            nodes: self.nodes,
            links: self.links,
            out_offsets,
            out_links,
            in_offsets,
            in_links,
            node_names,
            link_names,
            topo_order,
        })
    }

    /// Compact adjacency: for each node, the links whose `endpoint` it is.
    fn build_adjacency(
        nodes: &[Node],
        links: &[Link],
        endpoint: impl Fn(&Link) -> NodeId,
    ) -> (Vec<usize>, Vec<LinkId>) {
        let mut node_to_links: HashMap<NodeId, Vec<LinkId>> = HashMap::new();
        for link in links {
            node_to_links.entry(endpoint(link)).or_default().push(link.id);
        }

        // Sort for determinism
        for list in node_to_links.values_mut() {
            list.sort();
        }

        let mut offsets = Vec::with_capacity(nodes.len() + 1);
        let mut flat = Vec::with_capacity(links.len());
        offsets.push(0);
        for node in nodes {
            if let Some(list) = node_to_links.get(&node.id) {
                flat.extend_from_slice(list);
            }
            offsets.push(flat.len());
        }

        (offsets, flat)
    }
}
