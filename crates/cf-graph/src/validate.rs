//! Graph validation logic.

use std::collections::HashMap;

use cf_core::{LinkId, NodeId};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{GraphError, GraphResult};
use crate::graph::{Link, Node};

/// Check node names and physical data; return the name index.
pub(crate) fn validate_nodes(nodes: &[Node]) -> GraphResult<HashMap<String, NodeId>> {
    let mut names = HashMap::with_capacity(nodes.len());
    for node in nodes {
        if names.insert(node.name.clone(), node.id).is_some() {
            return Err(GraphError::DuplicateName {
                what: "node",
                name: node.name.clone(),
            });
        }

        let spec = &node.spec;
        let invalid = |what| GraphError::InvalidNodeData {
            node: node.name.clone(),
            what,
        };
        if !spec.bed_elevation.is_finite() {
            return Err(invalid("bed elevation must be finite"));
        }
        if !(spec.max_depth.is_finite() && spec.max_depth > 0.0) {
            return Err(invalid("max depth must be positive"));
        }
        if !(spec.demand.is_finite() && spec.demand >= 0.0) {
            return Err(invalid("demand must be non-negative"));
        }
        if let Some(level) = spec.fixed_level {
            if !level.is_finite() || level < spec.bed_elevation {
                return Err(invalid("fixed level must not be below bed"));
            }
        }
        if let Some(area) = spec.surface_area {
            if !(area.is_finite() && area > 0.0) {
                return Err(invalid("surface area must be positive"));
            }
        }
    }
    Ok(names)
}

/// Check link endpoints and names; return the name index.
pub(crate) fn validate_links(
    nodes: &[Node],
    links: &[Link],
) -> GraphResult<HashMap<String, LinkId>> {
    let mut names = HashMap::with_capacity(links.len());
    for link in links {
        for endpoint in [link.upstream, link.downstream] {
            if endpoint.slot() >= nodes.len() {
                return Err(GraphError::InvalidNodeRef {
                    link: link.name.clone(),
                    node: endpoint,
                });
            }
        }
        if link.upstream == link.downstream {
            return Err(GraphError::SelfLoop {
                link: link.name.clone(),
                node: nodes[link.upstream.slot()].name.clone(),
            });
        }
        if names.insert(link.name.clone(), link.id).is_some() {
            return Err(GraphError::DuplicateName {
                what: "link",
                name: link.name.clone(),
            });
        }
    }
    Ok(names)
}

/// Upstream-first node ordering; fails if the network contains a cycle.
pub(crate) fn topological_order(nodes: &[Node], links: &[Link]) -> GraphResult<Vec<NodeId>> {
    let mut dag: DiGraph<NodeId, LinkId> = DiGraph::with_capacity(nodes.len(), links.len());
    for node in nodes {
        dag.add_node(node.id);
    }
    for link in links {
        dag.add_edge(
            NodeIndex::new(link.upstream.slot()),
            NodeIndex::new(link.downstream.slot()),
            link.id,
        );
    }

    toposort(&dag, None)
        .map(|order| order.into_iter().map(|ix| dag[ix]).collect())
        .map_err(|cycle| GraphError::Cycle {
            node: nodes[dag[cycle.node_id()].slot()].name.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LinkKind, NodeSpec};

    fn node(i: u32, name: &str, spec: NodeSpec) -> Node {
        Node {
            id: NodeId::from_index(i),
            name: name.into(),
            spec,
        }
    }

    fn link(i: u32, name: &str, up: u32, down: u32) -> Link {
        Link {
            id: LinkId::from_index(i),
            name: name.into(),
            kind: LinkKind::Canal,
            upstream: NodeId::from_index(up),
            downstream: NodeId::from_index(down),
        }
    }

    #[test]
    fn validate_empty_graph() {
        assert!(validate_nodes(&[]).is_ok());
        assert!(validate_links(&[], &[]).is_ok());
        assert!(topological_order(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn validate_invalid_node_ref() {
        let nodes = vec![node(0, "N1", NodeSpec::junction(0.0, 1.0))];
        let links = vec![link(0, "L", 0, 99)];
        assert!(matches!(
            validate_links(&nodes, &links),
            Err(GraphError::InvalidNodeRef { .. })
        ));
    }

    #[test]
    fn validate_self_loop() {
        let nodes = vec![node(0, "N1", NodeSpec::junction(0.0, 1.0))];
        let links = vec![link(0, "L", 0, 0)];
        assert!(matches!(
            validate_links(&nodes, &links),
            Err(GraphError::SelfLoop { .. })
        ));
    }

    #[test]
    fn validate_duplicate_node_name() {
        let nodes = vec![
            node(0, "N", NodeSpec::junction(0.0, 1.0)),
            node(1, "N", NodeSpec::junction(0.0, 1.0)),
        ];
        assert!(matches!(
            validate_nodes(&nodes),
            Err(GraphError::DuplicateName { what: "node", .. })
        ));
    }

    #[test]
    fn validate_rejects_non_positive_depth() {
        let nodes = vec![node(0, "N", NodeSpec::junction(0.0, 0.0))];
        assert!(matches!(
            validate_nodes(&nodes),
            Err(GraphError::InvalidNodeData { .. })
        ));
    }

    #[test]
    fn parallel_branches_are_not_cycles() {
        let nodes = vec![
            node(0, "S", NodeSpec::source(10.0, 2.0)),
            node(1, "A", NodeSpec::junction(9.0, 2.0)),
            node(2, "B", NodeSpec::junction(9.0, 2.0)),
            node(3, "D", NodeSpec::delivery(8.0, 2.0, 1.0)),
        ];
        let links = vec![
            link(0, "SA", 0, 1),
            link(1, "SB", 0, 2),
            link(2, "AD", 1, 3),
            link(3, "BD", 2, 3),
        ];
        let order = topological_order(&nodes, &links).unwrap();
        let pos = |i: u32| order.iter().position(|&n| n.index() == i).unwrap();
        assert!(pos(0) < pos(1));
        assert!(pos(1) < pos(3));
        assert!(pos(2) < pos(3));
    }
}
