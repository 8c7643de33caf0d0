//! Directed path queries.

use std::collections::VecDeque;

use cf_core::{LinkId, NodeId};
use cf_graph::Graph;

/// Fewest-link directed route from `from` to `to`, as the links traversed.
///
/// `Some(vec![])` when `from == to`; `None` when `to` is not downstream.
pub fn route(graph: &Graph, from: NodeId, to: NodeId) -> Option<Vec<LinkId>> {
    if from == to {
        return Some(Vec::new());
    }

    let mut via: Vec<Option<LinkId>> = vec![None; graph.nodes().len()];
    let mut visited = vec![false; graph.nodes().len()];
    let mut queue = VecDeque::from([from]);
    visited[from.slot()] = true;

    while let Some(node) = queue.pop_front() {
        for &link_id in graph.outgoing(node) {
            let next = graph.links()[link_id.slot()].downstream;
            if visited[next.slot()] {
                continue;
            }
            visited[next.slot()] = true;
            via[next.slot()] = Some(link_id);
            if next == to {
                return Some(unwind(graph, &via, from, to));
            }
            queue.push_back(next);
        }
    }
    None
}

fn unwind(graph: &Graph, via: &[Option<LinkId>], from: NodeId, to: NodeId) -> Vec<LinkId> {
    let mut links = Vec::new();
    let mut node = to;
    while node != from {
        let Some(link) = via[node.slot()] else { break };
        links.push(link);
        node = graph.links()[link.slot()].upstream;
    }
    links.reverse();
    links
}

/// Node sequence visited by `links`, starting at `from`.
pub fn nodes_along(graph: &Graph, from: NodeId, links: &[LinkId]) -> Vec<NodeId> {
    std::iter::once(from)
        .chain(links.iter().map(|l| graph.links()[l.slot()].downstream))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_graph::{GraphBuilder, LinkKind, NodeSpec};

    #[test]
    fn route_follows_direction() {
        let mut b = GraphBuilder::new();
        let a = b.add_node("a", NodeSpec::source(10.0, 2.0));
        let m = b.add_node("m", NodeSpec::junction(9.0, 2.0));
        let z = b.add_node("z", NodeSpec::delivery(8.0, 2.0, 1.0));
        let side = b.add_node("side", NodeSpec::delivery(8.0, 2.0, 1.0));
        let l1 = b.add_link("a-m", LinkKind::Canal, a, m);
        let l2 = b.add_link("m-z", LinkKind::Canal, m, z);
        b.add_link("m-side", LinkKind::Gate, m, side);
        let graph = b.build().unwrap();

        assert_eq!(route(&graph, a, z), Some(vec![l1, l2]));
        assert_eq!(nodes_along(&graph, a, &[l1, l2]), vec![a, m, z]);
        assert_eq!(route(&graph, z, a), None);
        assert_eq!(route(&graph, side, z), None);
        assert_eq!(route(&graph, m, m), Some(vec![]));
    }
}
