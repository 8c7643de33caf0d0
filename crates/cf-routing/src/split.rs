//! Branch flow allocation.

use std::collections::HashMap;

use cf_core::{LinkId, NodeId};
use cf_graph::Graph;

/// Fractions of a node's outflow sent down each of `out`.
///
/// Overridden links take their fixed fraction; the rest share what is left in
/// proportion to `primary` weights, falling back to `fallback` weights and
/// then to an even split when all weights are zero.
pub(crate) fn fractions(
    out: &[LinkId],
    overrides: &HashMap<LinkId, f64>,
    primary: Option<&[f64]>,
    fallback: &[f64],
) -> Vec<f64> {
    let fixed: f64 = out.iter().filter_map(|l| overrides.get(l)).sum();
    let free: Vec<LinkId> = out
        .iter()
        .copied()
        .filter(|l| !overrides.contains_key(l))
        .collect();

    if free.is_empty() {
        return out
            .iter()
            .map(|l| {
                let f = overrides.get(l).copied().unwrap_or(0.0);
                if fixed > 0.0 { f / fixed } else { 0.0 }
            })
            .collect();
    }

    let remaining = (1.0 - fixed).max(0.0);
    let weight_sum = |w: &[f64]| free.iter().map(|l| w[l.slot()].max(0.0)).sum::<f64>();
    let weights: Option<&[f64]> = match primary {
        Some(w) if weight_sum(w) > 0.0 => Some(w),
        _ if weight_sum(fallback) > 0.0 => Some(fallback),
        _ => None,
    };

    out.iter()
        .map(|l| {
            if let Some(&f) = overrides.get(l) {
                return f;
            }
            match weights {
                Some(w) => remaining * w[l.slot()].max(0.0) / weight_sum(w),
                None => remaining / free.len() as f64,
            }
        })
        .collect()
}

/// Push `flow` from `source` down the network in topological order.
///
/// Returns the flow assigned to every link, indexed by link slot.
pub(crate) fn allocate(
    graph: &Graph,
    source: NodeId,
    flow: f64,
    split: impl Fn(&[LinkId]) -> Vec<f64>,
) -> Vec<f64> {
    let mut node_flow = vec![0.0; graph.nodes().len()];
    let mut link_flow = vec![0.0; graph.links().len()];
    node_flow[source.slot()] = flow;

    for &node in graph.topological_order() {
        let inflow = node_flow[node.slot()];
        let out = graph.outgoing(node);
        if inflow <= 0.0 || out.is_empty() {
            continue;
        }
        for (&link, share) in out.iter().zip(split(out)) {
            let q = inflow * share;
            link_flow[link.slot()] = q;
            node_flow[graph.links()[link.slot()].downstream.slot()] += q;
        }
    }
    link_flow
}
