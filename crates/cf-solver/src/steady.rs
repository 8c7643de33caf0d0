//! Network state evaluation and the solution type.

use cf_components::common::EPSILON_HEAD;
use cf_core::{LinkId, NodeId};
use cf_graph::{Graph, LinkKind, NodeKind};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::SolverConfig;
use crate::error::SolverResult;
use crate::problem::{LinkModel, NetworkProblem, OperatingMode};

/// Delivery outcome for one targeted delivery node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub node: String,
    /// Requested flow (m³/s).
    pub target: f64,
    /// Achieved flow (m³/s).
    pub delivered: f64,
    /// `max(target - delivered, 0)`.
    pub shortfall: f64,
    /// Gates adjusted to serve this delivery.
    pub gates: Vec<String>,
    /// A serving gate is pinned at a travel limit.
    pub saturated: bool,
}

/// Steady-state network solution.
///
/// Per-node vectors are indexed by node slot, per-link vectors by link slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSolution {
    /// Water surface levels (m).
    pub levels: Vec<f64>,
    /// Link discharges (m³/s), downstream positive.
    pub flows: Vec<f64>,
    /// Withdrawals at non-terminal delivery nodes (m³/s).
    pub withdrawals: Vec<f64>,
    /// Gate openings (m); `None` for canal links.
    pub openings: Vec<Option<f64>>,
    pub deliveries: Vec<DeliveryReport>,
    pub iterations: usize,
    pub max_level_change: f64,
    /// Largest |inflow - outflow - withdrawal| over free nodes (m³/s).
    pub max_imbalance: f64,
    pub converged: bool,
}

impl NetworkSolution {
    pub fn level(&self, node: NodeId) -> f64 {
        self.levels[node.slot()]
    }

    pub fn flow(&self, link: LinkId) -> f64 {
        self.flows[link.slot()]
    }

    pub fn opening(&self, link: LinkId) -> Option<f64> {
        self.openings.get(link.slot()).copied().flatten()
    }

    /// Flow through every gate, by gate id.
    pub fn gate_flows<'g>(
        &'g self,
        graph: &'g Graph,
    ) -> impl Iterator<Item = (&'g str, f64)> + 'g {
        graph
            .gates()
            .map(move |link| (link.name.as_str(), self.flows[link.id.slot()]))
    }

    /// Inflow minus outflow minus withdrawal at `node`.
    pub fn net_inflow(&self, graph: &Graph, node: NodeId) -> f64 {
        let inflow: f64 = graph.incoming(node).iter().map(|&l| self.flow(l)).sum();
        let outflow: f64 = graph.outgoing(node).iter().map(|&l| self.flow(l)).sum();
        inflow - outflow - self.withdrawals[node.slot()]
    }
}

/// Per-node data the iteration needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeModel {
    pub bed: f64,
    pub top: f64,
    /// Level held fixed (sources and terminal nodes).
    pub held: Option<f64>,
    /// Full-depth withdrawal (m³/s); zero unless a non-terminal delivery.
    pub demand: f64,
    pub storage: f64,
}

impl NodeModel {
    pub fn is_free(&self) -> bool {
        self.held.is_none()
    }
}

/// Evaluates link discharges and node balances for a problem.
pub(crate) struct Hydraulics<'p, 'a> {
    pub problem: &'p NetworkProblem<'a>,
    pub nodes: Vec<NodeModel>,
    curtail_depth: f64,
}

impl<'p, 'a> Hydraulics<'p, 'a> {
    pub fn new(problem: &'p NetworkProblem<'a>, config: &SolverConfig) -> Self {
        let graph = problem.graph;
        let targets = match &problem.mode {
            OperatingMode::TargetDeliveries { targets, .. } => Some(targets),
            OperatingMode::FixedOpenings(_) => None,
        };

        let nodes = graph
            .nodes()
            .iter()
            .map(|node| {
                let sink = graph.is_sink(node.id);
                let held = match node.kind() {
                    NodeKind::Source => Some(node.spec.fixed_level.unwrap_or(node.top_level())),
                    _ if sink => Some(node.spec.fixed_level.unwrap_or(node.bed_elevation())),
                    _ => node.spec.fixed_level,
                };
                let demand = if node.kind() == NodeKind::Delivery && !sink {
                    targets
                        .and_then(|t| t.get(&node.name).copied())
                        .unwrap_or(node.demand())
                } else {
                    0.0
                };
                NodeModel {
                    bed: node.bed_elevation(),
                    top: node.top_level(),
                    held,
                    demand,
                    storage: node
                        .spec
                        .surface_area
                        .unwrap_or(config.default_surface_area),
                }
            })
            .collect();

        Self {
            problem,
            nodes,
            curtail_depth: config.curtail_depth,
        }
    }

    /// Held levels where fixed, mid-depth elsewhere.
    pub fn initial_levels(&self) -> Vec<f64> {
        self.nodes
            .iter()
            .map(|n| n.held.unwrap_or(0.5 * (n.bed + n.top)))
            .collect()
    }

    /// Withdrawal at `slot` for a given level, curtailed in shallow water.
    pub fn withdrawal(&self, slot: usize, level: f64) -> f64 {
        let node = &self.nodes[slot];
        if node.demand <= 0.0 {
            return 0.0;
        }
        let depth = (level - node.bed).max(0.0);
        node.demand * (depth / self.curtail_depth).min(1.0)
    }

    pub fn withdrawals(&self, levels: &[f64]) -> Vec<f64> {
        (0..self.nodes.len())
            .map(|slot| self.withdrawal(slot, levels[slot]))
            .collect()
    }

    /// Discharge through one link for the given end levels.
    fn link_flow(
        &self,
        slot: usize,
        h_up: f64,
        h_down: f64,
        openings: &[f64],
    ) -> SolverResult<f64> {
        let link = &self.problem.graph.links()[slot];
        let up = &self.nodes[link.upstream.slot()];
        if h_up <= up.bed + EPSILON_HEAD {
            return Ok(0.0);
        }
        match self.problem.links[slot] {
            // The jet cannot be taller than the water standing behind the gate.
            LinkModel::Gate(gate) => {
                let opening = openings[slot].min(h_up - up.bed);
                Ok(gate.flow(h_up, h_down, opening)?)
            }
            LinkModel::Canal(section) => {
                let slope = (h_up - h_down) / section.length.value;
                if slope <= 0.0 {
                    return Ok(0.0);
                }
                let down = &self.nodes[link.downstream.slot()];
                let mean_depth = 0.5 * ((h_up - up.bed) + (h_down - down.bed).max(0.0));
                Ok(section.surface_slope_flow(mean_depth, slope))
            }
        }
    }

    /// All link discharges, evaluated in parallel.
    pub fn link_flows(&self, levels: &[f64], openings: &[f64]) -> SolverResult<Vec<f64>> {
        self.problem
            .graph
            .links()
            .par_iter()
            .enumerate()
            .map(|(slot, link)| {
                self.link_flow(
                    slot,
                    levels[link.upstream.slot()],
                    levels[link.downstream.slot()],
                    openings,
                )
            })
            .collect()
    }

    /// Net inflow at every node from precomputed link flows.
    pub fn imbalances(&self, levels: &[f64], flows: &[f64]) -> Vec<f64> {
        let graph = self.problem.graph;
        let mut net = vec![0.0; self.nodes.len()];
        for link in graph.links() {
            let q = flows[link.id.slot()];
            net[link.downstream.slot()] += q;
            net[link.upstream.slot()] -= q;
        }
        for (slot, value) in net.iter_mut().enumerate() {
            *value -= self.withdrawal(slot, levels[slot]);
        }
        net
    }

    /// Net inflow at one node with its level replaced by `level`.
    pub fn imbalance_at(
        &self,
        node: NodeId,
        level: f64,
        levels: &[f64],
        openings: &[f64],
    ) -> SolverResult<f64> {
        let graph = self.problem.graph;
        let mut net = -self.withdrawal(node.slot(), level);
        for &id in graph.incoming(node) {
            let link = &graph.links()[id.slot()];
            net += self.link_flow(id.slot(), levels[link.upstream.slot()], level, openings)?;
        }
        for &id in graph.outgoing(node) {
            let link = &graph.links()[id.slot()];
            net -= self.link_flow(id.slot(), level, levels[link.downstream.slot()], openings)?;
        }
        Ok(net)
    }

    /// Largest absolute imbalance over free nodes.
    pub fn max_imbalance(&self, imbalances: &[f64]) -> f64 {
        self.nodes
            .iter()
            .zip(imbalances)
            .filter(|(n, _)| n.is_free())
            .map(|(_, v)| v.abs())
            .fold(0.0, f64::max)
    }

    /// Flow reaching a delivery: withdrawal if it passes water on, else net inflow.
    pub fn delivered(&self, node: NodeId, levels: &[f64], flows: &[f64]) -> f64 {
        let graph = self.problem.graph;
        if graph.is_sink(node) {
            graph.incoming(node).iter().map(|&l| flows[l.slot()]).sum()
        } else {
            self.withdrawal(node.slot(), levels[node.slot()])
        }
    }

    /// Opening per link slot for reporting; `None` on canals.
    pub fn report_openings(&self, openings: &[f64]) -> Vec<Option<f64>> {
        self.problem
            .graph
            .links()
            .iter()
            .map(|l| (l.kind == LinkKind::Gate).then(|| openings[l.id.slot()]))
            .collect()
    }
}
