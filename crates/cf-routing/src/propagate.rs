//! Flow propagator: per-gate arrival times for a released flow.

use std::collections::{BTreeMap, HashMap};

use cf_components::{CanalGeometryStore, ComponentError, GateCatalog, NormalDepthConfig};
use cf_core::units::cms;
use cf_core::{LinkId, NodeId};
use cf_graph::{Graph, LinkKind};
use cf_solver::{LinkModel, NetworkSolution};
use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{RoutingError, RoutingResult};
use crate::path;
use crate::split;

/// Flows below this carry no disturbance (m³/s).
const MIN_FLOW: f64 = 1e-9;

fn check_release(flow: f64) -> RoutingResult<()> {
    if flow.is_finite() && flow > 0.0 {
        Ok(())
    } else {
        Err(RoutingError::InvalidInput {
            what: format!("released flow must be positive, got {flow}"),
        })
    }
}

/// Arrival times for one flow release.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Propagation {
    pub source: String,
    /// Released flow (m³/s).
    pub flow: f64,
    /// Shortest arrival time (s) at every reached node.
    pub node_arrivals: BTreeMap<String, f64>,
    /// Arrival time (s) at every gate whose upstream node is reached.
    pub gate_arrivals: BTreeMap<String, f64>,
    /// Flow (m³/s) allocated to each link that carries water.
    pub link_flows: BTreeMap<String, f64>,
    pub unreachable_gates: Vec<String>,
}

/// Travel-time engine over a compiled network.
///
/// Holds only shared references; one propagator can serve any number of
/// queries.
#[derive(Debug)]
pub struct FlowPropagator<'a> {
    graph: &'a Graph,
    links: Vec<LinkModel<'a>>,
    capacities: Vec<f64>,
    depth: NormalDepthConfig,
    overrides: HashMap<LinkId, f64>,
    solution: Option<&'a NetworkSolution>,
}

impl<'a> FlowPropagator<'a> {
    /// Resolve every link and its design capacity.
    ///
    /// A gate's capacity is its full-open discharge from a full upstream node
    /// into a dry downstream one; a canal's is uniform flow at design depth.
    pub fn new(
        graph: &'a Graph,
        catalog: &'a GateCatalog,
        geometry: &'a CanalGeometryStore,
    ) -> RoutingResult<Self> {
        let mut links = Vec::with_capacity(graph.links().len());
        let mut capacities = Vec::with_capacity(graph.links().len());
        for link in graph.links() {
            let up = &graph.nodes()[link.upstream.slot()];
            let down = &graph.nodes()[link.downstream.slot()];
            match link.kind {
                LinkKind::Gate => {
                    let gate = catalog.require(&link.name)?;
                    capacities.push(gate.flow(
                        up.top_level(),
                        down.bed_elevation(),
                        gate.max_opening.value,
                    )?);
                    links.push(LinkModel::Gate(gate));
                }
                LinkKind::Canal => {
                    let section = geometry.require(&up.name, &down.name)?;
                    capacities.push(section.capacity());
                    links.push(LinkModel::Canal(section));
                }
            }
        }

        Ok(Self {
            graph,
            links,
            capacities,
            depth: NormalDepthConfig::default(),
            overrides: HashMap::new(),
            solution: None,
        })
    }

    pub fn with_depth_config(mut self, depth: NormalDepthConfig) -> Self {
        self.depth = depth;
        self
    }

    /// Split branches in the proportions of a solved network.
    pub fn with_solution(mut self, solution: &'a NetworkSolution) -> RoutingResult<Self> {
        if solution.flows.len() != self.graph.links().len() {
            return Err(RoutingError::InvalidInput {
                what: format!(
                    "solution has {} link flows, network has {} links",
                    solution.flows.len(),
                    self.graph.links().len()
                ),
            });
        }
        self.solution = Some(solution);
        Ok(self)
    }

    /// Send a fixed fraction of its upstream node's outflow down `link`.
    pub fn with_split(mut self, link: &str, fraction: f64) -> RoutingResult<Self> {
        let id = self
            .graph
            .link_by_name(link)
            .ok_or_else(|| RoutingError::UnknownLink {
                name: link.to_string(),
            })?;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(RoutingError::InvalidInput {
                what: format!("split fraction for '{link}' must lie in [0, 1], got {fraction}"),
            });
        }
        self.overrides.insert(id, fraction);

        let upstream = self.graph.links()[id.slot()].upstream;
        let total: f64 = self
            .graph
            .outgoing(upstream)
            .iter()
            .filter_map(|l| self.overrides.get(l))
            .sum();
        if total > 1.0 + 1e-9 {
            return Err(RoutingError::InvalidInput {
                what: format!(
                    "split fractions leaving '{}' sum to {total}",
                    self.graph.nodes()[upstream.slot()].name
                ),
            });
        }
        Ok(self)
    }

    /// Flow assigned to every link (by slot) when `flow` is released at `source`.
    pub fn allocate(&self, source: NodeId, flow: f64) -> Vec<f64> {
        let solved = self.solution.map(|s| s.flows.as_slice());
        split::allocate(self.graph, source, flow, |out| {
            split::fractions(out, &self.overrides, solved, &self.capacities)
        })
    }

    /// Transit time (s) of `link` carrying `flow`; `None` if water cannot pass.
    pub fn edge_time(&self, link: LinkId, flow: f64) -> RoutingResult<Option<f64>> {
        if flow.is_nan() || flow <= MIN_FLOW {
            return Ok(None);
        }
        let section = match self.links[link.slot()] {
            LinkModel::Gate(_) => return Ok(Some(0.0)),
            LinkModel::Canal(section) => section,
        };

        let velocity = match section.velocity(cms(flow), &self.depth) {
            Ok(v) => v.value,
            Err(ComponentError::NonConvergence {
                best_estimate,
                residual,
                iterations,
                ..
            }) => {
                warn!(
                    canal = %section.label(),
                    flow,
                    best_estimate,
                    residual,
                    iterations,
                    "normal depth did not converge, using best estimate"
                );
                section.velocity_at(flow, best_estimate).value
            }
            Err(e) => return Err(e.into()),
        };

        if velocity.is_finite() && velocity > 0.0 {
            Ok(Some(section.length.value / velocity))
        } else {
            Ok(None)
        }
    }

    /// Release `flow` at `source` and time its arrival everywhere downstream.
    ///
    /// Arrival at a node is the shortest-time route over links that carry
    /// water. Gates whose upstream node is never reached are listed as
    /// unreachable rather than failing the whole propagation.
    pub fn propagate(&self, source: &str, flow: f64) -> RoutingResult<Propagation> {
        let source_id = self.node(source)?;
        check_release(flow)?;

        let flows = self.allocate(source_id, flow);
        let mut network = DiGraph::<(), f64>::with_capacity(
            self.graph.nodes().len(),
            self.graph.links().len(),
        );
        for _ in self.graph.nodes() {
            network.add_node(());
        }
        for link in self.graph.links() {
            if let Some(time) = self.edge_time(link.id, flows[link.id.slot()])? {
                network.add_edge(
                    NodeIndex::new(link.upstream.slot()),
                    NodeIndex::new(link.downstream.slot()),
                    time,
                );
            }
        }

        let arrivals = dijkstra(&network, NodeIndex::new(source_id.slot()), None, |e| {
            *e.weight()
        });
        let arrival = |node: NodeId| arrivals.get(&NodeIndex::new(node.slot())).copied();

        let node_arrivals = self
            .graph
            .nodes()
            .iter()
            .filter_map(|n| arrival(n.id).map(|t| (n.name.clone(), t)))
            .collect();

        let mut gate_arrivals = BTreeMap::new();
        let mut unreachable_gates = Vec::new();
        for gate in self.graph.gates() {
            match arrival(gate.upstream) {
                Some(t) => {
                    gate_arrivals.insert(gate.name.clone(), t);
                }
                None => unreachable_gates.push(gate.name.clone()),
            }
        }

        let link_flows = self
            .graph
            .links()
            .iter()
            .filter(|l| flows[l.id.slot()] > MIN_FLOW)
            .map(|l| (l.name.clone(), flows[l.id.slot()]))
            .collect();

        info!(
            source,
            flow,
            reached_gates = gate_arrivals.len(),
            unreachable_gates = unreachable_gates.len(),
            "flow propagated"
        );
        Ok(Propagation {
            source: source.to_string(),
            flow,
            node_arrivals,
            gate_arrivals,
            link_flows,
            unreachable_gates,
        })
    }

    /// Nodes along the directed route from `from` to `to`, endpoints included.
    pub fn find_path(&self, from: &str, to: &str) -> RoutingResult<Vec<String>> {
        let (from_id, links) = self.route(from, to)?;
        Ok(path::nodes_along(self.graph, from_id, &links)
            .into_iter()
            .map(|n| self.graph.nodes()[n.slot()].name.clone())
            .collect())
    }

    /// Transit time (s) from `from` to `to` along `find_path` when `flow` is
    /// released at `from`.
    pub fn travel_time(&self, from: &str, to: &str, flow: f64) -> RoutingResult<f64> {
        check_release(flow)?;
        let (from_id, links) = self.route(from, to)?;
        let flows = self.allocate(from_id, flow);

        let mut total = 0.0;
        for link in links {
            match self.edge_time(link, flows[link.slot()])? {
                Some(t) => total += t,
                None => {
                    debug!(
                        from,
                        to,
                        link = %self.graph.links()[link.slot()].name,
                        "link carries no flow"
                    );
                    return Err(RoutingError::Unreachable {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
            }
        }
        Ok(total)
    }

    fn route(&self, from: &str, to: &str) -> RoutingResult<(NodeId, Vec<LinkId>)> {
        let from_id = self.node(from)?;
        let to_id = self.node(to)?;
        let links = path::route(self.graph, from_id, to_id).ok_or_else(|| {
            RoutingError::Unreachable {
                from: from.to_string(),
                to: to.to_string(),
            }
        })?;
        Ok((from_id, links))
    }

    fn node(&self, name: &str) -> RoutingResult<NodeId> {
        self.graph
            .node_by_name(name)
            .ok_or_else(|| RoutingError::UnknownNode {
                name: name.to_string(),
            })
    }
}
