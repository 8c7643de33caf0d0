//! Problem definition for steady-state network solving.

use std::collections::HashMap;

use cf_components::{CanalGeometryStore, CanalSection, Gate, GateCatalog};
use cf_core::LinkId;
use cf_graph::{Graph, LinkKind, NodeKind};

use crate::error::{SolverError, SolverResult};

/// Physical model behind a graph link.
#[derive(Debug, Clone, Copy)]
pub enum LinkModel<'a> {
    Gate(&'a Gate),
    Canal(&'a CanalSection),
}

/// What the solver holds fixed.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatingMode {
    /// Every gate opening (m) is given; levels and flows are solved.
    FixedOpenings(HashMap<String, f64>),
    /// Delivery flows (m³/s) per delivery node are targeted; openings of the
    /// gates feeding them are adjusted. Gates missing from
    /// `initial_openings` start half open.
    TargetDeliveries {
        targets: HashMap<String, f64>,
        initial_openings: HashMap<String, f64>,
    },
}

/// Travel window a gate may be driven within (m).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningLimits {
    pub min: f64,
    pub max: f64,
}

/// Operating constraints applied while adjusting openings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    /// Overrides the controller's per-adjustment step limit (m).
    pub max_opening_step: Option<f64>,
    pub opening_limits: HashMap<String, OpeningLimits>,
}

/// Steady-state network problem.
///
/// Links are resolved against the catalog and geometry store up front so the
/// solve itself never looks anything up by name.
#[derive(Debug)]
pub struct NetworkProblem<'a> {
    pub graph: &'a Graph,
    /// Physical model per link, indexed by link slot.
    pub links: Vec<LinkModel<'a>>,
    pub mode: OperatingMode,
    pub constraints: Constraints,
}

impl<'a> NetworkProblem<'a> {
    /// Resolve every graph link to its gate or canal section.
    pub fn new(
        graph: &'a Graph,
        catalog: &'a GateCatalog,
        geometry: &'a CanalGeometryStore,
        mode: OperatingMode,
    ) -> SolverResult<Self> {
        let node_name = |id: cf_core::NodeId| {
            graph
                .node(id)
                .map(|n| n.name.as_str())
                .ok_or_else(|| SolverError::config(format!("link refers to unknown node {id}")))
        };

        let mut links = Vec::with_capacity(graph.links().len());
        for link in graph.links() {
            let up = node_name(link.upstream)?;
            let down = node_name(link.downstream)?;
            let model = match link.kind {
                LinkKind::Gate => {
                    let gate = catalog.require(&link.name)?;
                    if gate.upstream != up || gate.downstream != down {
                        return Err(SolverError::config(format!(
                            "gate '{}' is cataloged as {} -> {} but placed on {up} -> {down}",
                            link.name, gate.upstream, gate.downstream
                        )));
                    }
                    LinkModel::Gate(gate)
                }
                LinkKind::Canal => LinkModel::Canal(geometry.require(up, down)?),
            };
            links.push(model);
        }

        for gate in catalog.iter() {
            let placed = graph
                .link_by_name(gate.id())
                .and_then(|id| graph.link(id))
                .is_some_and(|l| l.kind == LinkKind::Gate);
            if !placed {
                return Err(SolverError::config(format!(
                    "gate '{}' is not part of the network",
                    gate.id()
                )));
            }
        }

        Ok(Self {
            graph,
            links,
            mode,
            constraints: Constraints::default(),
        })
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// The gate on `link`, if it is one.
    pub fn gate(&self, link: LinkId) -> Option<&'a Gate> {
        match self.links.get(link.slot()) {
            Some(LinkModel::Gate(gate)) => Some(gate),
            _ => None,
        }
    }

    /// Check openings, targets and constraints against the network.
    pub fn validate(&self) -> SolverResult<()> {
        if self.links.len() != self.graph.links().len() {
            return Err(SolverError::config(format!(
                "link model count mismatch: {} != {}",
                self.links.len(),
                self.graph.links().len()
            )));
        }

        match &self.mode {
            OperatingMode::FixedOpenings(openings) => {
                self.check_openings(openings)?;
                for link in self.graph.gates() {
                    if !openings.contains_key(&link.name) {
                        return Err(SolverError::config(format!(
                            "no opening given for gate '{}'",
                            link.name
                        )));
                    }
                }
            }
            OperatingMode::TargetDeliveries {
                targets,
                initial_openings,
            } => {
                self.check_openings(initial_openings)?;
                if targets.is_empty() {
                    return Err(SolverError::config("target mode needs at least one target"));
                }
                for (name, &flow) in targets {
                    let node = self
                        .graph
                        .node_by_name(name)
                        .and_then(|id| self.graph.node(id))
                        .ok_or_else(|| {
                            SolverError::config(format!("target for unknown node '{name}'"))
                        })?;
                    if node.kind() != NodeKind::Delivery {
                        return Err(SolverError::config(format!(
                            "target node '{name}' is not a delivery"
                        )));
                    }
                    if !(flow.is_finite() && flow >= 0.0) {
                        return Err(SolverError::config(format!(
                            "target for '{name}' must be non-negative, got {flow}"
                        )));
                    }
                }
            }
        }

        if let Some(step) = self.constraints.max_opening_step {
            if !(step.is_finite() && step > 0.0) {
                return Err(SolverError::config("max_opening_step must be positive"));
            }
        }
        for (name, limits) in &self.constraints.opening_limits {
            let gate = self.gate_by_name(name)?;
            let valid = limits.min.is_finite()
                && limits.max.is_finite()
                && 0.0 <= limits.min
                && limits.min <= limits.max
                && limits.max <= gate.max_opening.value;
            if !valid {
                return Err(SolverError::config(format!(
                    "opening limits for '{name}' must satisfy 0 <= min <= max <= {}",
                    gate.max_opening.value
                )));
            }
        }
        Ok(())
    }

    /// Travel window for a gate: its limits if constrained, else full travel.
    pub fn limits(&self, gate: &Gate) -> OpeningLimits {
        self.constraints
            .opening_limits
            .get(gate.id())
            .copied()
            .unwrap_or(OpeningLimits {
                min: 0.0,
                max: gate.max_opening.value,
            })
    }

    fn gate_by_name(&self, name: &str) -> SolverResult<&'a Gate> {
        self.graph
            .link_by_name(name)
            .and_then(|id| self.gate(id))
            .ok_or_else(|| SolverError::config(format!("unknown gate '{name}'")))
    }

    fn check_openings(&self, openings: &HashMap<String, f64>) -> SolverResult<()> {
        for (name, &opening) in openings {
            self.gate_by_name(name)?;
            if !(opening.is_finite() && opening >= 0.0) {
                return Err(SolverError::config(format!(
                    "opening for '{name}' must be non-negative, got {opening}"
                )));
            }
        }
        Ok(())
    }
}
