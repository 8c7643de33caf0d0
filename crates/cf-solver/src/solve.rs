//! High-level solver interface.

use std::collections::{BTreeMap, HashSet};

use cf_controls::DeliveryController;
use cf_core::{LinkId, NodeId};
use cf_graph::{Graph, LinkKind, NodeKind};
use tracing::{debug, info, warn};

use crate::config::SolverConfig;
use crate::error::{SolverError, SolverResult};
use crate::problem::{NetworkProblem, OpeningLimits, OperatingMode};
use crate::steady::{DeliveryReport, Hydraulics, NetworkSolution};

/// Solve a steady-state network problem.
///
/// This function:
/// 1. Validates the configuration and the problem
/// 2. Starts free nodes at mid-depth and holds sources and terminal nodes
/// 3. Iterates: evaluate all link flows from current levels, then move every
///    free level by `relaxation × imbalance / response`
/// 4. In target mode, trims the feeding gate openings every
///    `adjust_every` iterations and whenever the hydraulics have settled
///
/// Converges when the largest level change is below `level_tolerance`, the
/// largest free-node imbalance is below `flow_tolerance` and, in target mode,
/// a final adjustment left every opening unchanged. Returned flows are
/// evaluated at the returned levels.
pub fn solve(problem: &NetworkProblem, config: &SolverConfig) -> SolverResult<NetworkSolution> {
    config.validate()?;
    problem.validate()?;

    let hydraulics = Hydraulics::new(problem, config);
    let plan = DeliveryPlan::build(problem, config)?;
    let mut openings = initial_openings(problem)?;
    let mut levels = hydraulics.initial_levels();
    let mut saturated = vec![false; problem.graph.links().len()];

    let mut last_change = f64::INFINITY;
    let mut last_adjust = 0;
    let mut best: Option<Snapshot> = None;

    for iteration in 0..=config.max_iterations {
        let flows = hydraulics.link_flows(&levels, &openings)?;
        let imbalances = hydraulics.imbalances(&levels, &flows);
        let max_imbalance = hydraulics.max_imbalance(&imbalances);
        let balanced = max_imbalance < config.flow_tolerance && last_change < config.level_tolerance;

        let mut settled = balanced;
        if let Some(plan) = &plan {
            settled = false;
            if balanced || iteration - last_adjust >= config.adjust_every {
                last_adjust = iteration;
                let changed =
                    plan.adjust(&hydraulics, &levels, &flows, &mut openings, &mut saturated);
                settled = balanced && !changed;
            }
        }

        let snapshot = Snapshot {
            levels: levels.clone(),
            flows,
            openings: openings.clone(),
            iterations: iteration,
            max_level_change: last_change,
            max_imbalance,
        };

        if settled {
            info!(
                iterations = iteration,
                max_imbalance,
                max_level_change = last_change,
                "network solve converged"
            );
            let solution = snapshot.into_solution(&hydraulics, plan.as_ref(), &saturated, true);
            warn_shortfalls(&solution, config);
            return Ok(solution);
        }
        if best
            .as_ref()
            .map_or(true, |b| max_imbalance < b.max_imbalance)
        {
            best = Some(snapshot);
        }
        if iteration == config.max_iterations {
            break;
        }

        last_change = relax_levels(&hydraulics, config, &mut levels, &openings)?;
        debug!(
            iteration,
            max_imbalance,
            max_level_change = last_change,
            "network iteration"
        );
    }

    let best = match best {
        Some(best) => best,
        None => return Err(SolverError::config("solver made no iterations")),
    };
    let residual = best.max_imbalance;
    warn!(
        iterations = config.max_iterations,
        residual, "network solve did not converge"
    );
    Err(SolverError::NonConvergence {
        iterations: config.max_iterations,
        residual,
        best: Box::new(best.into_solution(&hydraulics, plan.as_ref(), &saturated, false)),
    })
}

/// State captured at one iteration, before levels move.
struct Snapshot {
    levels: Vec<f64>,
    flows: Vec<f64>,
    openings: Vec<f64>,
    iterations: usize,
    max_level_change: f64,
    max_imbalance: f64,
}

impl Snapshot {
    fn into_solution(
        self,
        hydraulics: &Hydraulics,
        plan: Option<&DeliveryPlan>,
        saturated: &[bool],
        converged: bool,
    ) -> NetworkSolution {
        let graph = hydraulics.problem.graph;
        let deliveries = graph
            .nodes()
            .iter()
            .filter(|n| n.kind() == NodeKind::Delivery)
            .map(|node| {
                let target = plan
                    .and_then(|p| p.target_for(node.id))
                    .unwrap_or(node.demand());
                let delivered = hydraulics.delivered(node.id, &self.levels, &self.flows);
                let gates = feeding_gates(graph, node.id);
                DeliveryReport {
                    node: node.name.clone(),
                    target,
                    delivered,
                    shortfall: (target - delivered).max(0.0),
                    saturated: gates.iter().any(|g| saturated[g.slot()]),
                    gates: gates
                        .iter()
                        .map(|g| graph.links()[g.slot()].name.clone())
                        .collect(),
                }
            })
            .collect();

        NetworkSolution {
            withdrawals: hydraulics.withdrawals(&self.levels),
            openings: hydraulics.report_openings(&self.openings),
            levels: self.levels,
            flows: self.flows,
            deliveries,
            iterations: self.iterations,
            max_level_change: self.max_level_change,
            max_imbalance: self.max_imbalance,
            converged,
        }
    }
}

/// Move every free level toward balance; returns the largest change.
fn relax_levels(
    hydraulics: &Hydraulics,
    config: &SolverConfig,
    levels: &mut [f64],
    openings: &[f64],
) -> SolverResult<f64> {
    let current = levels.to_vec();
    let dh = config.derivative_step;
    let mut max_change = 0.0_f64;

    for (slot, node) in hydraulics.nodes.iter().enumerate() {
        if !node.is_free() {
            continue;
        }
        let id = NodeId::from_index(slot as u32);
        let base = hydraulics.imbalance_at(id, current[slot], &current, openings)?;
        let probe = hydraulics.imbalance_at(id, current[slot] + dh, &current, openings)?;
        let response = node.storage / config.time_step + ((probe - base) / dh).abs();

        let step = (config.relaxation * base / response)
            .clamp(-config.max_level_step, config.max_level_step);
        let next = (current[slot] + step).clamp(node.bed, node.top);
        max_change = max_change.max((next - current[slot]).abs());
        levels[slot] = next;
    }
    Ok(max_change)
}

/// Opening per link slot at the start of the solve (0 on canals).
fn initial_openings(problem: &NetworkProblem) -> SolverResult<Vec<f64>> {
    let mut openings = vec![0.0; problem.graph.links().len()];
    for link in problem.graph.gates() {
        let gate = problem
            .gate(link.id)
            .ok_or_else(|| SolverError::config(format!("link '{}' has no gate", link.name)))?;
        let max = gate.max_opening.value;
        openings[link.id.slot()] = match &problem.mode {
            OperatingMode::FixedOpenings(given) => given
                .get(&link.name)
                .map(|e| e.min(max))
                .ok_or_else(|| {
                    SolverError::config(format!("no opening given for gate '{}'", link.name))
                })?,
            OperatingMode::TargetDeliveries {
                initial_openings, ..
            } => {
                let limits = problem.limits(gate);
                initial_openings
                    .get(&link.name)
                    .copied()
                    .unwrap_or(0.5 * max)
                    .clamp(limits.min, limits.max)
            }
        };
    }
    Ok(openings)
}

/// Gates nearest upstream of `node`, following canals but not crossing gates.
pub fn feeding_gates(graph: &Graph, node: NodeId) -> Vec<LinkId> {
    let mut gates = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        for &id in graph.incoming(current) {
            let link = &graph.links()[id.slot()];
            match link.kind {
                LinkKind::Gate => {
                    if !gates.contains(&id) {
                        gates.push(id);
                    }
                }
                LinkKind::Canal => stack.push(link.upstream),
            }
        }
    }
    gates.sort();
    gates
}

struct TargetDelivery {
    node: NodeId,
    target: f64,
}

/// A gate and the deliveries it serves.
struct GateGroup {
    gate: LinkId,
    deliveries: Vec<usize>,
    limits: OpeningLimits,
}

/// Target-mode control plan: which gates chase which deliveries.
struct DeliveryPlan {
    controller: DeliveryController,
    deliveries: Vec<TargetDelivery>,
    groups: Vec<GateGroup>,
}

impl DeliveryPlan {
    fn build(problem: &NetworkProblem, config: &SolverConfig) -> SolverResult<Option<Self>> {
        let OperatingMode::TargetDeliveries { targets, .. } = &problem.mode else {
            return Ok(None);
        };
        let graph = problem.graph;

        let mut deliveries = Vec::with_capacity(targets.len());
        for (name, &target) in targets {
            let node = graph
                .node_by_name(name)
                .ok_or_else(|| SolverError::config(format!("target for unknown node '{name}'")))?;
            deliveries.push(TargetDelivery { node, target });
        }
        deliveries.sort_by_key(|d| d.node);

        let mut by_gate: BTreeMap<LinkId, Vec<usize>> = BTreeMap::new();
        for (index, delivery) in deliveries.iter().enumerate() {
            let gates = feeding_gates(graph, delivery.node);
            if gates.is_empty() {
                return Err(SolverError::config(format!(
                    "no gate controls delivery '{}'",
                    graph.nodes()[delivery.node.slot()].name
                )));
            }
            for gate in gates {
                by_gate.entry(gate).or_default().push(index);
            }
        }

        let mut groups = Vec::with_capacity(by_gate.len());
        for (gate, served) in by_gate {
            let limits = problem
                .gate(gate)
                .map(|g| problem.limits(g))
                .ok_or_else(|| SolverError::config(format!("link {gate} has no gate")))?;
            groups.push(GateGroup {
                gate,
                deliveries: served,
                limits,
            });
        }

        let mut controller = config.controller;
        if let Some(step) = problem.constraints.max_opening_step {
            controller.max_step = step;
        }

        Ok(Some(Self {
            controller,
            deliveries,
            groups,
        }))
    }

    fn target_for(&self, node: NodeId) -> Option<f64> {
        self.deliveries
            .iter()
            .find(|d| d.node == node)
            .map(|d| d.target)
    }

    /// One proportional adjustment round; returns whether any opening moved.
    fn adjust(
        &self,
        hydraulics: &Hydraulics,
        levels: &[f64],
        flows: &[f64],
        openings: &mut [f64],
        saturated: &mut [bool],
    ) -> bool {
        let delivered: Vec<f64> = self
            .deliveries
            .iter()
            .map(|d| hydraulics.delivered(d.node, levels, flows))
            .collect();

        let mut changed = false;
        for group in &self.groups {
            let target: f64 = group.deliveries.iter().map(|&i| self.deliveries[i].target).sum();
            let got: f64 = group.deliveries.iter().map(|&i| delivered[i]).sum();
            let slot = group.gate.slot();
            let current = openings[slot];

            let adj = self
                .controller
                .adjust(current, group.limits.max, target, got);
            let next = adj.opening.max(group.limits.min);
            let pinned_shut = next <= group.limits.min && got > target + self.controller.deadband;
            saturated[slot] = adj.saturated || pinned_shut;

            if (next - current).abs() > 1e-12 {
                openings[slot] = next;
                changed = true;
            }
        }
        changed
    }
}

fn warn_shortfalls(solution: &NetworkSolution, config: &SolverConfig) {
    for report in &solution.deliveries {
        if report.shortfall > config.controller.deadband {
            warn!(
                node = %report.node,
                target = report.target,
                delivered = report.delivered,
                saturated = report.saturated,
                "delivery target not met"
            );
        }
    }
}
