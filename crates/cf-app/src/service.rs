//! Long-lived service owning one compiled canal network.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use cf_components::{CanalSection, Gate, NormalDepth};
use cf_controls::{ControlMode, GateControlState, ModeMachine, TransitionEvent};
use cf_core::units::{cms, m};
use cf_project::{compile, operating_mode, CommFeedDoc, CompiledNetwork, TopologyDoc};
use cf_routing::{FlowPropagator, Propagation};
use cf_solver::{solve, Constraints, NetworkProblem, NetworkSolution, OperatingMode, SolverError};

use crate::error::{AppError, AppResult};

/// Outcome of replaying a communication feed.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub processed: usize,
    pub transitions: Vec<TransitionEvent>,
    /// Mode of every gate after the replay, in catalog order.
    pub modes: Vec<(String, ControlMode)>,
}

/// Compiled network plus its runtime control state.
///
/// Built once at startup and passed by reference to whatever needs it; the
/// catalog, geometry and graph are read-only after construction.
#[derive(Debug)]
pub struct CanalService {
    doc: TopologyDoc,
    network: CompiledNetwork,
    modes: ModeMachine,
}

impl CanalService {
    /// Validate and compile `doc`; every gate's control state starts at `now`.
    pub fn from_document(doc: TopologyDoc, now: DateTime<Utc>) -> AppResult<Self> {
        cf_project::validate_document(&doc).map_err(cf_project::ProjectError::from)?;
        let network = compile(&doc)?;
        let modes = ModeMachine::new(&network.catalog, doc.settings.control, now)?;
        info!(
            network = %doc.name,
            nodes = network.graph.nodes().len(),
            gates = network.catalog.len(),
            canals = network.geometry.len(),
            "canal network loaded"
        );
        Ok(Self {
            doc,
            network,
            modes,
        })
    }

    pub fn load(path: &Path, now: DateTime<Utc>) -> AppResult<Self> {
        let doc = cf_project::load_document(path).map_err(|e| AppError::NetworkLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_document(doc, now)
    }

    pub fn document(&self) -> &TopologyDoc {
        &self.doc
    }

    pub fn network(&self) -> &CompiledNetwork {
        &self.network
    }

    pub fn mode_machine(&self) -> &ModeMachine {
        &self.modes
    }

    fn gate(&self, id: &str) -> AppResult<&Gate> {
        self.network.catalog.get(id).ok_or_else(|| AppError::NotFound {
            what: "gate",
            id: id.to_string(),
        })
    }

    fn canal(&self, upstream: &str, downstream: &str) -> AppResult<&CanalSection> {
        self.network
            .geometry
            .get(upstream, downstream)
            .ok_or_else(|| AppError::NotFound {
                what: "canal",
                id: format!("{upstream}->{downstream}"),
            })
    }

    /// Solve the network in the mode the document asks for.
    pub fn solve(&self) -> AppResult<NetworkSolution> {
        self.solve_with(operating_mode(&self.doc), Constraints::default())
    }

    /// Solve with an explicit mode and constraints.
    ///
    /// A solve that hits the iteration cap still yields its best snapshot,
    /// with `converged == false`.
    pub fn solve_with(
        &self,
        mode: OperatingMode,
        constraints: Constraints,
    ) -> AppResult<NetworkSolution> {
        let net = &self.network;
        let problem = NetworkProblem::new(&net.graph, &net.catalog, &net.geometry, mode)?
            .with_constraints(constraints);
        match solve(&problem, &self.doc.settings.solver) {
            Ok(solution) => Ok(solution),
            Err(SolverError::NonConvergence {
                iterations,
                residual,
                best,
            }) => {
                warn!(iterations, residual, "returning best non-converged solution");
                Ok(*best)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn propagator<'a>(
        &'a self,
        solution: Option<&'a NetworkSolution>,
    ) -> AppResult<FlowPropagator<'a>> {
        let net = &self.network;
        let propagator = FlowPropagator::new(&net.graph, &net.catalog, &net.geometry)?
            .with_depth_config(self.doc.settings.normal_depth);
        Ok(match solution {
            Some(s) => propagator.with_solution(s)?,
            None => propagator,
        })
    }

    /// Arrival times for `flow` released at `source`. Branch splits follow
    /// `solution` when one is given, else link capacity.
    pub fn propagate(
        &self,
        source: &str,
        flow: f64,
        solution: Option<&NetworkSolution>,
    ) -> AppResult<Propagation> {
        self.propagate_with_splits(source, flow, solution, &[])
    }

    /// As [`Self::propagate`], with explicit `(link, fraction)` overrides.
    pub fn propagate_with_splits(
        &self,
        source: &str,
        flow: f64,
        solution: Option<&NetworkSolution>,
        splits: &[(String, f64)],
    ) -> AppResult<Propagation> {
        let mut propagator = self.propagator(solution)?;
        for (link, fraction) in splits {
            propagator = propagator.with_split(link, *fraction)?;
        }
        Ok(propagator.propagate(source, flow)?)
    }

    pub fn find_path(&self, from: &str, to: &str) -> AppResult<Vec<String>> {
        Ok(self.propagator(None)?.find_path(from, to)?)
    }

    pub fn travel_time(&self, from: &str, to: &str, flow: f64) -> AppResult<f64> {
        Ok(self.propagator(None)?.travel_time(from, to, flow)?)
    }

    /// Gate discharge (m³/s) for the given levels (m) and opening (m).
    pub fn discharge(
        &self,
        gate: &str,
        upstream_level: f64,
        downstream_level: f64,
        opening: f64,
    ) -> AppResult<f64> {
        let q = self
            .gate(gate)?
            .discharge(m(upstream_level), m(downstream_level), m(opening))?;
        Ok(q.value)
    }

    pub fn normal_depth(
        &self,
        upstream: &str,
        downstream: &str,
        flow: f64,
    ) -> AppResult<NormalDepth> {
        let section = self.canal(upstream, downstream)?;
        Ok(section.normal_depth(cms(flow), &self.doc.settings.normal_depth)?)
    }

    /// Mean uniform-flow velocity (m/s) in a canal.
    pub fn velocity(&self, upstream: &str, downstream: &str, flow: f64) -> AppResult<f64> {
        let section = self.canal(upstream, downstream)?;
        Ok(section.velocity(cms(flow), &self.doc.settings.normal_depth)?.value)
    }

    pub fn report_communication(
        &self,
        gate: &str,
        success: bool,
        at: DateTime<Utc>,
    ) -> AppResult<Option<TransitionEvent>> {
        Ok(self.modes.report_communication(gate, success, at)?)
    }

    pub fn get_mode(&self, gate: &str) -> AppResult<ControlMode> {
        Ok(self.modes.get_mode(gate)?)
    }

    pub fn gate_state(&self, gate: &str) -> AppResult<GateControlState> {
        Ok(self.modes.state(gate)?)
    }

    pub fn confirm_automatic(
        &self,
        gate: &str,
        operator: &str,
        at: DateTime<Utc>,
    ) -> AppResult<TransitionEvent> {
        Ok(self.modes.confirm_automatic(gate, operator, at)?)
    }

    pub fn clear_failure(
        &self,
        gate: &str,
        report: &str,
        at: DateTime<Utc>,
    ) -> AppResult<TransitionEvent> {
        Ok(self.modes.clear_failure(gate, report, at)?)
    }

    /// Feed recorded health checks through the mode machine in time order.
    pub fn replay(&self, feed: &CommFeedDoc) -> AppResult<ReplaySummary> {
        let mut events: Vec<_> = feed.events.iter().collect();
        events.sort_by_key(|e| e.at);

        let mut transitions = Vec::new();
        for event in &events {
            if let Some(t) = self.report_communication(&event.gate, event.success, event.at)? {
                transitions.push(t);
            }
        }
        Ok(ReplaySummary {
            processed: events.len(),
            transitions,
            modes: self.modes.modes(),
        })
    }
}
