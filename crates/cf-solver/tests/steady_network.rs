//! Integration tests for the steady-state network solver.

use std::collections::HashMap;

use cf_components::{CanalGeometryStore, CanalSection, Gate, GateCatalog};
use cf_core::units::m;
use cf_graph::{Graph, GraphBuilder, LinkKind, NodeSpec};
use cf_solver::{
    solve, Constraints, NetworkProblem, OpeningLimits, OperatingMode, SolverConfig, SolverError,
};
use proptest::prelude::*;

/// reservoir --G1--> J --canal--> farm
///                    \--G2--> lateral
struct Fixture {
    graph: Graph,
    catalog: GateCatalog,
    geometry: CanalGeometryStore,
}

fn branching() -> Fixture {
    let mut b = GraphBuilder::new();
    let res = b.add_node("reservoir", NodeSpec::source(100.0, 5.0));
    let j = b.add_node("J", NodeSpec::junction(98.0, 3.0));
    let farm = b.add_node("farm", NodeSpec::delivery(97.0, 2.0, 2.0));
    let lateral = b.add_node("lateral", NodeSpec::delivery(96.0, 2.0, 0.5));
    b.add_link("G1", LinkKind::Gate, res, j);
    b.add_link("J->farm", LinkKind::Canal, j, farm);
    b.add_link("G2", LinkKind::Gate, j, lateral);

    Fixture {
        graph: b.build().unwrap(),
        catalog: GateCatalog::new([
            Gate::new("G1", "reservoir", "J", m(2.0), m(1.5)),
            Gate::new("G2", "J", "lateral", m(1.0), m(1.0)),
        ])
        .unwrap(),
        geometry: CanalGeometryStore::new([CanalSection {
            upstream: "J".into(),
            downstream: "farm".into(),
            length: m(800.0),
            bottom_width: m(3.0),
            side_slope: 1.5,
            roughness: 0.025,
            bed_slope: 0.0005,
            max_depth: m(2.0),
        }])
        .unwrap(),
    }
}

fn openings(g1: f64, g2: f64) -> HashMap<String, f64> {
    HashMap::from([("G1".to_string(), g1), ("G2".to_string(), g2)])
}

#[test]
fn fixed_openings_balance_the_junction() {
    let fx = branching();
    let problem = NetworkProblem::new(
        &fx.graph,
        &fx.catalog,
        &fx.geometry,
        OperatingMode::FixedOpenings(openings(0.3, 0.2)),
    )
    .unwrap();
    let config = SolverConfig::default();

    let solution = solve(&problem, &config).unwrap();
    assert!(solution.converged);
    assert!(solution.iterations > 0);

    let j = fx.graph.node_by_name("J").unwrap();
    let level = solution.level(j);
    assert!(level > 99.0 && level < 100.0, "J level {level}");
    assert!(solution.net_inflow(&fx.graph, j).abs() < config.flow_tolerance);

    let flow = |name: &str| solution.flow(fx.graph.link_by_name(name).unwrap());
    assert!(flow("G1") > 0.0);
    assert!((flow("G1") - flow("G2") - flow("J->farm")).abs() < config.flow_tolerance);

    // Held boundaries.
    let res = fx.graph.node_by_name("reservoir").unwrap();
    assert_eq!(solution.level(res), 105.0);
    let farm = fx.graph.node_by_name("farm").unwrap();
    assert_eq!(solution.level(farm), 97.0);

    assert_eq!(solution.opening(fx.graph.link_by_name("G1").unwrap()), Some(0.3));
    assert_eq!(solution.opening(fx.graph.link_by_name("J->farm").unwrap()), None);
    assert_eq!(solution.gate_flows(&fx.graph).count(), 2);
}

#[test]
fn fixed_mode_requires_every_opening() {
    let fx = branching();
    let mut given = openings(0.3, 0.2);
    given.remove("G2");
    let problem = NetworkProblem::new(
        &fx.graph,
        &fx.catalog,
        &fx.geometry,
        OperatingMode::FixedOpenings(given),
    )
    .unwrap();
    assert!(matches!(
        solve(&problem, &SolverConfig::default()),
        Err(SolverError::Configuration { .. })
    ));
}

#[test]
fn closed_gates_pass_no_water() {
    let fx = branching();
    let problem = NetworkProblem::new(
        &fx.graph,
        &fx.catalog,
        &fx.geometry,
        OperatingMode::FixedOpenings(openings(0.0, 0.5)),
    )
    .unwrap();

    let solution = solve(&problem, &SolverConfig::default()).unwrap();
    assert!(solution.converged);
    assert!(solution.flows.iter().all(|&q| q.abs() < 1e-3));
}

#[test]
fn iteration_cap_reports_best_estimate() {
    let fx = branching();
    let problem = NetworkProblem::new(
        &fx.graph,
        &fx.catalog,
        &fx.geometry,
        OperatingMode::FixedOpenings(openings(0.3, 0.2)),
    )
    .unwrap();
    let config = SolverConfig {
        max_iterations: 2,
        ..SolverConfig::default()
    };

    match solve(&problem, &config) {
        Err(SolverError::NonConvergence {
            iterations,
            residual,
            best,
        }) => {
            assert_eq!(iterations, 2);
            assert!(!best.converged);
            assert_eq!(best.max_imbalance, residual);
            assert_eq!(best.levels.len(), 4);
        }
        other => panic!("expected non-convergence, got {other:?}"),
    }
}

#[test]
fn target_mode_trims_feeding_gate() {
    let fx = branching();
    let problem = NetworkProblem::new(
        &fx.graph,
        &fx.catalog,
        &fx.geometry,
        OperatingMode::TargetDeliveries {
            targets: HashMap::from([("farm".to_string(), 4.0)]),
            initial_openings: openings(0.3, 0.2),
        },
    )
    .unwrap();

    let solution = solve(&problem, &SolverConfig::default()).unwrap();
    assert!(solution.converged);

    let farm = solution
        .deliveries
        .iter()
        .find(|d| d.node == "farm")
        .unwrap();
    assert_eq!(farm.target, 4.0);
    assert_eq!(farm.gates, vec!["G1".to_string()]);
    assert!((farm.delivered - 4.0).abs() < 0.05, "delivered {}", farm.delivered);
    assert!(!farm.saturated);

    let g1 = solution.opening(fx.graph.link_by_name("G1").unwrap()).unwrap();
    assert!(g1 > 0.3 && g1 < 1.5, "G1 opening {g1}");
    // Not a controlling gate for any target.
    let g2 = solution.opening(fx.graph.link_by_name("G2").unwrap()).unwrap();
    assert_eq!(g2, 0.2);
}

#[test]
fn unreachable_target_saturates_gate() {
    let fx = branching();
    let problem = NetworkProblem::new(
        &fx.graph,
        &fx.catalog,
        &fx.geometry,
        OperatingMode::TargetDeliveries {
            targets: HashMap::from([("farm".to_string(), 50.0)]),
            initial_openings: openings(0.3, 0.2),
        },
    )
    .unwrap()
    .with_constraints(Constraints {
        max_opening_step: Some(0.2),
        opening_limits: HashMap::from([(
            "G1".to_string(),
            OpeningLimits { min: 0.1, max: 1.2 },
        )]),
    });

    let solution = solve(&problem, &SolverConfig::default()).unwrap();
    let farm = solution
        .deliveries
        .iter()
        .find(|d| d.node == "farm")
        .unwrap();
    assert!(farm.saturated);
    assert!(farm.shortfall > 10.0);
    assert_eq!(
        solution.opening(fx.graph.link_by_name("G1").unwrap()),
        Some(1.2)
    );
}

#[test]
fn target_on_non_delivery_is_rejected() {
    let fx = branching();
    let problem = NetworkProblem::new(
        &fx.graph,
        &fx.catalog,
        &fx.geometry,
        OperatingMode::TargetDeliveries {
            targets: HashMap::from([("J".to_string(), 1.0)]),
            initial_openings: HashMap::new(),
        },
    )
    .unwrap();
    assert!(solve(&problem, &SolverConfig::default()).is_err());
}

#[test]
fn misplaced_gate_is_rejected() {
    let fx = branching();
    let catalog = GateCatalog::new([
        Gate::new("G1", "reservoir", "lateral", m(2.0), m(1.5)),
        Gate::new("G2", "J", "lateral", m(1.0), m(1.0)),
    ])
    .unwrap();
    let result = NetworkProblem::new(
        &fx.graph,
        &catalog,
        &fx.geometry,
        OperatingMode::FixedOpenings(openings(0.3, 0.2)),
    );
    assert!(matches!(result, Err(SolverError::Configuration { .. })));
}

#[test]
fn delivery_offtake_withdraws_its_demand() {
    let mut b = GraphBuilder::new();
    let res = b.add_node("reservoir", NodeSpec::source(100.0, 5.0));
    let d = b.add_node("offtake", NodeSpec::delivery(98.0, 3.0, 1.0));
    let tail = b.add_node("tail", NodeSpec::junction(97.0, 2.0));
    b.add_link("G1", LinkKind::Gate, res, d);
    b.add_link("offtake->tail", LinkKind::Canal, d, tail);
    let graph = b.build().unwrap();

    let catalog = GateCatalog::new([Gate::new("G1", "reservoir", "offtake", m(2.0), m(1.5))])
        .unwrap();
    let geometry = CanalGeometryStore::new([CanalSection {
        upstream: "offtake".into(),
        downstream: "tail".into(),
        length: m(500.0),
        bottom_width: m(2.0),
        side_slope: 1.0,
        roughness: 0.03,
        bed_slope: 0.0005,
        max_depth: m(3.0),
    }])
    .unwrap();

    let problem = NetworkProblem::new(
        &graph,
        &catalog,
        &geometry,
        OperatingMode::FixedOpenings(HashMap::from([("G1".to_string(), 0.4)])),
    )
    .unwrap();
    let config = SolverConfig::default();
    let solution = solve(&problem, &config).unwrap();

    assert!((solution.withdrawals[d.slot()] - 1.0).abs() < 1e-9);
    assert!(solution.net_inflow(&graph, d).abs() < config.flow_tolerance);
    let report = &solution.deliveries[0];
    assert_eq!(report.node, "offtake");
    assert!(report.shortfall < 1e-9);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn converged_junction_conserves_mass(g1 in 0.05f64..1.5, g2 in 0.0f64..1.0) {
        let fx = branching();
        let problem = NetworkProblem::new(
            &fx.graph,
            &fx.catalog,
            &fx.geometry,
            OperatingMode::FixedOpenings(openings(g1, g2)),
        )
        .unwrap();
        let config = SolverConfig::default();
        let solution = solve(&problem, &config).unwrap();

        let j = fx.graph.node_by_name("J").unwrap();
        prop_assert!(solution.converged);
        prop_assert!(solution.net_inflow(&fx.graph, j).abs() < config.flow_tolerance);
        let level = solution.level(j);
        prop_assert!((98.0..=101.0).contains(&level));
    }
}
