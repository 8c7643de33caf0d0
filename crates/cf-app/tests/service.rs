//! End-to-end checks of the service over the demo network.

use std::path::PathBuf;

use cf_app::{AppError, CanalService};
use cf_controls::ControlMode;
use cf_project::load_feed;
use chrono::{DateTime, Duration, TimeZone, Utc};

fn networks_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop();
    path.pop();
    path.push("networks");
    path
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()
}

fn service() -> CanalService {
    CanalService::load(&networks_dir().join("demo.yaml"), t0()).unwrap()
}

#[test]
fn demo_solves_with_balanced_junction() {
    let svc = service();
    let solution = svc.solve().unwrap();
    assert!(solution.converged);

    let graph = &svc.network().graph;
    let j = graph.node_by_name("J").unwrap();
    let level = solution.level(j);
    assert!(level > 99.0 && level < 100.0, "J level {level}");

    let g1 = solution.flow(graph.link_by_name("G1").unwrap());
    let g2 = solution.flow(graph.link_by_name("G2").unwrap());
    let canal = solution.flow(graph.link_by_name("J->farm").unwrap());
    assert!(g1 > 0.0);
    assert!((g1 - g2 - canal).abs() < 1e-3);
}

#[test]
fn hydraulic_queries_use_the_catalog() {
    let svc = service();

    let q = svc.discharge("G1", 104.0, 99.0, 0.5).unwrap();
    assert!(q > 0.0);
    assert_eq!(svc.discharge("G1", 99.0, 99.0, 0.5).unwrap(), 0.0);
    assert!(matches!(
        svc.discharge("G7", 104.0, 99.0, 0.5),
        Err(AppError::NotFound { what: "gate", .. })
    ));

    let nd = svc.normal_depth("J", "farm", 2.0).unwrap();
    assert!(nd.depth.value > 0.0 && nd.depth.value < 2.0);
    let v = svc.velocity("J", "farm", 2.0).unwrap();
    assert!(v > 0.0);
    assert!(svc.normal_depth("farm", "J", 2.0).is_err());
}

#[test]
fn path_and_travel_time() {
    let svc = service();
    let path = svc.find_path("reservoir", "farm").unwrap();
    assert_eq!(path, vec!["reservoir", "J", "farm"]);

    let t = svc.travel_time("reservoir", "farm", 2.0).unwrap();
    assert!(t > 0.0);
    assert!(svc.find_path("farm", "reservoir").is_err());
}

#[test]
fn propagation_reaches_every_gate() {
    let svc = service();
    let result = svc.propagate("reservoir", 2.5, None).unwrap();
    assert_eq!(result.gate_arrivals.get("G1"), Some(&0.0));
    assert!(result.gate_arrivals.contains_key("G2"));
    assert!(result.unreachable_gates.is_empty());
    assert!(result.node_arrivals["farm"] > 0.0);
}

#[test]
fn demo_feed_drops_g1_to_manual() {
    let svc = service();
    assert_eq!(svc.get_mode("G1").unwrap(), ControlMode::Automatic);
    assert_eq!(svc.get_mode("G2").unwrap(), ControlMode::Manual);

    let feed = load_feed(&networks_dir().join("demo-comms.yaml")).unwrap();
    let summary = svc.replay(&feed).unwrap();

    assert_eq!(summary.processed, 4);
    assert_eq!(summary.transitions.len(), 1);
    assert_eq!(summary.transitions[0].to, ControlMode::Manual);
    assert_eq!(svc.get_mode("G1").unwrap(), ControlMode::Manual);
    let state = svc.gate_state("G1").unwrap();
    assert_eq!(state.consecutive_failures, 0);
    assert!(state.last_success.is_some());

    // The last event restored contact, so the operator may take it back.
    let at = t0() + Duration::hours(7);
    let event = svc.confirm_automatic("G1", "ops", at).unwrap();
    assert_eq!(event.to, ControlMode::Automatic);
    assert_eq!(svc.mode_machine().log().len(), 2);

    let json = serde_json::to_string(&summary).unwrap();
    assert!(json.contains("MANUAL"));
}

#[test]
fn unknown_gate_in_feed_is_an_error() {
    let svc = service();
    let err = svc.report_communication("nope", false, t0()).unwrap_err();
    assert!(matches!(err, AppError::Control(_)));
}

#[test]
fn split_override_sends_everything_down_the_canal() {
    let svc = service();
    let splits = vec![("J->farm".to_string(), 1.0)];
    let result = svc
        .propagate_with_splits("reservoir", 2.0, None, &splits)
        .unwrap();
    assert!((result.link_flows["J->farm"] - 2.0).abs() < 1e-9);
    assert!(!result.link_flows.contains_key("G2"));
}
