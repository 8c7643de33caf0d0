use std::path::PathBuf;

use cf_graph::LinkKind;
use cf_project::{compile, load_feed, load_yaml, operating_mode};
use cf_solver::OperatingMode;

fn networks_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../networks")
}

#[test]
fn demo_network_compiles() {
    let doc = load_yaml(&networks_dir().join("demo.yaml")).unwrap();
    let net = compile(&doc).unwrap();

    assert_eq!(net.graph.nodes().len(), 4);
    assert_eq!(net.graph.links().len(), 3);
    assert_eq!(net.catalog.len(), 2);
    assert_eq!(net.geometry.len(), 1);

    let canal = net.graph.link_by_name("J->farm").unwrap();
    assert_eq!(net.graph.link(canal).unwrap().kind, LinkKind::Canal);
    assert!(net.geometry.get("J", "farm").is_some());

    let g2 = net.catalog.get("G2").unwrap();
    assert!(!g2.is_automated());
    assert_eq!(net.catalog.get("G1").unwrap().control_tag.as_deref(), Some("HW-G1"));

    assert_eq!(doc.settings.solver.max_iterations, 2000);
    assert!(matches!(operating_mode(&doc), OperatingMode::FixedOpenings(o) if o.len() == 2));
}

#[test]
fn targets_switch_the_operating_mode() {
    let mut doc = load_yaml(&networks_dir().join("demo.yaml")).unwrap();
    doc.targets.insert("farm".to_string(), 1.8);
    match operating_mode(&doc) {
        OperatingMode::TargetDeliveries {
            targets,
            initial_openings,
        } => {
            assert_eq!(targets["farm"], 1.8);
            assert_eq!(initial_openings["G1"], 0.3);
        }
        other => panic!("unexpected mode {other:?}"),
    }
}

#[test]
fn demo_feed_loads() {
    let feed = load_feed(&networks_dir().join("demo-comms.yaml")).unwrap();
    assert_eq!(feed.events.len(), 4);
    assert!(feed.events.iter().take(3).all(|e| e.gate == "G1" && !e.success));
    assert!(feed.events[0].at < feed.events[3].at);
}

#[test]
fn cyclic_document_fails_to_compile() {
    let mut doc = load_yaml(&networks_dir().join("demo.yaml")).unwrap();
    let mut back = doc.canals[0].clone();
    back.upstream = "farm".to_string();
    back.downstream = "J".to_string();
    doc.canals.push(back);
    cf_project::validate_document(&doc).unwrap();
    assert!(matches!(compile(&doc), Err(cf_project::ProjectError::Graph(_))));
}
