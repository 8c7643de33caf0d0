use cf_project::schema::*;
use cf_project::{validate_document, ValidationError};

fn base() -> TopologyDoc {
    serde_yaml::from_str(
        r#"
version: 1
name: base
nodes:
  - { id: head, kind: source, bed_elevation_m: 100.0, max_depth_m: 4.0 }
  - { id: J, kind: junction, bed_elevation_m: 98.0, max_depth_m: 3.0 }
  - { id: farm, kind: delivery, bed_elevation_m: 97.0, max_depth_m: 2.0, demand_m3s: 1.0 }
gates:
  - { id: G1, upstream: head, downstream: J, width_m: 2.0, max_opening_m: 1.0 }
canals:
  - upstream: J
    downstream: farm
    length_m: 500.0
    bottom_width_m: 2.0
    side_slope: 1.0
    roughness_n: 0.02
    bed_slope: 0.001
    max_depth_m: 2.0
openings:
  G1: 0.5
"#,
    )
    .unwrap()
}

#[test]
fn base_document_is_valid() {
    validate_document(&base()).unwrap();
}

#[test]
fn rejects_future_version() {
    let mut doc = base();
    doc.version = 7;
    assert_eq!(
        validate_document(&doc),
        Err(ValidationError::UnsupportedVersion { version: 7 })
    );
}

#[test]
fn rejects_duplicate_node() {
    let mut doc = base();
    let dup = doc.nodes[1].clone();
    doc.nodes.push(dup);
    assert!(matches!(
        validate_document(&doc),
        Err(ValidationError::DuplicateId { id, .. }) if id == "J"
    ));
}

#[test]
fn rejects_gate_to_unknown_node() {
    let mut doc = base();
    doc.gates[0].downstream = "nowhere".to_string();
    assert!(matches!(
        validate_document(&doc),
        Err(ValidationError::MissingReference { id, .. }) if id == "nowhere"
    ));
}

#[test]
fn rejects_network_without_source() {
    let mut doc = base();
    doc.nodes[0].kind = NodeKindDef::Junction;
    assert_eq!(validate_document(&doc), Err(ValidationError::NoSource));
}

#[test]
fn rejects_bad_geometry() {
    let mut doc = base();
    doc.canals[0].roughness_n = 0.0;
    assert!(matches!(
        validate_document(&doc),
        Err(ValidationError::InvalidValue { field, .. }) if field.ends_with("roughness_n")
    ));

    let mut doc = base();
    doc.canals[0].bottom_width_m = 0.0;
    doc.canals[0].side_slope = 0.0;
    assert!(validate_document(&doc).is_err());
}

#[test]
fn rejects_opening_beyond_travel() {
    let mut doc = base();
    doc.openings.insert("G1".to_string(), 1.5);
    assert!(matches!(
        validate_document(&doc),
        Err(ValidationError::InvalidValue { .. })
    ));
}

#[test]
fn rejects_opening_for_unknown_gate() {
    let mut doc = base();
    doc.openings.insert("G9".to_string(), 0.1);
    assert!(matches!(
        validate_document(&doc),
        Err(ValidationError::MissingReference { id, .. }) if id == "G9"
    ));
}

#[test]
fn targets_must_name_delivery_nodes() {
    let mut doc = base();
    doc.targets.insert("J".to_string(), 1.0);
    assert!(matches!(
        validate_document(&doc),
        Err(ValidationError::InvalidValue { .. })
    ));

    let mut doc = base();
    doc.targets.insert("farm".to_string(), 1.0);
    validate_document(&doc).unwrap();
}

#[test]
fn rejects_level_above_top() {
    let mut doc = base();
    doc.nodes[0].level_m = Some(105.0);
    assert!(validate_document(&doc).is_err());
}
