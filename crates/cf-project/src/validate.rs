//! Document validation logic.

use std::collections::{HashMap, HashSet};

use crate::schema::{CalibrationDef, CanalDef, GateDef, NodeDef, NodeKindDef, TopologyDoc};

/// Current (and only) document version.
pub const LATEST_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },

    #[error("Network has no source node")]
    NoSource,
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(field: String, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value, "must be positive"))
    }
}

fn non_negative(field: String, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value, "must be non-negative"))
    }
}

/// Structural and numeric checks that need no graph.
///
/// Cycles and self loops are rejected later, when the graph is built.
pub fn validate_document(doc: &TopologyDoc) -> Result<(), ValidationError> {
    if doc.version == 0 || doc.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: doc.version,
        });
    }

    let mut nodes: HashMap<&str, &NodeDef> = HashMap::new();
    for node in &doc.nodes {
        if nodes.insert(&node.id, node).is_some() {
            return Err(ValidationError::DuplicateId {
                id: node.id.clone(),
                context: "nodes".to_string(),
            });
        }
        validate_node(node)?;
    }
    if !doc.nodes.iter().any(|n| n.kind == NodeKindDef::Source) {
        return Err(ValidationError::NoSource);
    }

    let mut gate_ids = HashSet::new();
    for gate in &doc.gates {
        if !gate_ids.insert(gate.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: gate.id.clone(),
                context: "gates".to_string(),
            });
        }
        validate_gate(gate, &nodes)?;
    }

    let mut pairs = HashSet::new();
    for canal in &doc.canals {
        let label = format!("{}->{}", canal.upstream, canal.downstream);
        if gate_ids.contains(label.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: label,
                context: "canal label clashes with a gate id".to_string(),
            });
        }
        if !pairs.insert((canal.upstream.as_str(), canal.downstream.as_str())) {
            return Err(ValidationError::DuplicateId {
                id: label,
                context: "canals".to_string(),
            });
        }
        validate_canal(canal, &label, &nodes)?;
    }

    for (gate, &opening) in &doc.openings {
        let def = doc
            .gates
            .iter()
            .find(|g| &g.id == gate)
            .ok_or_else(|| ValidationError::MissingReference {
                id: gate.clone(),
                context: "openings".to_string(),
            })?;
        non_negative(format!("openings.{gate}"), opening)?;
        if opening > def.max_opening_m {
            return Err(invalid(
                format!("openings.{gate}"),
                opening,
                "exceeds the gate's max opening",
            ));
        }
    }

    for (node, &target) in &doc.targets {
        match nodes.get(node.as_str()) {
            Some(def) if def.kind == NodeKindDef::Delivery => {}
            Some(_) => {
                return Err(invalid(
                    format!("targets.{node}"),
                    target,
                    "targets apply to delivery nodes only",
                ))
            }
            None => {
                return Err(ValidationError::MissingReference {
                    id: node.clone(),
                    context: "targets".to_string(),
                })
            }
        }
        non_negative(format!("targets.{node}"), target)?;
    }

    Ok(())
}

fn validate_node(node: &NodeDef) -> Result<(), ValidationError> {
    let field = |name: &str| format!("nodes.{}.{name}", node.id);
    if !node.bed_elevation_m.is_finite() {
        return Err(invalid(field("bed_elevation_m"), node.bed_elevation_m, "must be finite"));
    }
    positive(field("max_depth_m"), node.max_depth_m)?;
    non_negative(field("demand_m3s"), node.demand_m3s)?;
    if let Some(level) = node.level_m {
        let top = node.bed_elevation_m + node.max_depth_m;
        if !(level.is_finite() && level >= node.bed_elevation_m && level <= top) {
            return Err(invalid(field("level_m"), level, "must lie between bed and bed + max depth"));
        }
    }
    if let Some(area) = node.surface_area_m2 {
        positive(field("surface_area_m2"), area)?;
    }
    Ok(())
}

fn check_endpoints(
    upstream: &str,
    downstream: &str,
    context: &str,
    nodes: &HashMap<&str, &NodeDef>,
) -> Result<(), ValidationError> {
    for endpoint in [upstream, downstream] {
        if !nodes.contains_key(endpoint) {
            return Err(ValidationError::MissingReference {
                id: endpoint.to_string(),
                context: context.to_string(),
            });
        }
    }
    if upstream == downstream {
        return Err(invalid(context, upstream, "link connects a node to itself"));
    }
    Ok(())
}

fn validate_gate(gate: &GateDef, nodes: &HashMap<&str, &NodeDef>) -> Result<(), ValidationError> {
    let context = format!("gate '{}'", gate.id);
    check_endpoints(&gate.upstream, &gate.downstream, &context, nodes)?;

    let field = |name: &str| format!("gates.{}.{name}", gate.id);
    positive(field("width_m"), gate.width_m)?;
    positive(field("max_opening_m"), gate.max_opening_m)?;
    if let Some(sill) = gate.sill_elevation_m {
        if !sill.is_finite() {
            return Err(invalid(field("sill_elevation_m"), sill, "must be finite"));
        }
    }
    match gate.calibration {
        Some(CalibrationDef::Rated { k1, k2 }) => {
            positive(field("calibration.k1"), k1)?;
            non_negative(field("calibration.k2"), k2)?;
        }
        Some(CalibrationDef::Fixed { cd }) => positive(field("calibration.cd"), cd)?,
        None => {}
    }
    Ok(())
}

fn validate_canal(
    canal: &CanalDef,
    label: &str,
    nodes: &HashMap<&str, &NodeDef>,
) -> Result<(), ValidationError> {
    check_endpoints(&canal.upstream, &canal.downstream, &format!("canal '{label}'"), nodes)?;

    let field = |name: &str| format!("canals.{label}.{name}");
    positive(field("length_m"), canal.length_m)?;
    non_negative(field("bottom_width_m"), canal.bottom_width_m)?;
    non_negative(field("side_slope"), canal.side_slope)?;
    positive(field("roughness_n"), canal.roughness_n)?;
    positive(field("bed_slope"), canal.bed_slope)?;
    positive(field("max_depth_m"), canal.max_depth_m)?;
    if canal.bottom_width_m == 0.0 && canal.side_slope == 0.0 {
        return Err(invalid(field("bottom_width_m"), 0.0, "section has no flow area"));
    }
    Ok(())
}
