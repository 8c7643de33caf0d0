//! Lowering a validated document into runtime structures.

use cf_components::{
    AutomationClass, Calibration, CanalGeometryStore, CanalSection, Gate, GateCatalog,
};
use cf_core::units::m;
use cf_core::NodeId;
use cf_graph::{Graph, GraphBuilder, LinkKind, NodeSpec};
use cf_solver::OperatingMode;

use crate::schema::{AutomationDef, CalibrationDef, GateDef, NodeDef, NodeKindDef, TopologyDoc};
use crate::ProjectResult;

/// Graph plus the static registries it was built from.
#[derive(Debug, Clone)]
pub struct CompiledNetwork {
    pub graph: Graph,
    pub catalog: GateCatalog,
    pub geometry: CanalGeometryStore,
}

fn node_spec(def: &NodeDef) -> NodeSpec {
    let mut spec = match def.kind {
        NodeKindDef::Source => NodeSpec::source(def.bed_elevation_m, def.max_depth_m),
        NodeKindDef::Junction => NodeSpec::junction(def.bed_elevation_m, def.max_depth_m),
        NodeKindDef::Delivery => {
            NodeSpec::delivery(def.bed_elevation_m, def.max_depth_m, def.demand_m3s)
        }
    };
    if let Some(level) = def.level_m {
        spec = spec.with_level(level);
    }
    if let Some(area) = def.surface_area_m2 {
        spec = spec.with_surface_area(area);
    }
    spec
}

fn gate(def: &GateDef) -> Gate {
    let mut gate = Gate::new(
        def.id.clone(),
        def.upstream.clone(),
        def.downstream.clone(),
        m(def.width_m),
        m(def.max_opening_m),
    )
    .with_automation(match def.automation {
        AutomationDef::Automated => AutomationClass::Automated,
        AutomationDef::Manual => AutomationClass::Manual,
    })
    .with_fallback(def.fallback_eligible);

    if let Some(calibration) = def.calibration {
        gate = gate.with_calibration(match calibration {
            CalibrationDef::Rated { k1, k2 } => Calibration::Rated { k1, k2 },
            CalibrationDef::Fixed { cd } => Calibration::Fixed { cd },
        });
    }
    if let Some(sill) = def.sill_elevation_m {
        gate = gate.with_sill(m(sill));
    }
    if let Some(tag) = &def.control_tag {
        gate = gate.with_control_tag(tag.clone());
    }
    if let Some(zone) = &def.zone {
        gate = gate.in_zone(zone.clone());
    }
    gate
}

/// Build the graph, gate catalog and canal geometry for `doc`.
///
/// Gate links are named by gate id, canal links by `upstream->downstream`.
/// The document is assumed to have passed [`crate::validate_document`];
/// anything it misses surfaces as a graph or component error here.
pub fn compile(doc: &TopologyDoc) -> ProjectResult<CompiledNetwork> {
    let mut builder = GraphBuilder::new();
    for node in &doc.nodes {
        builder.add_node(node.id.clone(), node_spec(node));
    }

    let gates: Vec<Gate> = doc.gates.iter().map(gate).collect();
    let sections: Vec<CanalSection> = doc
        .canals
        .iter()
        .map(|c| CanalSection {
            upstream: c.upstream.clone(),
            downstream: c.downstream.clone(),
            length: m(c.length_m),
            bottom_width: m(c.bottom_width_m),
            side_slope: c.side_slope,
            roughness: c.roughness_n,
            bed_slope: c.bed_slope,
            max_depth: m(c.max_depth_m),
        })
        .collect();

    for gate in &gates {
        let (up, down) = endpoints(&builder, &gate.upstream, &gate.downstream)?;
        builder.add_link(gate.id(), LinkKind::Gate, up, down);
    }
    for section in &sections {
        let (up, down) = endpoints(&builder, &section.upstream, &section.downstream)?;
        builder.add_link(section.label(), LinkKind::Canal, up, down);
    }

    Ok(CompiledNetwork {
        graph: builder.build()?,
        catalog: GateCatalog::new(gates)?,
        geometry: CanalGeometryStore::new(sections)?,
    })
}

fn endpoints(
    builder: &GraphBuilder,
    upstream: &str,
    downstream: &str,
) -> ProjectResult<(NodeId, NodeId)> {
    let lookup = |name: &str| {
        builder
            .node_id(name)
            .ok_or_else(|| crate::ValidationError::MissingReference {
                id: name.to_string(),
                context: format!("link {upstream}->{downstream}"),
            })
    };
    Ok((lookup(upstream)?, lookup(downstream)?))
}

/// Operating mode the document asks for: delivery targets when any are
/// given, otherwise fixed openings.
pub fn operating_mode(doc: &TopologyDoc) -> OperatingMode {
    let openings = doc
        .openings
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect();
    if doc.targets.is_empty() {
        OperatingMode::FixedOpenings(openings)
    } else {
        OperatingMode::TargetDeliveries {
            targets: doc.targets.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            initial_openings: openings,
        }
    }
}
