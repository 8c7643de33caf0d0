//! Topology document schema.

use std::collections::BTreeMap;

use cf_components::NormalDepthConfig;
use cf_controls::ModeMachineConfig;
use cf_solver::SolverConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A canal network: nodes, gates, canal sections and operating settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopologyDoc {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub gates: Vec<GateDef>,
    #[serde(default)]
    pub canals: Vec<CanalDef>,
    #[serde(default)]
    pub settings: SettingsDef,
    /// Gate id -> opening (m). Fixed openings, or starting openings when
    /// `targets` is set.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub openings: BTreeMap<String, f64>,
    /// Delivery node id -> target flow (m³/s).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKindDef {
    Source,
    Junction,
    Delivery,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDef {
    pub id: String,
    pub kind: NodeKindDef,
    pub bed_elevation_m: f64,
    pub max_depth_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_m: Option<f64>,
    #[serde(default)]
    pub demand_m3s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_area_m2: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutomationDef {
    #[default]
    Automated,
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalibrationDef {
    Rated {
        k1: f64,
        #[serde(default)]
        k2: f64,
    },
    Fixed {
        cd: f64,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateDef {
    pub id: String,
    pub upstream: String,
    pub downstream: String,
    pub width_m: f64,
    pub max_opening_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sill_elevation_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationDef>,
    #[serde(default)]
    pub automation: AutomationDef,
    #[serde(default = "default_true")]
    pub fallback_eligible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanalDef {
    pub upstream: String,
    pub downstream: String,
    pub length_m: f64,
    pub bottom_width_m: f64,
    /// Horizontal run per unit rise of each bank.
    pub side_slope: f64,
    /// Manning's n.
    pub roughness_n: f64,
    pub bed_slope: f64,
    pub max_depth_m: f64,
}

/// Tunables; every field falls back to its default when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SettingsDef {
    pub solver: SolverConfig,
    pub normal_depth: NormalDepthConfig,
    pub control: ModeMachineConfig,
}

/// One communication-health check against a gate's control endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommEventDef {
    pub gate: String,
    pub success: bool,
    pub at: DateTime<Utc>,
}

/// A recorded or simulated communication-health feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CommFeedDoc {
    #[serde(default)]
    pub events: Vec<CommEventDef>,
}
