//! Registries of gate definitions and canal geometry.
//!
//! Both are built once at bootstrap, validated on construction, and then
//! shared read-only by reference.

use std::collections::HashMap;

use crate::channel::CanalSection;
use crate::error::{ComponentError, ComponentResult};
use crate::gate::Gate;

/// Registry of gate definitions keyed by gate identifier.
///
/// Gates keep their insertion order; `position` gives a stable dense index
/// that runtime tables can use as an arena slot.
#[derive(Debug, Clone, Default)]
pub struct GateCatalog {
    gates: Vec<Gate>,
    index: HashMap<String, usize>,
}

impl GateCatalog {
    /// Validate every gate and reject duplicate identifiers.
    pub fn new(gates: impl IntoIterator<Item = Gate>) -> ComponentResult<Self> {
        let mut catalog = Self::default();
        for gate in gates {
            gate.validate()?;
            if catalog.index.contains_key(gate.id()) {
                return Err(ComponentError::config(format!(
                    "duplicate gate id '{}'",
                    gate.id()
                )));
            }
            catalog.index.insert(gate.id().to_string(), catalog.gates.len());
            catalog.gates.push(gate);
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Gate> {
        self.index.get(id).map(|&i| &self.gates[i])
    }

    /// Like `get`, but an unknown id is an error.
    pub fn require(&self, id: &str) -> ComponentResult<&Gate> {
        self.get(id).ok_or_else(|| ComponentError::Unknown {
            what: "gate",
            id: id.to_string(),
        })
    }

    /// Dense index of a gate.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gate> {
        self.gates.iter()
    }

    pub fn automated(&self) -> impl Iterator<Item = &Gate> {
        self.gates.iter().filter(|g| g.is_automated())
    }

    pub fn fallback_eligible(&self, id: &str) -> Option<bool> {
        self.get(id).map(|g| g.fallback_eligible)
    }

    /// Gates belonging to an operational zone.
    pub fn zone<'a>(&'a self, zone: &'a str) -> impl Iterator<Item = &'a Gate> + 'a {
        self.gates
            .iter()
            .filter(move |g| g.zone.as_deref() == Some(zone))
    }
}

/// Registry of canal sections keyed by (upstream, downstream) node pair.
#[derive(Debug, Clone, Default)]
pub struct CanalGeometryStore {
    sections: Vec<CanalSection>,
    index: HashMap<(String, String), usize>,
}

impl CanalGeometryStore {
    pub fn new(sections: impl IntoIterator<Item = CanalSection>) -> ComponentResult<Self> {
        let mut store = Self::default();
        for section in sections {
            section.validate()?;
            let key = (section.upstream.clone(), section.downstream.clone());
            if store.index.contains_key(&key) {
                return Err(ComponentError::config(format!(
                    "duplicate canal section '{}'",
                    section.label()
                )));
            }
            store.index.insert(key, store.sections.len());
            store.sections.push(section);
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, upstream: &str, downstream: &str) -> Option<&CanalSection> {
        self.index
            .get(&(upstream.to_string(), downstream.to_string()))
            .map(|&i| &self.sections[i])
    }

    pub fn require(&self, upstream: &str, downstream: &str) -> ComponentResult<&CanalSection> {
        self.get(upstream, downstream)
            .ok_or_else(|| ComponentError::Unknown {
                what: "canal section",
                id: format!("{upstream}->{downstream}"),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanalSection> {
        self.sections.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::AutomationClass;
    use cf_core::units::m;

    fn gate(id: &str) -> Gate {
        Gate::new(id, "a", "b", m(2.0), m(1.5))
    }

    fn section(up: &str, down: &str) -> CanalSection {
        CanalSection {
            upstream: up.into(),
            downstream: down.into(),
            length: m(500.0),
            bottom_width: m(4.0),
            side_slope: 1.0,
            roughness: 0.03,
            bed_slope: 0.0002,
            max_depth: m(2.0),
        }
    }

    #[test]
    fn catalog_lookup_and_positions() {
        let catalog = GateCatalog::new([
            gate("G1"),
            gate("G2")
                .with_automation(AutomationClass::Manual)
                .with_fallback(false)
                .in_zone("north"),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.position("G2"), Some(1));
        assert_eq!(catalog.fallback_eligible("G1"), Some(true));
        assert_eq!(catalog.fallback_eligible("G2"), Some(false));
        assert_eq!(catalog.automated().count(), 1);
        assert_eq!(catalog.zone("north").count(), 1);
        assert!(catalog.require("nope").is_err());
    }

    #[test]
    fn catalog_rejects_duplicates() {
        assert!(matches!(
            GateCatalog::new([gate("G1"), gate("G1")]),
            Err(ComponentError::Configuration { .. })
        ));
    }

    #[test]
    fn catalog_rejects_invalid_gate() {
        let bad = Gate::new("G", "a", "b", m(2.0), m(0.0));
        assert!(GateCatalog::new([bad]).is_err());
    }

    #[test]
    fn geometry_store_keyed_by_node_pair() {
        let store = CanalGeometryStore::new([section("a", "b"), section("b", "c")]).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.get("a", "b").is_some());
        assert!(store.get("b", "a").is_none());
        assert!(matches!(
            store.require("x", "y"),
            Err(ComponentError::Unknown { .. })
        ));
    }

    #[test]
    fn geometry_store_rejects_duplicate_pair() {
        assert!(CanalGeometryStore::new([section("a", "b"), section("a", "b")]).is_err());
    }
}
