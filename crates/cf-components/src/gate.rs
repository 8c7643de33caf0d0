//! Sluice gate discharge with calibrated orifice coefficients.

use crate::common::{check_finite, check_non_negative, check_positive, EPSILON_HEAD};
use crate::error::{ComponentError, ComponentResult};
use cf_core::units::constants::sqrt_2g;
use cf_core::units::{cms, m, Length, VolumeRate};

/// Textbook coefficient for an uncalibrated vertical sluice gate.
pub const DEFAULT_DISCHARGE_COEFFICIENT: f64 = 0.61;

/// Whether a gate is fitted for remote automatic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutomationClass {
    Automated,
    Manual,
}

/// Discharge coefficient source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Calibration {
    /// Field-fitted rating `K1 · (e / e_max)^K2`, expressed per √ΔH.
    Rated { k1: f64, k2: f64 },
    /// Fixed orifice coefficient applied to `√(2gΔH)`.
    Fixed { cd: f64 },
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration::Fixed {
            cd: DEFAULT_DISCHARGE_COEFFICIENT,
        }
    }
}

/// Static definition of a gate.
///
/// Immutable for a solving session; the current opening and control mode are
/// runtime state owned elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    id: String,
    pub automation: AutomationClass,
    /// Upstream node identifier
    pub upstream: String,
    /// Downstream node identifier
    pub downstream: String,
    pub width: Length,
    pub max_opening: Length,
    /// Gate sill; no flow while the upstream level is at or below it.
    pub sill_elevation: Length,
    pub calibration: Calibration,
    /// Can a field crew operate this gate safely when automation is lost?
    pub fallback_eligible: bool,
    /// Tag in the external control system, if any.
    pub control_tag: Option<String>,
    pub zone: Option<String>,
}

impl Gate {
    /// Create an automated, fallback-eligible gate with a fixed coefficient.
    pub fn new(
        id: impl Into<String>,
        upstream: impl Into<String>,
        downstream: impl Into<String>,
        width: Length,
        max_opening: Length,
    ) -> Self {
        Self {
            id: id.into(),
            automation: AutomationClass::Automated,
            upstream: upstream.into(),
            downstream: downstream.into(),
            width,
            max_opening,
            sill_elevation: m(f64::NEG_INFINITY),
            calibration: Calibration::default(),
            fallback_eligible: true,
            control_tag: None,
            zone: None,
        }
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_sill(mut self, sill_elevation: Length) -> Self {
        self.sill_elevation = sill_elevation;
        self
    }

    pub fn with_automation(mut self, automation: AutomationClass) -> Self {
        self.automation = automation;
        self
    }

    pub fn with_fallback(mut self, eligible: bool) -> Self {
        self.fallback_eligible = eligible;
        self
    }

    pub fn with_control_tag(mut self, tag: impl Into<String>) -> Self {
        self.control_tag = Some(tag.into());
        self
    }

    pub fn in_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_automated(&self) -> bool {
        self.automation == AutomationClass::Automated
    }

    /// Check geometry and calibration.
    pub fn validate(&self) -> ComponentResult<()> {
        let ctx = |e: ComponentError| match e {
            ComponentError::Configuration { what } => {
                ComponentError::config(format!("gate '{}': {what}", self.id))
            }
            other => other,
        };
        check_non_negative(self.width.value, "gate width").map_err(ctx)?;
        check_positive(self.max_opening.value, "gate max opening").map_err(ctx)?;
        if self.sill_elevation.value.is_nan() {
            return Err(ctx(ComponentError::config("sill elevation is NaN")));
        }
        match self.calibration {
            Calibration::Rated { k1, k2 } => {
                check_non_negative(k1, "calibration K1").map_err(ctx)?;
                check_finite(k2, "calibration K2").map_err(ctx)?;
            }
            Calibration::Fixed { cd } => {
                check_non_negative(cd, "discharge coefficient").map_err(ctx)?;
            }
        }
        Ok(())
    }

    /// Orifice coefficient `Cs` at the given opening (m).
    ///
    /// A rated K1 already absorbs √(2g), so it is divided back out here.
    pub fn effective_coefficient(&self, opening: f64) -> f64 {
        match self.calibration {
            Calibration::Rated { k1, k2 } => {
                let ratio = (opening / self.max_opening.value).clamp(0.0, 1.0);
                k1 * ratio.powf(k2) / sqrt_2g()
            }
            Calibration::Fixed { cd } => cd,
        }
    }

    /// Discharge through the gate.
    ///
    /// Zero (not an error) when the head difference or opening is not positive,
    /// or when the upstream level does not reach the sill.
    pub fn discharge(
        &self,
        upstream_level: Length,
        downstream_level: Length,
        opening: Length,
    ) -> ComponentResult<VolumeRate> {
        self.validate()?;
        let q = self.flow(upstream_level.value, downstream_level.value, opening.value)?;
        Ok(cms(q))
    }

    /// Raw discharge in m³/s for already-validated gates.
    ///
    /// The solver validates the catalog once and then calls this per iteration.
    pub fn flow(
        &self,
        upstream_level: f64,
        downstream_level: f64,
        opening: f64,
    ) -> ComponentResult<f64> {
        check_finite(upstream_level, "upstream level")?;
        check_finite(downstream_level, "downstream level")?;
        check_finite(opening, "gate opening")?;

        let dh = upstream_level - downstream_level;
        if dh <= EPSILON_HEAD || opening <= 0.0 || upstream_level <= self.sill_elevation.value {
            return Ok(0.0);
        }

        let e = opening.min(self.max_opening.value);
        let cs = self.effective_coefficient(e);
        Ok(cs * self.width.value * e * sqrt_2g() * dh.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rated_gate() -> Gate {
        Gate::new("G1", "up", "down", m(3.5), m(2.0))
            .with_calibration(Calibration::Rated { k1: 0.85, k2: 0.0 })
    }

    #[test]
    fn rated_gate_reference_discharge() {
        let q = rated_gate().discharge(m(10.0), m(3.0), m(2.0)).unwrap();
        let expected = 0.85 * 3.5 * 2.0 * 7.0_f64.sqrt();
        assert!((q.value - expected).abs() < 1e-9, "q = {}", q.value);
        assert!((q.value - 15.7422).abs() < 1e-3);
    }

    #[test]
    fn zero_head_zero_flow() {
        let gate = rated_gate();
        assert_eq!(gate.discharge(m(5.0), m(5.0), m(1.0)).unwrap().value, 0.0);
        assert_eq!(gate.discharge(m(4.0), m(5.0), m(1.0)).unwrap().value, 0.0);
    }

    #[test]
    fn closed_gate_zero_flow() {
        let gate = rated_gate();
        assert_eq!(gate.discharge(m(9.0), m(1.0), m(0.0)).unwrap().value, 0.0);
        assert_eq!(gate.discharge(m(9.0), m(1.0), m(-0.2)).unwrap().value, 0.0);
    }

    #[test]
    fn dry_sill_zero_flow() {
        let gate = rated_gate().with_sill(m(6.0));
        assert_eq!(gate.discharge(m(5.5), m(1.0), m(1.0)).unwrap().value, 0.0);
        assert!(gate.discharge(m(6.5), m(1.0), m(1.0)).unwrap().value > 0.0);
    }

    #[test]
    fn fixed_coefficient_uses_two_g() {
        let gate = Gate::new("G2", "up", "down", m(1.0), m(1.0))
            .with_calibration(Calibration::Fixed { cd: 0.6 });
        let q = gate.flow(2.0, 0.0, 0.5).unwrap();
        let expected = 0.6 * 1.0 * 0.5 * (2.0 * 9.81 * 2.0_f64).sqrt();
        assert!((q - expected).abs() < 1e-12);
    }

    #[test]
    fn rating_exponent_scales_with_opening_ratio() {
        let gate = Gate::new("G3", "up", "down", m(2.0), m(2.0))
            .with_calibration(Calibration::Rated { k1: 0.8, k2: 0.5 });
        let full = gate.effective_coefficient(2.0);
        let half = gate.effective_coefficient(1.0);
        assert!((half / full - 0.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn opening_clamped_to_max() {
        let gate = rated_gate();
        let at_max = gate.flow(10.0, 3.0, 2.0).unwrap();
        let beyond = gate.flow(10.0, 3.0, 5.0).unwrap();
        assert_eq!(at_max, beyond);
    }

    #[test]
    fn negative_width_is_configuration_error() {
        let gate = Gate::new("bad", "up", "down", m(-1.0), m(2.0));
        let err = gate.discharge(m(10.0), m(3.0), m(1.0)).unwrap_err();
        assert!(matches!(err, ComponentError::Configuration { .. }));
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn non_finite_level_is_configuration_error() {
        let gate = rated_gate();
        assert!(matches!(
            gate.flow(f64::NAN, 3.0, 1.0),
            Err(ComponentError::Configuration { .. })
        ));
    }
}
