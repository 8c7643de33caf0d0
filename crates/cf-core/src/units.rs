//! SI quantities used by the hydraulic crates (`uom`, f64 storage).

use uom::si::f64::{Length as UomLength, Velocity as UomVelocity, VolumeRate as UomVolumeRate};

pub type Length = UomLength;
pub type Velocity = UomVelocity;
pub type VolumeRate = UomVolumeRate;

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

/// Discharge in m³/s.
#[inline]
pub fn cms(v: f64) -> VolumeRate {
    use uom::si::volume_rate::cubic_meter_per_second;
    VolumeRate::new::<cubic_meter_per_second>(v)
}

#[inline]
pub fn mps(v: f64) -> Velocity {
    use uom::si::velocity::meter_per_second;
    Velocity::new::<meter_per_second>(v)
}

pub mod constants {
    /// Gravitational acceleration (m/s²) used by every hydraulic formula.
    pub const G_MPS2: f64 = 9.81;

    /// `√(2g)`, the velocity factor of orifice flow.
    #[inline]
    pub fn sqrt_2g() -> f64 {
        (2.0 * G_MPS2).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_store_si_values() {
        assert_eq!(m(2.0).value, 2.0);
        assert_eq!(cms(15.0).value, 15.0);
        assert_eq!(mps(0.5).value, 0.5);
    }

    #[test]
    fn discharge_over_length_is_area_per_time() {
        let q = cms(6.0);
        let per_m = q / m(3.0);
        assert!((per_m.value - 2.0).abs() < 1e-12);
        assert!((constants::sqrt_2g() - 4.429).abs() < 1e-3);
    }
}
