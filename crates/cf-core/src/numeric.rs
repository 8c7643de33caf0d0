//! Float guards shared by the hydraulic crates.

use crate::CfError;

pub fn ensure_finite(v: f64, what: &'static str) -> Result<f64, CfError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CfError::NonFinite { what, value: v })
    }
}

/// Finite and `>= 0`.
pub fn ensure_non_negative(v: f64, what: &'static str) -> Result<f64, CfError> {
    match ensure_finite(v, what)? {
        v if v < 0.0 => Err(CfError::InvalidArg { what }),
        v => Ok(v),
    }
}

/// Finite and `> 0`.
pub fn ensure_positive(v: f64, what: &'static str) -> Result<f64, CfError> {
    match ensure_finite(v, what)? {
        v if v <= 0.0 => Err(CfError::InvalidArg { what }),
        v => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn finite_non_negative_passes_through(v in 0.0_f64..1e9) {
            prop_assert_eq!(ensure_non_negative(v, "depth"), Ok(v));
        }
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(f64::NAN, "level").unwrap_err();
        assert!(format!("{err}").contains("Non-finite"));
        assert!(ensure_finite(f64::NEG_INFINITY, "level").is_err());
    }

    #[test]
    fn sign_guards() {
        assert!(ensure_non_negative(0.0, "width").is_ok());
        assert!(matches!(
            ensure_non_negative(-0.5, "width"),
            Err(CfError::InvalidArg { what: "width" })
        ));
        assert!(ensure_positive(0.0, "length").is_err());
        assert_eq!(ensure_positive(2.5, "length"), Ok(2.5));
    }
}
