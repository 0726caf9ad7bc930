use crate::{CoreError, CoreResult};

/// Check every element of a slice, reporting the first offender.
pub fn ensure_all_finite(values: &[f64], what: &'static str) -> CoreResult<()> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(&value) => Err(CoreError::NonFinite { what, value }),
        None => Ok(()),
    }
}

/// Tolerance used when comparing two instants on the simulated time axis.
pub fn time_eps(t: f64) -> f64 {
    1e-12 * t.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_all_finite_reports_first_bad_value() {
        assert!(ensure_all_finite(&[0.0, 1.0, -2.0], "xdot").is_ok());
        let err = ensure_all_finite(&[0.0, f64::INFINITY, f64::NAN], "xdot").unwrap_err();
        let CoreError::NonFinite { what, value } = err;
        assert_eq!(what, "xdot");
        assert!(value.is_infinite());
        assert!(format!("{err}").contains("Non-finite"));
    }

    #[test]
    fn time_eps_scales_with_magnitude() {
        assert_eq!(time_eps(0.0), 1e-12);
        assert!((time_eps(1e6) - 1e-6).abs() < 1e-18);
    }
}
