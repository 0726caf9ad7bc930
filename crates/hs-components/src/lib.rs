//! Example vehicle components for the hybrid simulation engine.
//!
//! Provides:
//! - [`Environment`], the shared context (gravity + ISA atmosphere)
//! - [`FirstOrderLag`], a rate-limited first-order lag with saturation
//! - [`EngineSpool`], a spool with inertia, friction and thrust ∝ ω²
//! - [`VerticalBody`], vertical flight with ground contact
//! - [`AttitudeKinematics`], quaternion attitude propagation

pub mod attitude;
pub mod environment;
pub mod lag;
pub mod spool;
pub mod vertical;

pub use attitude::{AttitudeKinematics, AttitudeOutput};
pub use environment::Environment;
pub use lag::FirstOrderLag;
pub use spool::{EngineSpool, SpoolOutput};
pub use vertical::{GroundContact, VerticalBody, VerticalOutput};

use hs_system::ComponentError;

pub(crate) fn require_positive(value: f64, what: &str) -> Result<f64, ComponentError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ComponentError::InvalidInput {
            what: format!("{what} must be positive, got {value}"),
        })
    }
}

pub(crate) fn require_non_negative(value: f64, what: &str) -> Result<f64, ComponentError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ComponentError::InvalidInput {
            what: format!("{what} cannot be negative, got {value}"),
        })
    }
}
