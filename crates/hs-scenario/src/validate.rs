//! Scenario validation logic.

use crate::schema::{IntegratorDef, ScenarioDef, SpoolDef, VehicleDef};

pub const LATEST_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid schedule point {index}: {reason}")]
    Schedule { index: usize, reason: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_scenario(scenario: &ScenarioDef) -> Result<(), ValidationError> {
    if scenario.version == 0 || scenario.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: scenario.version,
        });
    }
    if scenario.name.trim().is_empty() {
        return Err(invalid("name", "\"\"", "must not be empty"));
    }

    let sim = &scenario.sim;
    finite("sim.t0", sim.t0)?;
    finite("sim.t_end", sim.t_end)?;
    if sim.t_end <= sim.t0 {
        return Err(invalid("sim.t_end", sim.t_end, "must be after sim.t0"));
    }
    positive("sim.sample_period", sim.sample_period)?;
    validate_integrator(&sim.integrator)?;

    positive("pacing.rate", scenario.pacing.rate)?;
    validate_vehicle(&scenario.vehicle)?;

    let mut previous: Option<f64> = None;
    for (index, point) in scenario.throttle_schedule.iter().enumerate() {
        if !point.t.is_finite() {
            return Err(ValidationError::Schedule {
                index,
                reason: format!("time {} is not finite", point.t),
            });
        }
        if previous.is_some_and(|t| point.t <= t) {
            return Err(ValidationError::Schedule {
                index,
                reason: "times must be strictly increasing".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&point.value) {
            return Err(ValidationError::Schedule {
                index,
                reason: format!("throttle {} outside [0, 1]", point.value),
            });
        }
        previous = Some(point.t);
    }

    positive("devices.input_period_s", scenario.devices.input_period_s)?;
    if let Some(period) = scenario.devices.telemetry_period_s {
        positive("devices.telemetry_period_s", period)?;
    }

    Ok(())
}

fn validate_integrator(integrator: &IntegratorDef) -> Result<(), ValidationError> {
    match integrator {
        IntegratorDef::ForwardEuler { dt } | IntegratorDef::Rk4 { dt } => {
            positive("sim.integrator.dt", *dt)
        }
        IntegratorDef::DormandPrince45 { rtol, atol, h_max } => {
            positive("sim.integrator.rtol", *rtol)?;
            positive("sim.integrator.atol", *atol)?;
            if let Some(h) = h_max {
                positive("sim.integrator.h_max", *h)?;
            }
            Ok(())
        }
    }
}

fn validate_vehicle(vehicle: &VehicleDef) -> Result<(), ValidationError> {
    positive("vehicle.mass", vehicle.mass)?;
    non_negative("vehicle.drag_area", vehicle.drag_area)?;
    if !(0.0..1.0).contains(&vehicle.restitution) {
        return Err(invalid(
            "vehicle.restitution",
            vehicle.restitution,
            "must lie in [0, 1)",
        ));
    }
    non_negative("vehicle.initial_altitude", vehicle.initial_altitude)?;
    positive("vehicle.throttle_tau", vehicle.throttle_tau)?;
    for (axis, rate) in ["p", "q", "r"].iter().zip(vehicle.body_rates) {
        finite(&format!("vehicle.body_rates.{axis}"), rate)?;
    }

    let SpoolDef {
        inertia,
        loss_coeff,
        max_torque,
        thrust_coeff,
    } = &vehicle.spool;
    positive("vehicle.spool.inertia", *inertia)?;
    positive("vehicle.spool.loss_coeff", *loss_coeff)?;
    positive("vehicle.spool.max_torque", *max_torque)?;
    non_negative("vehicle.spool.thrust_coeff", *thrust_coeff)?;
    Ok(())
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, value, "must be finite"))
    }
}

fn positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value, "must be positive"))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value, "must be non-negative"))
    }
}
