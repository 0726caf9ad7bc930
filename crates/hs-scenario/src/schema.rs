//! Scenario schema definitions.
//!
//! Every section except `version` and `name` is optional in the file and
//! falls back to its `Default`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioDef {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub sim: SimDef,
    #[serde(default)]
    pub pacing: PacingDef,
    #[serde(default)]
    pub vehicle: VehicleDef,
    /// Throttle commands, held from each point until the next.
    #[serde(default)]
    pub throttle_schedule: Vec<SchedulePoint>,
    #[serde(default)]
    pub devices: DevicesDef,
}

impl ScenarioDef {
    /// A valid scenario with every section at its default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: crate::LATEST_VERSION,
            name: name.into(),
            sim: SimDef::default(),
            pacing: PacingDef::default(),
            vehicle: VehicleDef::default(),
            throttle_schedule: Vec::new(),
            devices: DevicesDef::default(),
        }
    }

    /// Throttle command in effect at `t`: the last schedule point at or
    /// before `t`, or zero before the first point.
    pub fn throttle_at(&self, t: f64) -> f64 {
        hold_value(&self.throttle_schedule, t)
    }
}

/// Zero-order hold over time-ordered `points`; zero before the first.
pub fn hold_value(points: &[SchedulePoint], t: f64) -> f64 {
    points
        .iter()
        .take_while(|p| p.t <= t)
        .last()
        .map_or(0.0, |p| p.value)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimDef {
    #[serde(default)]
    pub t0: f64,
    #[serde(default = "default_t_end")]
    pub t_end: f64,
    #[serde(default = "default_sample_period")]
    pub sample_period: f64,
    #[serde(default)]
    pub integrator: IntegratorDef,
}

impl Default for SimDef {
    fn default() -> Self {
        Self {
            t0: 0.0,
            t_end: default_t_end(),
            sample_period: default_sample_period(),
            integrator: IntegratorDef::default(),
        }
    }
}

fn default_t_end() -> f64 {
    10.0
}

fn default_sample_period() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum IntegratorDef {
    ForwardEuler {
        dt: f64,
    },
    Rk4 {
        dt: f64,
    },
    DormandPrince45 {
        rtol: f64,
        atol: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        h_max: Option<f64>,
    },
}

impl Default for IntegratorDef {
    fn default() -> Self {
        Self::Rk4 { dt: 1e-3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacingDef {
    #[serde(default)]
    pub realtime: bool,
    #[serde(default = "default_rate")]
    pub rate: f64,
}

impl Default for PacingDef {
    fn default() -> Self {
        Self {
            realtime: false,
            rate: default_rate(),
        }
    }
}

fn default_rate() -> f64 {
    1.0
}

/// Vertical-hop vehicle: engine spool driving a point mass, with a
/// throttle actuator lag and attitude kinematics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VehicleDef {
    /// kg
    pub mass: f64,
    /// Cd·A (m²)
    pub drag_area: f64,
    pub restitution: f64,
    /// m
    pub initial_altitude: f64,
    /// Throttle actuator time constant (s)
    pub throttle_tau: f64,
    pub spool: SpoolDef,
    /// Constant body rates [p, q, r] (rad/s)
    pub body_rates: [f64; 3],
}

impl Default for VehicleDef {
    fn default() -> Self {
        Self {
            mass: 10.0,
            drag_area: 0.5,
            restitution: 0.3,
            initial_altitude: 0.0,
            throttle_tau: 0.2,
            spool: SpoolDef::default(),
            body_rates: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpoolDef {
    /// kg·m²
    pub inertia: f64,
    /// N·m·s
    pub loss_coeff: f64,
    /// N·m
    pub max_torque: f64,
    /// N/(rad/s)²
    pub thrust_coeff: f64,
}

impl Default for SpoolDef {
    fn default() -> Self {
        Self {
            inertia: 0.05,
            loss_coeff: 0.1,
            max_torque: 50.0,
            thrust_coeff: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulePoint {
    pub t: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DevicesDef {
    /// Period of the throttle-schedule input device (s).
    pub input_period_s: f64,
    /// Period of the telemetry output device; no telemetry when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry_period_s: Option<f64>,
}

impl Default for DevicesDef {
    fn default() -> Self {
        Self {
            input_period_s: 0.01,
            telemetry_period_s: None,
        }
    }
}
