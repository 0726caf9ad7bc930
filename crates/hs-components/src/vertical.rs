//! Vertical point-mass flight with ground contact.

use hs_system::{Component, ComponentError, ComponentResult, Ports};

use crate::environment::Environment;
use crate::{require_non_negative, require_positive};

/// Body moving along the vertical axis under thrust, drag and gravity.
///
/// State: `[altitude (m), climb rate (m/s)]`. Touching the ground is a
/// discrete event: altitude is reset to zero and the climb rate reflected
/// with the coefficient of restitution. Rebounds slower than `rest_speed`
/// leave the body resting until net force lifts it off again.
#[derive(Clone, Debug)]
pub struct VerticalBody {
    /// Mass (kg)
    pub mass: f64,
    /// Drag coefficient times reference area (m²)
    pub drag_area: f64,
    /// Coefficient of restitution in [0, 1)
    pub restitution: f64,
    /// Rebound speed below which the body comes to rest (m/s)
    pub rest_speed: f64,
    pub initial_altitude: f64,
    pub initial_climb_rate: f64,
}

/// Ground-contact discrete state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroundContact {
    pub bounces: u32,
    pub resting: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VerticalOutput {
    pub altitude_m: f64,
    pub climb_rate_m_s: f64,
    pub density_kg_m3: f64,
    pub drag_n: f64,
}

impl VerticalBody {
    pub fn new(mass: f64, drag_area: f64, restitution: f64) -> ComponentResult<Self> {
        if !(0.0..1.0).contains(&restitution) {
            return Err(ComponentError::InvalidInput {
                what: format!("restitution must lie in [0, 1), got {restitution}"),
            });
        }
        Ok(Self {
            mass: require_positive(mass, "mass")?,
            drag_area: require_non_negative(drag_area, "drag area")?,
            restitution,
            rest_speed: 0.05,
            initial_altitude: 0.0,
            initial_climb_rate: 0.0,
        })
    }

    pub fn starting_at(mut self, altitude: f64, climb_rate: f64) -> Self {
        self.initial_altitude = altitude;
        self.initial_climb_rate = climb_rate;
        self
    }

    /// Aerodynamic drag (N), opposing the climb rate.
    pub fn drag(&self, density: f64, climb_rate: f64) -> f64 {
        -0.5 * density * self.drag_area * climb_rate * climb_rate.abs()
    }
}

impl Ports for VerticalBody {
    /// Thrust along +altitude (N).
    type Input = f64;
    type Output = VerticalOutput;
    type Discrete = GroundContact;
}

impl Component<Environment> for VerticalBody {
    fn state_len(&self) -> usize {
        2
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.initial_altitude, self.initial_climb_rate]
    }

    fn continuous_update(
        &self,
        x: &[f64],
        thrust: &f64,
        contact: &GroundContact,
        _t: f64,
        env: &Environment,
        xdot: &mut [f64],
    ) -> ComponentResult<VerticalOutput> {
        let (h, v) = (x[0], x[1]);
        let density = env.density(h);
        let drag = self.drag(density, v);
        let accel = (thrust + drag) / self.mass - env.gravity;

        if contact.resting && accel <= 0.0 {
            // ground reaction balances the net force
            xdot[0] = 0.0;
            xdot[1] = 0.0;
        } else {
            xdot[0] = v;
            xdot[1] = accel;
        }

        Ok(VerticalOutput {
            altitude_m: h,
            climb_rate_m_s: v,
            density_kg_m3: density,
            drag_n: drag,
        })
    }

    fn discrete_update(
        &self,
        x: &mut [f64],
        _thrust: &f64,
        contact: &mut GroundContact,
        _t: f64,
        _env: &Environment,
    ) -> ComponentResult<bool> {
        let (h, v) = (x[0], x[1]);
        if h < 0.0 || (h == 0.0 && v < 0.0) {
            let rebound = -self.restitution * v;
            x[0] = 0.0;
            if rebound < self.rest_speed {
                x[1] = 0.0;
                contact.resting = true;
            } else {
                x[1] = rebound;
                contact.bounces += 1;
            }
            return Ok(true);
        }
        if contact.resting && h > 0.0 {
            contact.resting = false;
        }
        Ok(false)
    }
}
