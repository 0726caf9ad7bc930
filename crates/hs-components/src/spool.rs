//! Engine spool dynamics.

use hs_system::{Component, ComponentError, ComponentResult, Ports};

use crate::{require_non_negative, require_positive};

/// Rotating spool driven by a throttle-scheduled torque.
///
/// ```text
/// I * dω/dt = τ_max * throttle - c * ω
/// thrust    = k * ω²
/// ```
///
/// Throttle is clamped to [0, 1]. Speed cannot go negative; the discrete
/// update pins it at zero if integration overshoots.
#[derive(Clone, Debug)]
pub struct EngineSpool {
    /// Moment of inertia (kg·m²)
    pub inertia: f64,
    /// Viscous friction coefficient (N·m·s/rad)
    pub loss_coeff: f64,
    /// Drive torque at full throttle (N·m)
    pub max_torque: f64,
    /// Thrust per ω² (N·s²/rad²)
    pub thrust_coeff: f64,
    /// Initial angular velocity (rad/s)
    pub initial_omega: f64,
}

/// Spool output record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpoolOutput {
    pub omega_rad_s: f64,
    pub thrust_n: f64,
}

impl EngineSpool {
    pub fn new(
        inertia: f64,
        loss_coeff: f64,
        max_torque: f64,
        thrust_coeff: f64,
    ) -> ComponentResult<Self> {
        Ok(Self {
            inertia: require_positive(inertia, "spool inertia")?,
            loss_coeff: require_non_negative(loss_coeff, "loss coefficient")?,
            max_torque: require_non_negative(max_torque, "max torque")?,
            thrust_coeff: require_non_negative(thrust_coeff, "thrust coefficient")?,
            initial_omega: 0.0,
        })
    }

    pub fn with_initial_omega(mut self, omega: f64) -> Self {
        self.initial_omega = omega.max(0.0);
        self
    }

    /// Friction torque (always opposes motion).
    pub fn friction_torque(&self, omega: f64) -> f64 {
        -self.loss_coeff * omega
    }

    /// Angular acceleration dω/dt (rad/s²) at speed `omega` and `throttle`.
    pub fn angular_acceleration(&self, omega: f64, throttle: f64) -> f64 {
        let drive = self.max_torque * throttle.clamp(0.0, 1.0);
        (drive + self.friction_torque(omega)) / self.inertia
    }

    /// Speed at which drive and friction balance, or `None` without friction.
    pub fn steady_omega(&self, throttle: f64) -> Option<f64> {
        (self.loss_coeff > 0.0)
            .then(|| self.max_torque * throttle.clamp(0.0, 1.0) / self.loss_coeff)
    }

    pub fn thrust(&self, omega: f64) -> f64 {
        self.thrust_coeff * omega * omega
    }
}

impl Ports for EngineSpool {
    /// Throttle setting in [0, 1].
    type Input = f64;
    type Output = SpoolOutput;
    type Discrete = ();
}

impl<C> Component<C> for EngineSpool {
    fn state_len(&self) -> usize {
        1
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.initial_omega]
    }

    fn continuous_update(
        &self,
        x: &[f64],
        throttle: &f64,
        _d: &(),
        _t: f64,
        _ctx: &C,
        xdot: &mut [f64],
    ) -> ComponentResult<SpoolOutput> {
        if !throttle.is_finite() {
            return Err(ComponentError::InvalidInput {
                what: format!("throttle is not finite ({throttle})"),
            });
        }
        let omega = x[0];
        xdot[0] = self.angular_acceleration(omega, *throttle);
        Ok(SpoolOutput {
            omega_rad_s: omega,
            thrust_n: self.thrust(omega.max(0.0)),
        })
    }

    fn discrete_update(
        &self,
        x: &mut [f64],
        _u: &f64,
        _d: &mut (),
        _t: f64,
        _ctx: &C,
    ) -> ComponentResult<bool> {
        if x[0] < 0.0 {
            x[0] = 0.0;
            return Ok(true);
        }
        Ok(false)
    }
}
