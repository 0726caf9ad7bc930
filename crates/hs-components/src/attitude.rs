//! Quaternion attitude kinematics.

use hs_system::{Component, ComponentError, ComponentResult, Ports};
use nalgebra::{Quaternion, UnitQuaternion};

const NORM_TOLERANCE: f64 = 1e-12;

/// Propagates a body attitude from body-frame angular rates.
///
/// State: the attitude quaternion `[w, i, j, k]`, integrated as
/// `q̇ = ½ q ⊗ (0, ω)`. Integration lets the norm drift, so every step is
/// followed by a projection back onto the unit sphere.
#[derive(Clone, Debug)]
pub struct AttitudeKinematics {
    pub initial: UnitQuaternion<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttitudeOutput {
    pub roll_rad: f64,
    pub pitch_rad: f64,
    pub yaw_rad: f64,
}

impl AttitudeKinematics {
    pub fn new(initial: UnitQuaternion<f64>) -> Self {
        Self { initial }
    }

    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    fn quaternion(x: &[f64]) -> ComponentResult<Quaternion<f64>> {
        let q = Quaternion::new(x[0], x[1], x[2], x[3]);
        if !(q.norm() > NORM_TOLERANCE) {
            return Err(ComponentError::non_physical(format!(
                "attitude quaternion has degenerate norm {}",
                q.norm()
            )));
        }
        Ok(q)
    }
}

impl Default for AttitudeKinematics {
    fn default() -> Self {
        Self::new(UnitQuaternion::identity())
    }
}

impl Ports for AttitudeKinematics {
    /// Body rates `[p, q, r]` (rad/s).
    type Input = [f64; 3];
    type Output = AttitudeOutput;
    type Discrete = ();
}

impl<C> Component<C> for AttitudeKinematics {
    fn state_len(&self) -> usize {
        4
    }

    fn initial_state(&self) -> Vec<f64> {
        let q = self.initial.quaternion();
        vec![q.w, q.i, q.j, q.k]
    }

    fn continuous_update(
        &self,
        x: &[f64],
        rates: &[f64; 3],
        _d: &(),
        _t: f64,
        _ctx: &C,
        xdot: &mut [f64],
    ) -> ComponentResult<AttitudeOutput> {
        let q = Self::quaternion(x)?;
        let omega = Quaternion::new(0.0, rates[0], rates[1], rates[2]);
        let qdot = (q * omega) * 0.5;
        xdot.copy_from_slice(&[qdot.w, qdot.i, qdot.j, qdot.k]);

        let (roll_rad, pitch_rad, yaw_rad) = UnitQuaternion::from_quaternion(q).euler_angles();
        Ok(AttitudeOutput {
            roll_rad,
            pitch_rad,
            yaw_rad,
        })
    }

    fn post_step(
        &self,
        x: &mut [f64],
        _rates: &[f64; 3],
        _d: &(),
        _t: f64,
        _ctx: &C,
    ) -> ComponentResult<bool> {
        let norm = Self::quaternion(x)?.norm();
        if (norm - 1.0).abs() <= NORM_TOLERANCE {
            return Ok(false);
        }
        x.iter_mut().for_each(|v| *v /= norm);
        Ok(true)
    }
}
