//! First-order lag with rate limiting and saturation.

use hs_system::{Component, ComponentError, ComponentResult, Ports};

use crate::require_positive;

/// First-order lag.
///
/// Dynamics: dx/dt = (u - x) / tau, clamped to [-rate_limit, rate_limit].
/// With `bounds` set, the state is saturated after every accepted step.
#[derive(Clone, Debug)]
pub struct FirstOrderLag {
    /// Time constant (seconds)
    pub tau: f64,
    /// Rate limit (units/second), unlimited when `None`
    pub rate_limit: Option<f64>,
    /// Saturation bounds applied after each step
    pub bounds: Option<(f64, f64)>,
    pub initial: f64,
}

impl FirstOrderLag {
    pub fn new(tau: f64) -> ComponentResult<Self> {
        Ok(Self {
            tau: require_positive(tau, "tau")?,
            rate_limit: None,
            bounds: None,
            initial: 0.0,
        })
    }

    pub fn with_rate_limit(mut self, rate_limit: f64) -> ComponentResult<Self> {
        self.rate_limit = Some(require_positive(rate_limit, "rate_limit")?);
        Ok(self)
    }

    pub fn with_bounds(mut self, lo: f64, hi: f64) -> ComponentResult<Self> {
        if !(lo < hi) {
            return Err(ComponentError::InvalidInput {
                what: format!("bounds must satisfy lo < hi, got [{lo}, {hi}]"),
            });
        }
        self.bounds = Some((lo, hi));
        Ok(self)
    }

    pub fn with_initial(mut self, initial: f64) -> Self {
        self.initial = initial;
        self
    }

    /// Rate of change for state `x` under command `u`.
    pub fn rate(&self, x: f64, u: f64) -> f64 {
        let raw = (u - x) / self.tau;
        match self.rate_limit {
            Some(limit) => raw.clamp(-limit, limit),
            None => raw,
        }
    }
}

impl Ports for FirstOrderLag {
    type Input = f64;
    type Output = f64;
    type Discrete = ();
}

impl<C> Component<C> for FirstOrderLag {
    fn state_len(&self) -> usize {
        1
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.initial]
    }

    fn continuous_update(
        &self,
        x: &[f64],
        u: &f64,
        _d: &(),
        _t: f64,
        _ctx: &C,
        xdot: &mut [f64],
    ) -> ComponentResult<f64> {
        if !u.is_finite() {
            return Err(ComponentError::InvalidInput {
                what: format!("lag command is not finite ({u})"),
            });
        }
        xdot[0] = self.rate(x[0], *u);
        Ok(x[0])
    }

    fn post_step(
        &self,
        x: &mut [f64],
        _u: &f64,
        _d: &(),
        _t: f64,
        _ctx: &C,
    ) -> ComponentResult<bool> {
        let Some((lo, hi)) = self.bounds else {
            return Ok(false);
        };
        let clamped = x[0].clamp(lo, hi);
        if clamped != x[0] {
            x[0] = clamped;
            return Ok(true);
        }
        Ok(false)
    }
}
