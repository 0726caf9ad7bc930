//! Time integrators behind a common stepping contract.
//!
//! Each integrator owns its time and state vector; between steps the model
//! may read them back or overwrite them. All of them cache the derivative at
//! the end of an accepted step and reuse it as the first stage of the next
//! one until the state is marked modified.

use std::mem;

use hs_core::time_eps;
use nalgebra::DVector;

use crate::error::{SimError, SimResult};

/// Right-hand side evaluated by an integrator.
pub trait OdeSystem {
    fn derivative(&mut self, t: f64, x: &[f64], xdot: &mut [f64]) -> SimResult<()>;
}

/// Result of one accepted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub t_start: f64,
    pub t_end: f64,
    /// Attempts rejected by error control before this step was accepted.
    pub rejected: usize,
    /// Right-hand side evaluations spent, including rejected attempts.
    pub evaluations: usize,
}

impl StepReport {
    pub fn h(&self) -> f64 {
        self.t_end - self.t_start
    }
}

/// Trait for time integrators.
pub trait Integrator: Send {
    fn name(&self) -> &'static str;

    /// Restart at `(t0, x0)`, discarding cached derivatives and step history.
    fn reinit(&mut self, t0: f64, x0: &[f64]);

    fn time(&self) -> f64;

    fn state(&self) -> &[f64];

    /// Replace the state vector at the current time and mark it modified.
    fn overwrite_state(&mut self, x: &[f64]) -> SimResult<()>;

    /// Drop any cached derivative; the right-hand side changed underneath.
    fn mark_modified(&mut self);

    /// Take one accepted step, landing on `t_limit` at the latest.
    fn step(&mut self, f: &mut dyn OdeSystem, t_limit: f64) -> SimResult<StepReport>;

    /// Dense output over the last accepted step.
    fn interpolate(&self, t: f64, out: &mut [f64]) -> SimResult<()>;
}

impl<I: Integrator + ?Sized> Integrator for Box<I> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn reinit(&mut self, t0: f64, x0: &[f64]) {
        (**self).reinit(t0, x0)
    }

    fn time(&self) -> f64 {
        (**self).time()
    }

    fn state(&self) -> &[f64] {
        (**self).state()
    }

    fn overwrite_state(&mut self, x: &[f64]) -> SimResult<()> {
        (**self).overwrite_state(x)
    }

    fn mark_modified(&mut self) {
        (**self).mark_modified()
    }

    fn step(&mut self, f: &mut dyn OdeSystem, t_limit: f64) -> SimResult<StepReport> {
        (**self).step(f, t_limit)
    }

    fn interpolate(&self, t: f64, out: &mut [f64]) -> SimResult<()> {
        (**self).interpolate(t, out)
    }
}

/// Endpoints of the last accepted step, for cubic Hermite interpolation.
#[derive(Debug, Clone)]
struct Window {
    t0: f64,
    t1: f64,
    x0: DVector<f64>,
    x1: DVector<f64>,
    f0: DVector<f64>,
    f1: DVector<f64>,
}

/// Current point plus cached derivative and last step window.
#[derive(Debug, Clone)]
struct Cursor {
    t: f64,
    x: DVector<f64>,
    fx: Option<DVector<f64>>,
    window: Option<Window>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            t: 0.0,
            x: DVector::zeros(0),
            fx: None,
            window: None,
        }
    }
}

impl Cursor {
    fn reinit(&mut self, t0: f64, x0: &[f64]) {
        self.t = t0;
        self.x = DVector::from_column_slice(x0);
        self.fx = None;
        self.window = None;
    }

    fn overwrite(&mut self, x: &[f64]) -> SimResult<()> {
        if x.len() != self.x.len() {
            return Err(SimError::LengthMismatch {
                expected: self.x.len(),
                actual: x.len(),
            });
        }
        self.x.copy_from_slice(x);
        self.fx = None;
        Ok(())
    }

    /// Derivative at the current point, evaluated only if not cached.
    fn start_derivative(
        &mut self,
        f: &mut dyn OdeSystem,
        evals: &mut usize,
    ) -> SimResult<DVector<f64>> {
        if let Some(fx) = self.fx.take() {
            return Ok(fx);
        }
        let mut out = DVector::zeros(self.x.len());
        eval(f, self.t, &self.x, &mut out)?;
        *evals += 1;
        Ok(out)
    }

    fn accept(&mut self, t1: f64, x1: DVector<f64>, f0: DVector<f64>, f1: DVector<f64>) {
        let x0 = mem::replace(&mut self.x, x1.clone());
        self.window = Some(Window {
            t0: self.t,
            t1,
            x0,
            x1,
            f0,
            f1: f1.clone(),
        });
        self.t = t1;
        self.fx = Some(f1);
    }

    fn interpolate(&self, t: f64, out: &mut [f64]) -> SimResult<()> {
        if out.len() != self.x.len() {
            return Err(SimError::LengthMismatch {
                expected: self.x.len(),
                actual: out.len(),
            });
        }
        if (t - self.t).abs() <= time_eps(self.t) {
            out.copy_from_slice(self.x.as_slice());
            return Ok(());
        }
        let Some(w) = &self.window else {
            return Err(SimError::InvalidArg {
                what: "no accepted step to interpolate over",
            });
        };
        let h = w.t1 - w.t0;
        if t < w.t0 - time_eps(w.t0) || t > w.t1 + time_eps(w.t1) {
            return Err(SimError::InvalidArg {
                what: "interpolation time outside the last accepted step",
            });
        }
        let s = (t - w.t0) / h;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        for (i, o) in out.iter_mut().enumerate() {
            *o = h00 * w.x0[i] + h10 * h * w.f0[i] + h01 * w.x1[i] + h11 * h * w.f1[i];
        }
        Ok(())
    }
}

fn eval(f: &mut dyn OdeSystem, t: f64, x: &DVector<f64>, out: &mut DVector<f64>) -> SimResult<()> {
    f.derivative(t, x.as_slice(), out.as_mut_slice())
}

/// Size the next step so that it never passes `t_limit` and never leaves a
/// sliver shorter than rounding noise before it.
fn clamp_step(t: f64, h: f64, t_limit: f64) -> SimResult<(f64, f64)> {
    let remaining = t_limit - t;
    if remaining <= time_eps(t) {
        return Err(SimError::InvalidArg {
            what: "step limit must lie ahead of the current time",
        });
    }
    if t_limit.is_finite() && (h >= remaining || remaining - h <= 1e-6 * h + time_eps(t_limit)) {
        Ok((remaining, t_limit))
    } else {
        Ok((h, t + h))
    }
}

fn positive_step(dt: f64) -> SimResult<f64> {
    if dt.is_finite() && dt > 0.0 {
        Ok(dt)
    } else {
        Err(SimError::InvalidArg {
            what: "step size must be positive and finite",
        })
    }
}

/// Forward Euler (explicit, 1st order, fast for testing).
#[derive(Debug, Clone)]
pub struct ForwardEuler {
    dt: f64,
    cursor: Cursor,
}

impl ForwardEuler {
    pub fn new(dt: f64) -> SimResult<Self> {
        Ok(Self {
            dt: positive_step(dt)?,
            cursor: Cursor::default(),
        })
    }
}

impl Integrator for ForwardEuler {
    fn name(&self) -> &'static str {
        "forward-euler"
    }

    fn reinit(&mut self, t0: f64, x0: &[f64]) {
        self.cursor.reinit(t0, x0);
    }

    fn time(&self) -> f64 {
        self.cursor.t
    }

    fn state(&self) -> &[f64] {
        self.cursor.x.as_slice()
    }

    fn overwrite_state(&mut self, x: &[f64]) -> SimResult<()> {
        self.cursor.overwrite(x)
    }

    fn mark_modified(&mut self) {
        self.cursor.fx = None;
    }

    fn step(&mut self, f: &mut dyn OdeSystem, t_limit: f64) -> SimResult<StepReport> {
        let t = self.cursor.t;
        let (h, t1) = clamp_step(t, self.dt, t_limit)?;
        let mut evaluations = 0;

        let k1 = self.cursor.start_derivative(f, &mut evaluations)?;
        let x1 = &self.cursor.x + &k1 * h;
        let mut f1 = DVector::zeros(x1.len());
        eval(f, t1, &x1, &mut f1)?;
        evaluations += 1;

        self.cursor.accept(t1, x1, k1, f1);
        Ok(StepReport {
            t_start: t,
            t_end: t1,
            rejected: 0,
            evaluations,
        })
    }

    fn interpolate(&self, t: f64, out: &mut [f64]) -> SimResult<()> {
        self.cursor.interpolate(t, out)
    }
}

/// Classical RK4 (Runge-Kutta 4th order) integrator.
#[derive(Debug, Clone)]
pub struct Rk4 {
    dt: f64,
    cursor: Cursor,
}

impl Rk4 {
    pub fn new(dt: f64) -> SimResult<Self> {
        Ok(Self {
            dt: positive_step(dt)?,
            cursor: Cursor::default(),
        })
    }
}

impl Integrator for Rk4 {
    fn name(&self) -> &'static str {
        "rk4"
    }

    fn reinit(&mut self, t0: f64, x0: &[f64]) {
        self.cursor.reinit(t0, x0);
    }

    fn time(&self) -> f64 {
        self.cursor.t
    }

    fn state(&self) -> &[f64] {
        self.cursor.x.as_slice()
    }

    fn overwrite_state(&mut self, x: &[f64]) -> SimResult<()> {
        self.cursor.overwrite(x)
    }

    fn mark_modified(&mut self) {
        self.cursor.fx = None;
    }

    fn step(&mut self, f: &mut dyn OdeSystem, t_limit: f64) -> SimResult<StepReport> {
        let t = self.cursor.t;
        let (h, t1) = clamp_step(t, self.dt, t_limit)?;
        let n = self.cursor.x.len();
        let mut evaluations = 0;
        let x = self.cursor.x.clone();

        let k1 = self.cursor.start_derivative(f, &mut evaluations)?;

        let mut k2 = DVector::zeros(n);
        eval(f, t + 0.5 * h, &(&x + &k1 * (0.5 * h)), &mut k2)?;

        let mut k3 = DVector::zeros(n);
        eval(f, t + 0.5 * h, &(&x + &k2 * (0.5 * h)), &mut k3)?;

        let mut k4 = DVector::zeros(n);
        eval(f, t1, &(&x + &k3 * h), &mut k4)?;

        // x_new = x + (h/6) * (k1 + 2*k2 + 2*k3 + k4)
        let x1 = &x + (&k1 + &k2 * 2.0 + &k3 * 2.0 + &k4) * (h / 6.0);

        let mut f1 = DVector::zeros(n);
        eval(f, t1, &x1, &mut f1)?;
        evaluations += 4;

        self.cursor.accept(t1, x1, k1, f1);
        Ok(StepReport {
            t_start: t,
            t_end: t1,
            rejected: 0,
            evaluations,
        })
    }

    fn interpolate(&self, t: f64, out: &mut [f64]) -> SimResult<()> {
        self.cursor.interpolate(t, out)
    }
}

/// Error-control settings for adaptive integration.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveConfig {
    pub rtol: f64,
    pub atol: f64,
    /// First trial step; estimated from the initial derivative when `None`.
    pub h_init: Option<f64>,
    pub h_min: f64,
    pub h_max: f64,
    /// Rejections tolerated within one step before giving up.
    pub max_rejections: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            h_init: None,
            h_min: 1e-12,
            h_max: f64::INFINITY,
            max_rejections: 50,
        }
    }
}

// Dormand-Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;
// 5th minus embedded 4th order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

/// Adaptive Dormand-Prince 4(5) with error-controlled step size.
///
/// Rejected attempts evaluate the right-hand side but never surface to the
/// caller: `step` returns only once an attempt passes error control.
#[derive(Debug, Clone)]
pub struct DormandPrince45 {
    config: AdaptiveConfig,
    cursor: Cursor,
    h_next: Option<f64>,
}

impl DormandPrince45 {
    pub fn new(config: AdaptiveConfig) -> SimResult<Self> {
        if !(config.rtol > 0.0 && config.atol > 0.0) {
            return Err(SimError::InvalidArg {
                what: "tolerances must be positive",
            });
        }
        if !(config.h_min > 0.0 && config.h_max >= config.h_min) {
            return Err(SimError::InvalidArg {
                what: "step bounds must satisfy 0 < h_min <= h_max",
            });
        }
        if let Some(h) = config.h_init {
            positive_step(h)?;
        }
        Ok(Self {
            h_next: config.h_init,
            config,
            cursor: Cursor::default(),
        })
    }

    fn scale(&self, a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
        a.zip_map(b, |ai, bi| {
            self.config.atol + self.config.rtol * ai.abs().max(bi.abs())
        })
    }

    /// Starting step from the size of the state and its derivative.
    fn initial_step(&self, f0: &DVector<f64>) -> f64 {
        let sc = self.scale(&self.cursor.x, &self.cursor.x);
        let d0 = rms(&self.cursor.x, &sc);
        let d1 = rms(f0, &sc);
        let h = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };
        h.clamp(self.config.h_min, self.config.h_max)
    }
}

fn rms(v: &DVector<f64>, sc: &DVector<f64>) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().zip(sc.iter()).map(|(a, s)| (a / s).powi(2)).sum();
    (sum / v.len() as f64).sqrt()
}

impl Integrator for DormandPrince45 {
    fn name(&self) -> &'static str {
        "dormand-prince-45"
    }

    fn reinit(&mut self, t0: f64, x0: &[f64]) {
        self.cursor.reinit(t0, x0);
        self.h_next = self.config.h_init;
    }

    fn time(&self) -> f64 {
        self.cursor.t
    }

    fn state(&self) -> &[f64] {
        self.cursor.x.as_slice()
    }

    fn overwrite_state(&mut self, x: &[f64]) -> SimResult<()> {
        self.cursor.overwrite(x)
    }

    fn mark_modified(&mut self) {
        self.cursor.fx = None;
    }

    fn step(&mut self, f: &mut dyn OdeSystem, t_limit: f64) -> SimResult<StepReport> {
        let t = self.cursor.t;
        let n = self.cursor.x.len();
        let x = self.cursor.x.clone();
        let mut evaluations = 0;
        let mut rejected = 0;

        let k1 = self.cursor.start_derivative(f, &mut evaluations)?;
        let mut proposed = match self.h_next {
            Some(h) => h,
            None => self.initial_step(&k1),
        };

        loop {
            let (h, t1) = clamp_step(t, proposed.min(self.config.h_max), t_limit)?;
            let clamped = h < proposed;

            let mut k2 = DVector::zeros(n);
            eval(f, t + C2 * h, &(&x + &k1 * (A21 * h)), &mut k2)?;
            let mut k3 = DVector::zeros(n);
            eval(f, t + C3 * h, &(&x + (&k1 * A31 + &k2 * A32) * h), &mut k3)?;
            let mut k4 = DVector::zeros(n);
            eval(
                f,
                t + C4 * h,
                &(&x + (&k1 * A41 + &k2 * A42 + &k3 * A43) * h),
                &mut k4,
            )?;
            let mut k5 = DVector::zeros(n);
            eval(
                f,
                t + C5 * h,
                &(&x + (&k1 * A51 + &k2 * A52 + &k3 * A53 + &k4 * A54) * h),
                &mut k5,
            )?;
            let mut k6 = DVector::zeros(n);
            eval(
                f,
                t1,
                &(&x + (&k1 * A61 + &k2 * A62 + &k3 * A63 + &k4 * A64 + &k5 * A65) * h),
                &mut k6,
            )?;
            let x1 = &x + (&k1 * B1 + &k3 * B3 + &k4 * B4 + &k5 * B5 + &k6 * B6) * h;
            let mut k7 = DVector::zeros(n);
            eval(f, t1, &x1, &mut k7)?;
            evaluations += 6;

            let err_vec = (&k1 * E1 + &k3 * E3 + &k4 * E4 + &k5 * E5 + &k6 * E6 + &k7 * E7) * h;
            let err = rms(&err_vec, &self.scale(&x, &x1));

            if err <= 1.0 {
                let grow = if err == 0.0 {
                    5.0
                } else {
                    (0.9 * err.powf(-0.2)).clamp(0.2, 5.0)
                };
                // A step shortened to land on the limit says nothing about
                // the step size the dynamics allow.
                let next = if clamped {
                    proposed.max(h * grow)
                } else {
                    h * grow
                };
                self.h_next = Some(next.clamp(self.config.h_min, self.config.h_max));
                self.cursor.accept(t1, x1, k1, k7);
                return Ok(StepReport {
                    t_start: t,
                    t_end: t1,
                    rejected,
                    evaluations,
                });
            }

            rejected += 1;
            let shrink = if err.is_finite() {
                (0.9 * err.powf(-0.2)).clamp(0.2, 1.0)
            } else {
                0.2
            };
            proposed = h * shrink;
            tracing::trace!(t, h, err, "step rejected");
            if proposed < self.config.h_min || rejected > self.config.max_rejections {
                return Err(SimError::StepSizeTooSmall { t, h: proposed });
            }
        }
    }

    fn interpolate(&self, t: f64, out: &mut [f64]) -> SimResult<()> {
        self.cursor.interpolate(t, out)
    }
}

/// Integrator selection for configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegratorKind {
    ForwardEuler { dt: f64 },
    Rk4 { dt: f64 },
    DormandPrince45(AdaptiveConfig),
}

impl Default for IntegratorKind {
    fn default() -> Self {
        IntegratorKind::Rk4 { dt: 1e-3 }
    }
}

impl IntegratorKind {
    pub fn build(&self) -> SimResult<Box<dyn Integrator>> {
        Ok(match self {
            IntegratorKind::ForwardEuler { dt } => Box::new(ForwardEuler::new(*dt)?),
            IntegratorKind::Rk4 { dt } => Box::new(Rk4::new(*dt)?),
            IntegratorKind::DormandPrince45(config) => {
                Box::new(DormandPrince45::new(config.clone())?)
            }
        })
    }
}
