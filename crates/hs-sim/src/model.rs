//! Hybrid model: one System driven by one integrator.
//!
//! The model implements no numerics of its own. It bridges the integrator's
//! derivative requests onto the System, runs the discrete update once per
//! accepted step, samples outputs on a fixed cadence and exchanges data with
//! attached devices.

use hs_core::{PerfStats, Timer, ensure_all_finite, time_eps};
use hs_io::IoRegistry;
use hs_system::System;

use crate::error::{SimError, SimResult};
use crate::history::TimeHistory;
use crate::integrator::{Integrator, OdeSystem};

/// Options for a hybrid model.
#[derive(Clone, Debug)]
pub struct ModelOptions {
    /// Output sampling period (seconds), independent of step size.
    pub sample_period: f64,
    /// Maximum accepted steps per `advance_to` call (safety limit).
    pub max_steps: usize,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            sample_period: 0.1,
            max_steps: 10_000_000,
        }
    }
}

/// Reinitialization request. `None` fields fall back to the values the
/// model was created with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reinit {
    pub t0: Option<f64>,
    pub x0: Option<Vec<f64>>,
}

impl Reinit {
    pub fn at(t0: f64) -> Self {
        Self {
            t0: Some(t0),
            x0: None,
        }
    }

    pub fn with_state(mut self, x0: Vec<f64>) -> Self {
        self.x0 = Some(x0);
        self
    }
}

/// What one accepted step did.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub t_start: f64,
    pub t_end: f64,
    /// Samples appended to the history during this step.
    pub samples: usize,
    /// Device input samples applied before the discrete update.
    pub inputs_applied: usize,
    /// Whether the discrete update or post-step correction changed state.
    pub modified: bool,
    pub rejected: usize,
}

/// Derivative bridge: integrator-level flat state in, component updates, flat
/// derivative out.
struct Bridge<'a, C: 'static> {
    system: &'a mut System<C>,
    ctx: &'a C,
    evals: u64,
}

impl<C: 'static> OdeSystem for Bridge<'_, C> {
    fn derivative(&mut self, t: f64, x: &[f64], xdot: &mut [f64]) -> SimResult<()> {
        self.system.load_state(x)?;
        self.system.set_time(t);
        self.system.continuous_update(self.ctx)?;
        xdot.copy_from_slice(self.system.derivative());
        self.evals += 1;
        Ok(())
    }
}

/// A System, an integrator, the shared context and the device registry.
pub struct HybridModel<C: 'static, I> {
    system: System<C>,
    integrator: I,
    ctx: C,
    io: IoRegistry<C>,
    history: TimeHistory,
    options: ModelOptions,
    t0: f64,
    x0: Vec<f64>,
    sample_origin: f64,
    next_sample: u64,
    scratch: Vec<f64>,
    stats: PerfStats,
    aborted: Option<String>,
}

impl<C: 'static, I: Integrator> HybridModel<C, I> {
    /// Wrap `system` starting from its current time and initial state.
    pub fn new(system: System<C>, integrator: I, ctx: C, options: ModelOptions) -> SimResult<Self> {
        if !(options.sample_period.is_finite() && options.sample_period > 0.0) {
            return Err(SimError::InvalidArg {
                what: "sample_period must be positive and finite",
            });
        }
        if options.max_steps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        let t0 = system.time();
        let x0 = system.initial_state().to_vec();
        let scratch = vec![0.0; system.len()];
        let mut model = Self {
            system,
            integrator,
            ctx,
            io: IoRegistry::new(),
            history: TimeHistory::default(),
            options,
            t0,
            x0: x0.clone(),
            sample_origin: t0,
            next_sample: 1,
            scratch,
            stats: PerfStats::default(),
            aborted: None,
        };
        model.restart(t0, x0)?;
        Ok(model)
    }

    /// Restart from `(t0, x0)`, falling back to the original initial
    /// condition, and truncate the history to the new initial sample.
    pub fn reinit(&mut self, request: Reinit) -> SimResult<()> {
        let t0 = request.t0.unwrap_or(self.t0);
        let x0 = request.x0.unwrap_or_else(|| self.x0.clone());
        if x0.len() != self.system.len() {
            return Err(SimError::LengthMismatch {
                expected: self.system.len(),
                actual: x0.len(),
            });
        }
        if !t0.is_finite() {
            return Err(SimError::InvalidArg {
                what: "t0 must be finite",
            });
        }
        ensure_all_finite(&x0, "initial state")?;
        self.stats.reset();
        self.restart(t0, x0)?;
        tracing::debug!(t0, "model reinitialized");
        Ok(())
    }

    fn restart(&mut self, t0: f64, x0: Vec<f64>) -> SimResult<()> {
        self.aborted = None;
        self.integrator.reinit(t0, &x0);
        self.system.reset_discrete();
        self.system.load_state(self.integrator.state())?;
        self.system.set_time(self.integrator.time());
        self.sample_origin = t0;
        self.next_sample = 1;
        let evaluated = self.system.continuous_update(&self.ctx);
        // The log restarts at (t0, x0) even when outputs fail to evaluate.
        let initial = self.system.snapshot();
        self.history.restart(initial.clone());
        evaluated.map_err(|err| self.abort(err.into()))?;
        self.io.publish(&initial);
        Ok(())
    }

    /// Take one accepted step toward `t_limit` and run its callbacks.
    pub fn step(&mut self, t_limit: f64) -> SimResult<StepOutcome> {
        if let Some(reason) = &self.aborted {
            return Err(SimError::Aborted {
                reason: reason.clone(),
            });
        }
        match self.step_inner(t_limit) {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_fatal() => Err(self.abort(err)),
            Err(err) => Err(err),
        }
    }

    fn abort(&mut self, err: SimError) -> SimError {
        tracing::error!(t = self.system.time(), error = %err, "model aborted");
        self.aborted = Some(err.to_string());
        err
    }

    fn step_inner(&mut self, t_limit: f64) -> SimResult<StepOutcome> {
        let timer = Timer::start();
        let mut bridge = Bridge {
            system: &mut self.system,
            ctx: &self.ctx,
            evals: 0,
        };
        let report = self.integrator.step(&mut bridge, t_limit);
        self.stats.derivative_evals += bridge.evals;
        if let Some(elapsed) = timer.stop() {
            self.stats.derivative_time_s += elapsed;
        }
        let report = report?;
        self.stats.accepted_steps += 1;
        self.stats.rejected_steps += report.rejected as u64;

        let t1 = report.t_end;
        let eps = time_eps(t1);
        let mut samples = 0;

        // Samples strictly inside the step see interpolated, pre-discrete state.
        while self.sample_time(self.next_sample) < t1 - eps {
            let ts = self.sample_time(self.next_sample);
            self.integrator.interpolate(ts, &mut self.scratch)?;
            self.system.load_state(&self.scratch)?;
            self.record_sample(ts)?;
            samples += 1;
        }

        // Discrete step on the accepted state.
        self.system.load_state(self.integrator.state())?;
        self.system.set_time(t1);
        let inputs_applied = self.io.poll_inputs(&mut self.system);
        let discrete = self.system.discrete_update(&self.ctx)?;
        let corrected = self.system.step_correction(&self.ctx)?;
        let modified = discrete || corrected;
        if modified {
            self.integrator.overwrite_state(self.system.state())?;
            self.stats.discrete_modifications += 1;
        } else if inputs_applied > 0 {
            self.integrator.mark_modified();
        }
        self.stats.inputs_applied += inputs_applied as u64;

        // A coincident sample sees the post-discrete state.
        if (self.sample_time(self.next_sample) - t1).abs() <= eps {
            self.record_sample(t1)?;
            samples += 1;
        }

        Ok(StepOutcome {
            t_start: report.t_start,
            t_end: t1,
            samples,
            inputs_applied,
            modified,
            rejected: report.rejected,
        })
    }

    fn sample_time(&self, k: u64) -> f64 {
        self.sample_origin + k as f64 * self.options.sample_period
    }

    /// Recompute outputs from the System's current state at `t` and log them.
    fn record_sample(&mut self, t: f64) -> SimResult<()> {
        self.system.set_time(t);
        self.system.continuous_update(&self.ctx)?;
        let snapshot = self.system.snapshot();
        self.io.publish(&snapshot);
        self.history.push(snapshot);
        self.next_sample += 1;
        self.stats.samples += 1;
        Ok(())
    }

    /// Step until `t_end` is reached. Returns the number of accepted steps.
    pub fn advance_to(&mut self, t_end: f64) -> SimResult<usize> {
        let t = self.time();
        if !t_end.is_finite() || t_end < t - time_eps(t) {
            return Err(SimError::InvalidArg {
                what: "target time must be finite and not in the past",
            });
        }
        let mut steps = 0;
        while self.time() < t_end - time_eps(t_end) {
            if steps == self.options.max_steps {
                return Err(SimError::StepLimit {
                    limit: self.options.max_steps,
                    target: t_end,
                });
            }
            self.step(t_end)?;
            steps += 1;
        }
        Ok(steps)
    }

    /// Step for `dt` seconds of simulated time.
    pub fn advance_by(&mut self, dt: f64) -> SimResult<usize> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(SimError::InvalidArg {
                what: "duration must be finite and non-negative",
            });
        }
        self.advance_to(self.time() + dt)
    }

    /// Simulated time, as held by the integrator.
    pub fn time(&self) -> f64 {
        self.integrator.time()
    }

    /// Authoritative state vector, as held by the integrator.
    pub fn state(&self) -> &[f64] {
        self.integrator.state()
    }

    pub fn initial_time(&self) -> f64 {
        self.t0
    }

    pub fn history(&self) -> &TimeHistory {
        &self.history
    }

    pub fn system(&self) -> &System<C> {
        &self.system
    }

    /// Mutable access to the System between steps, e.g. to set inputs.
    ///
    /// Continuous state is owned by the integrator; change it through
    /// [`HybridModel::reinit`] instead of writing the System's state.
    pub fn system_mut(&mut self) -> &mut System<C> {
        self.integrator.mark_modified();
        &mut self.system
    }

    pub fn integrator(&self) -> &I {
        &self.integrator
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    /// The derivative bridge sees changes from the next evaluation on.
    pub fn context_mut(&mut self) -> &mut C {
        self.integrator.mark_modified();
        &mut self.ctx
    }

    pub fn io_mut(&mut self) -> &mut IoRegistry<C> {
        &mut self.io
    }

    pub fn io(&self) -> &IoRegistry<C> {
        &self.io
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    pub fn stats(&self) -> &PerfStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut PerfStats {
        &mut self.stats
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Stop every attached device after a final flush.
    pub fn shutdown_io(&mut self) {
        self.io.stop_all();
        // Apply whatever the input devices read last.
        let applied = self.io.poll_inputs(&mut self.system);
        if applied > 0 {
            self.integrator.mark_modified();
        }
    }
}
