//! The step-then-wait pacing loop.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use hs_core::time_eps;
use hs_sim::{HybridModel, Integrator, SimError, SimResult};

use crate::clock::{Clock, SystemClock};
use crate::control::{Command, PacingControl};

/// Options for a paced run.
#[derive(Clone, Debug, PartialEq)]
pub struct PacingConfig {
    /// Simulated seconds per wall-clock second.
    pub rate: f64,
    /// Simulated end time; `f64::INFINITY` runs until cancelled.
    pub t_end: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            t_end: f64::INFINITY,
        }
    }
}

/// Summary of one paced run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PacingReport {
    pub steps: usize,
    /// Simulated seconds advanced, summed over accepted steps.
    pub sim_elapsed: f64,
    pub wall_elapsed: Duration,
    /// Steps whose computation finished after their wall-clock target.
    pub overruns: usize,
    pub max_lag: Duration,
    pub cancelled: bool,
}

impl PacingReport {
    /// Achieved simulated seconds per wall-clock second.
    pub fn effective_rate(&self) -> f64 {
        let wall = self.wall_elapsed.as_secs_f64();
        if wall > 0.0 {
            self.sim_elapsed / wall
        } else {
            f64::INFINITY
        }
    }
}

fn validate_rate(rate: f64) -> SimResult<f64> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(SimError::InvalidArg {
            what: "pacing rate must be positive and finite",
        })
    }
}

/// Drives a model so simulated time tracks wall-clock time.
///
/// After each accepted step of length `dt` the loop waits until
/// `wall_reference + dt / rate`, then moves the reference to that target.
/// A step that finishes late is counted as an overrun and the next step
/// starts immediately; nothing is skipped, so the achieved rate drops
/// instead.
pub struct RealtimeDriver<K: Clock = SystemClock> {
    config: PacingConfig,
    clock: K,
    control: PacingControl,
    commands: Receiver<Command>,
}

impl RealtimeDriver<SystemClock> {
    pub fn with_system_clock(config: PacingConfig) -> SimResult<Self> {
        Self::new(config, SystemClock)
    }
}

impl<K: Clock> RealtimeDriver<K> {
    pub fn new(config: PacingConfig, clock: K) -> SimResult<Self> {
        validate_rate(config.rate)?;
        if config.t_end.is_nan() {
            return Err(SimError::InvalidArg {
                what: "t_end must not be NaN",
            });
        }
        let (control, commands) = PacingControl::pair();
        Ok(Self {
            config,
            clock,
            control,
            commands,
        })
    }

    /// Handle for cancelling or steering the loop from another thread.
    pub fn control(&self) -> PacingControl {
        self.control.clone()
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// Run until `t_end` or cancellation.
    ///
    /// Component failures end the run with the model aborted. Cancellation
    /// leaves the model between steps, ready to continue or reinitialize.
    /// Pacing counters are added to the model's stats even when the run
    /// ends in an error.
    pub fn run<C, I>(&mut self, model: &mut HybridModel<C, I>) -> SimResult<PacingReport>
    where
        C: 'static,
        I: Integrator,
    {
        let start = self.clock.now();
        let mut report = PacingReport::default();

        tracing::info!(
            rate = self.config.rate,
            t_end = self.config.t_end,
            t = model.time(),
            "paced run started"
        );

        let outcome = self.pace(model, start, &mut report);

        report.wall_elapsed = self.clock.now().saturating_duration_since(start);
        let stats = model.stats_mut();
        stats.pacing_overruns += report.overruns as u64;
        stats.max_pacing_lag_s = stats.max_pacing_lag_s.max(report.max_lag.as_secs_f64());
        stats.wall_time_s += report.wall_elapsed.as_secs_f64();

        match &outcome {
            Ok(()) => tracing::info!(
                steps = report.steps,
                overruns = report.overruns,
                effective_rate = report.effective_rate(),
                cancelled = report.cancelled,
                "paced run finished"
            ),
            Err(err) => tracing::warn!(
                steps = report.steps,
                overruns = report.overruns,
                t = model.time(),
                %err,
                "paced run failed"
            ),
        }
        outcome.map(|()| report)
    }

    fn pace<C, I>(
        &mut self,
        model: &mut HybridModel<C, I>,
        start: Instant,
        report: &mut PacingReport,
    ) -> SimResult<()>
    where
        C: 'static,
        I: Integrator,
    {
        let t_end = self.config.t_end;
        let mut wall_ref = start;
        loop {
            if self.drain_commands(model, &mut wall_ref)? {
                report.cancelled = true;
                return Ok(());
            }
            if t_end.is_finite() && model.time() >= t_end - time_eps(t_end) {
                return Ok(());
            }

            let outcome = model.step(t_end)?;
            report.steps += 1;
            let dt = outcome.t_end - outcome.t_start;
            report.sim_elapsed += dt;

            let target = Duration::try_from_secs_f64(dt / self.config.rate)
                .ok()
                .and_then(|wait| wall_ref.checked_add(wait))
                .ok_or(SimError::InvalidArg {
                    what: "pacing interval exceeds the wall clock range",
                })?;
            let now = self.clock.now();
            if now > target {
                let lag = now - target;
                report.overruns += 1;
                report.max_lag = report.max_lag.max(lag);
                tracing::debug!(t = outcome.t_end, lag_s = lag.as_secs_f64(), "pacing overrun");
            } else {
                self.clock.sleep_until(target);
            }
            wall_ref = target;
        }
    }

    /// Apply pending commands. Returns `true` if cancellation was requested.
    fn drain_commands<C, I>(
        &mut self,
        model: &mut HybridModel<C, I>,
        wall_ref: &mut Instant,
    ) -> SimResult<bool>
    where
        C: 'static,
        I: Integrator,
    {
        let mut cancel = false;
        loop {
            let command = match self.commands.try_recv() {
                Ok(command) => command,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            };
            match command {
                Command::Cancel => cancel = true,
                Command::SetRate(rate) => match validate_rate(rate) {
                    Ok(rate) => {
                        tracing::debug!(rate, "pacing rate changed");
                        self.config.rate = rate;
                    }
                    Err(err) => tracing::warn!(rate, %err, "ignoring rate change"),
                },
                Command::Reinit(request) => match model.reinit(request) {
                    Ok(()) => *wall_ref = self.clock.now(),
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => tracing::warn!(%err, "ignoring reinit request"),
                },
            }
        }
        Ok(cancel)
    }
}
