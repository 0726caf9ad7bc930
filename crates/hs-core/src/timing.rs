//! Lightweight wall-clock timing and run statistics.
//!
//! Fine-grained timers are off by default; enable them with
//! [`enable_timing`] or by setting the `HS_TIMING` environment variable.
//! Counters in [`PerfStats`] are always collected.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable fine-grained timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Check if fine-grained timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("HS_TIMING").is_ok()
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    start: Instant,
    enabled: bool,
}

impl Timer {
    /// Create and start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            enabled: is_enabled(),
        }
    }

    /// Stop the timer and return elapsed time in seconds.
    /// If timing is disabled, returns None.
    pub fn stop(self) -> Option<f64> {
        if self.enabled {
            Some(self.start.elapsed().as_secs_f64())
        } else {
            None
        }
    }
}

/// Counters collected over one run of a hybrid model.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PerfStats {
    pub derivative_evals: u64,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    pub discrete_modifications: u64,
    pub samples: u64,
    pub inputs_applied: u64,
    pub pacing_overruns: u64,
    pub max_pacing_lag_s: f64,
    pub derivative_time_s: f64,
    pub wall_time_s: f64,
}

impl PerfStats {
    /// Clear all counters (used on reinitialization).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Render a formatted summary of the statistics.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Run Summary ===");
        let _ = writeln!(out, "Accepted steps:      {}", self.accepted_steps);
        if self.rejected_steps > 0 {
            let _ = writeln!(out, "Rejected steps:      {}", self.rejected_steps);
        }
        let _ = writeln!(out, "Derivative evals:    {}", self.derivative_evals);
        if self.derivative_time_s > 0.0 && self.derivative_evals > 0 {
            let _ = writeln!(
                out,
                "  Avg eval time:     {:.4}ms",
                self.derivative_time_s / self.derivative_evals as f64 * 1000.0
            );
        }
        let _ = writeln!(out, "Discrete resets:     {}", self.discrete_modifications);
        let _ = writeln!(out, "Samples logged:      {}", self.samples);
        if self.inputs_applied > 0 {
            let _ = writeln!(out, "Device inputs:       {}", self.inputs_applied);
        }
        if self.wall_time_s > 0.0 {
            let _ = writeln!(out, "Wall time:           {:.3}s", self.wall_time_s);
        }
        if self.pacing_overruns > 0 {
            let _ = writeln!(
                out,
                "Pacing overruns:     {} (max lag {:.4}s)",
                self.pacing_overruns, self.max_pacing_lag_s
            );
        }
        out.push_str("===================");
        out
    }
}
