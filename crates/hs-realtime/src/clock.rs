//! Time sources for the pacing loop.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

pub trait Clock: Send {
    fn now(&self) -> Instant;

    /// Block until `deadline`. Returns immediately if it has passed.
    fn sleep_until(&self, deadline: Instant);
}

/// The process monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
}

/// Virtual clock for tests and offline replay.
///
/// Sleeping jumps straight to the deadline. Every call to `now` first
/// advances time by `cost`, standing in for the work done since the last
/// observation.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
    cost: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::with_cost(Duration::ZERO)
    }

    pub fn with_cost(cost: Duration) -> Self {
        Self {
            now: Mutex::new(Instant::now()),
            cost,
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += self.cost;
        *now
    }

    fn sleep_until(&self, deadline: Instant) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if deadline > *now {
            *now = deadline;
        }
    }
}
