//! Interactive control of a running pacing loop.

use std::sync::mpsc::{Receiver, Sender, channel};

use hs_sim::Reinit;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Cancel,
    SetRate(f64),
    Reinit(Reinit),
}

/// Clonable handle for steering a [`RealtimeDriver`](crate::RealtimeDriver)
/// from another thread.
///
/// Commands never interrupt a step; the driver drains them at the top of
/// each loop iteration. Every method returns `false` once the driver is gone.
#[derive(Debug, Clone)]
pub struct PacingControl {
    tx: Sender<Command>,
}

impl PacingControl {
    pub(crate) fn pair() -> (Self, Receiver<Command>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }

    /// Stop the loop at the next step boundary.
    pub fn cancel(&self) -> bool {
        self.tx.send(Command::Cancel).is_ok()
    }

    /// Change the wall-clock rate multiplier (2.0 runs twice as fast).
    pub fn set_rate(&self, rate: f64) -> bool {
        self.tx.send(Command::SetRate(rate)).is_ok()
    }

    /// Reinitialize the model and restart pacing from now.
    pub fn reinit(&self, request: Reinit) -> bool {
        self.tx.send(Command::Reinit(request)).is_ok()
    }
}
