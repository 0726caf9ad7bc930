//! Device contracts.
//!
//! A device owns one direction of one channel. Input devices produce samples
//! for a leaf's input record; output devices consume system snapshots. Both
//! run on a dedicated thread managed by [`IoRegistry`](crate::IoRegistry).

use std::time::Duration;

use hs_system::SystemSnapshot;

use crate::error::DeviceResult;

/// Producer of input samples of type `S`.
pub trait InputDevice<S>: Send + 'static {
    fn name(&self) -> &str;

    /// Called once on the device thread before the first `read`.
    fn start(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Poll the transport. `Ok(None)` means nothing new is available.
    fn read(&mut self) -> DeviceResult<Option<S>>;

    /// Called once after the final read.
    fn stop(&mut self) -> DeviceResult<()> {
        Ok(())
    }
}

/// Consumer of output snapshots.
pub trait OutputDevice: Send + 'static {
    fn name(&self) -> &str;

    fn start(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Forward one snapshot. Snapshots published while this runs are
    /// coalesced; only the newest is delivered next.
    fn write(&mut self, snapshot: &SystemSnapshot) -> DeviceResult<()>;

    /// Called once after the final flush.
    fn stop(&mut self) -> DeviceResult<()> {
        Ok(())
    }
}

/// Scheduling options for one device thread.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Interval between polls (input) or flushes (output).
    pub period: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(10),
        }
    }
}

impl DeviceConfig {
    pub fn with_period(period: Duration) -> Self {
        Self { period }
    }
}
