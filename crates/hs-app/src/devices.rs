//! Devices attached to a running vehicle model.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use hs_io::{DeviceResult, InputDevice, OutputDevice};
use hs_scenario::{SchedulePoint, hold_value};
use hs_system::SystemSnapshot;

use crate::compile::VehicleHandles;

/// Scripted pilot: plays a throttle schedule against the wall clock.
///
/// Simulated time is estimated as `t0 + rate · elapsed`, so the device is
/// only meaningful under a paced run at the same rate. Only changes of the
/// commanded value are emitted.
pub struct ThrottleSchedule {
    points: Vec<SchedulePoint>,
    t0: f64,
    rate: f64,
    started: Option<Instant>,
    last: Option<f64>,
}

impl ThrottleSchedule {
    pub fn new(points: Vec<SchedulePoint>, t0: f64, rate: f64) -> Self {
        Self {
            points,
            t0,
            rate,
            started: None,
            last: None,
        }
    }

    fn sim_time(&self, now: Instant) -> f64 {
        let elapsed = self
            .started
            .map_or(0.0, |start| now.saturating_duration_since(start).as_secs_f64());
        self.t0 + self.rate * elapsed
    }

    /// Command for simulated time `t`, if it differs from the last one sent.
    fn next_command(&mut self, t: f64) -> Option<f64> {
        let value = hold_value(&self.points, t);
        if self.last == Some(value) {
            return None;
        }
        self.last = Some(value);
        Some(value)
    }
}

impl InputDevice<f64> for ThrottleSchedule {
    fn name(&self) -> &str {
        "throttle-schedule"
    }

    fn start(&mut self) -> DeviceResult<()> {
        self.started = Some(Instant::now());
        self.last = None;
        Ok(())
    }

    fn read(&mut self) -> DeviceResult<Option<f64>> {
        let t = self.sim_time(Instant::now());
        Ok(self.next_command(t))
    }
}

/// Logs vehicle telemetry for every frame it receives.
pub struct TelemetryLogger {
    handles: VehicleHandles,
    frames: Arc<AtomicUsize>,
}

impl TelemetryLogger {
    pub fn new(handles: VehicleHandles) -> Self {
        Self {
            handles,
            frames: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared count of frames written so far.
    pub fn frame_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.frames)
    }
}

impl OutputDevice for TelemetryLogger {
    fn name(&self) -> &str {
        "telemetry"
    }

    fn write(&mut self, snapshot: &SystemSnapshot) -> DeviceResult<()> {
        let h = &self.handles;
        let body = snapshot.output(&h.body).cloned().unwrap_or_default();
        let spool = snapshot.output(&h.spool).cloned().unwrap_or_default();
        let attitude = snapshot.output(&h.attitude).cloned().unwrap_or_default();
        tracing::info!(
            t = snapshot.time(),
            altitude_m = body.altitude_m,
            climb_rate_m_s = body.climb_rate_m_s,
            thrust_n = spool.thrust_n,
            yaw_deg = attitude.yaw_rad.to_degrees(),
            "telemetry"
        );
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
