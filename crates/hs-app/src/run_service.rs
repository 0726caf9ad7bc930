//! Run execution and persistence service.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use hs_components::Environment;
use hs_core::PerfStats;
use hs_io::DeviceConfig;
use hs_realtime::{PacingConfig, PacingReport, RealtimeDriver};
use hs_results::{RunManifest, RunMode, RunStats, RunStore, TimeseriesRecord};
use hs_scenario::{ScenarioDef, validate_scenario};
use hs_sim::{HybridModel, Integrator, ModelOptions};
use hs_system::SystemSnapshot;

use crate::compile::{CompiledVehicle, VehicleHandles, build_integrator, compile_vehicle};
use crate::devices::{TelemetryLogger, ThrottleSchedule};
use crate::error::{AppError, AppResult};

/// Engine version folded into run ids.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Overrides and output location for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides `pacing.realtime`.
    pub realtime: Option<bool>,
    /// Overrides `pacing.rate`.
    pub rate: Option<f64>,
    /// Run store root; nothing is persisted when `None`.
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub records: Vec<TimeseriesRecord>,
    pub stats: PerfStats,
    /// Present for paced runs.
    pub pacing: Option<PacingReport>,
    pub telemetry_frames: usize,
    pub saved: bool,
}

type VehicleModel = HybridModel<Environment, Box<dyn Integrator>>;

/// Compile `scenario`, run it to `sim.t_end`, and optionally persist the
/// sampled history.
///
/// Batch runs apply the throttle schedule exactly at its breakpoints.
/// Paced runs feed it through a [`ThrottleSchedule`] input device instead.
pub fn run_scenario(scenario: &ScenarioDef, options: RunOptions) -> AppResult<RunResponse> {
    validate_scenario(scenario)?;

    let realtime = options.realtime.unwrap_or(scenario.pacing.realtime);
    let rate = options.rate.unwrap_or(scenario.pacing.rate);
    if !(rate.is_finite() && rate > 0.0) {
        return Err(AppError::InvalidInput(format!(
            "pacing rate must be positive, got {rate}"
        )));
    }
    let mode = if realtime {
        RunMode::Paced { rate }
    } else {
        RunMode::Batch
    };

    let CompiledVehicle { system, handles } = compile_vehicle(scenario)?;
    let state_labels = system.layout().state_labels();
    let integrator = build_integrator(&scenario.sim)?;
    let integrator_name = integrator.name().to_string();
    let model_options = ModelOptions {
        sample_period: scenario.sim.sample_period,
        ..ModelOptions::default()
    };
    let mut model = HybridModel::new(system, integrator, Environment::default(), model_options)?;

    let frames = match scenario.devices.telemetry_period_s {
        Some(period) => {
            let logger = TelemetryLogger::new(handles);
            let frames = logger.frame_counter();
            let config = DeviceConfig::with_period(Duration::from_secs_f64(period));
            model.io_mut().attach_output(logger, config)?;
            Some(frames)
        }
        None => None,
    };

    tracing::info!(
        scenario = %scenario.name,
        ?mode,
        integrator = %integrator_name,
        t0 = scenario.sim.t0,
        t_end = scenario.sim.t_end,
        "run started"
    );

    let outcome = match &mode {
        RunMode::Batch => run_batch(&mut model, scenario, &handles).map(|()| None),
        RunMode::Paced { rate } => run_paced(&mut model, scenario, &handles, *rate).map(Some),
    };
    model.shutdown_io();
    let pacing = outcome?;

    let records: Vec<TimeseriesRecord> = model
        .history()
        .iter()
        .map(|snapshot| to_record(snapshot, &handles))
        .collect();
    let stats = model.stats().clone();
    let run_id = hs_results::compute_run_id(scenario, &mode, ENGINE_VERSION);
    let manifest = RunManifest {
        run_id: run_id.clone(),
        scenario: scenario.name.clone(),
        timestamp: hs_results::timestamp_now(),
        mode,
        integrator: integrator_name,
        t0: scenario.sim.t0,
        t_end: model.time(),
        sample_period: scenario.sim.sample_period,
        samples: records.len(),
        state_labels,
        stats: RunStats {
            accepted_steps: stats.accepted_steps,
            rejected_steps: stats.rejected_steps,
            derivative_evals: stats.derivative_evals,
            discrete_modifications: stats.discrete_modifications,
            pacing_overruns: stats.pacing_overruns,
            wall_time_s: stats.wall_time_s,
        },
    };

    let saved = match &options.out_dir {
        Some(dir) => {
            RunStore::new(dir.clone())?.save_run(&manifest, &records)?;
            true
        }
        None => false,
    };

    tracing::info!(
        run_id = %run_id,
        samples = records.len(),
        steps = stats.accepted_steps,
        saved,
        "run finished"
    );

    Ok(RunResponse {
        run_id,
        manifest,
        records,
        stats,
        pacing,
        telemetry_frames: frames.map_or(0, |f| f.load(std::sync::atomic::Ordering::Relaxed)),
        saved,
    })
}

fn run_batch(
    model: &mut VehicleModel,
    scenario: &ScenarioDef,
    handles: &VehicleHandles,
) -> AppResult<()> {
    let started = Instant::now();
    let (t0, t_end) = (scenario.sim.t0, scenario.sim.t_end);
    for point in scenario
        .throttle_schedule
        .iter()
        .filter(|p| p.t > t0 && p.t < t_end)
    {
        model.advance_to(point.t)?;
        if let Some(command) = model.system_mut().input_mut(&handles.actuator) {
            *command = point.value;
        }
        tracing::debug!(t = point.t, throttle = point.value, "throttle command");
    }
    model.advance_to(t_end)?;
    model.stats_mut().wall_time_s += started.elapsed().as_secs_f64();
    Ok(())
}

fn run_paced(
    model: &mut VehicleModel,
    scenario: &ScenarioDef,
    handles: &VehicleHandles,
    rate: f64,
) -> AppResult<PacingReport> {
    let pilot = ThrottleSchedule::new(scenario.throttle_schedule.clone(), scenario.sim.t0, rate);
    let period = Duration::from_secs_f64(scenario.devices.input_period_s);
    let config = DeviceConfig::with_period(period);
    model
        .io_mut()
        .attach_input(pilot, &handles.actuator, config, |value: f64, command: &mut f64| {
            *command = value;
        })?;

    let mut driver = RealtimeDriver::with_system_clock(PacingConfig {
        rate,
        t_end: scenario.sim.t_end,
    })?;
    Ok(driver.run(model)?)
}

fn to_record(snapshot: &SystemSnapshot, h: &VehicleHandles) -> TimeseriesRecord {
    let mut record = TimeseriesRecord::new(snapshot.time(), snapshot.state().to_vec());
    if let Some(throttle) = snapshot.output(&h.actuator) {
        record = record.with_channel("throttle", *throttle);
    }
    if let Some(spool) = snapshot.output(&h.spool) {
        record = record
            .with_channel("omega_rad_s", spool.omega_rad_s)
            .with_channel("thrust_n", spool.thrust_n);
    }
    if let Some(body) = snapshot.output(&h.body) {
        record = record
            .with_channel("altitude_m", body.altitude_m)
            .with_channel("climb_rate_m_s", body.climb_rate_m_s);
    }
    if let Some(attitude) = snapshot.output(&h.attitude) {
        record = record
            .with_channel("roll_rad", attitude.roll_rad)
            .with_channel("pitch_rad", attitude.pitch_rad)
            .with_channel("yaw_rad", attitude.yaw_rad);
    }
    record
}

/// Load a persisted run's manifest and time series.
pub fn load_run(out_dir: &Path, run_id: &str) -> AppResult<(RunManifest, Vec<TimeseriesRecord>)> {
    let store = RunStore::new(out_dir.to_path_buf())?;
    let manifest = store.load_manifest(run_id)?;
    let records = store.load_timeseries(run_id)?;
    Ok((manifest, records))
}

pub fn list_runs(out_dir: &Path) -> AppResult<Vec<RunManifest>> {
    Ok(RunStore::new(out_dir.to_path_buf())?.list_runs()?)
}
