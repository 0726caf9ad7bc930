//! Shared application service layer.
//!
//! Turns a scenario into a running model, drives it in batch or paced
//! mode, and persists the sampled history. Used by the CLI.

pub mod compile;
pub mod devices;
pub mod error;
pub mod query;
pub mod run_service;

pub use compile::{CompiledVehicle, VehicleHandles, build_integrator, compile_vehicle};
pub use devices::{TelemetryLogger, ThrottleSchedule};
pub use error::{AppError, AppResult};
pub use query::{RunSummary, extract_channel, get_run_summary};
pub use run_service::{
    ENGINE_VERSION, RunOptions, RunResponse, list_runs, load_run, run_scenario,
};
