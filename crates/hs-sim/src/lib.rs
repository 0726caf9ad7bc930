//! Hybrid continuous/discrete simulation driver.
//!
//! Provides:
//! - an integrator contract with fixed-step Euler and RK4 and adaptive
//!   Dormand-Prince 4(5)
//! - [`HybridModel`], bridging integrator derivative requests, per-step
//!   discrete updates and fixed-cadence output sampling onto a [`System`]
//! - [`TimeHistory`], the append-only sample log
//!
//! [`System`]: hs_system::System

pub mod error;
pub mod history;
pub mod integrator;
pub mod model;

pub use error::{SimError, SimResult};
pub use history::TimeHistory;
pub use integrator::{
    AdaptiveConfig, DormandPrince45, ForwardEuler, Integrator, IntegratorKind, OdeSystem, Rk4,
    StepReport,
};
pub use model::{HybridModel, ModelOptions, Reinit, StepOutcome};
