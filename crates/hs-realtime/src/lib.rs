//! Wall-clock pacing for hybrid models.
//!
//! [`RealtimeDriver`] steps a [`HybridModel`](hs_sim::HybridModel) so that
//! simulated time tracks wall-clock time at a configurable rate. Interactive
//! commands arrive through a [`PacingControl`] handle and are applied between
//! steps.

pub mod clock;
pub mod control;
pub mod driver;

pub use clock::{Clock, ManualClock, SystemClock};
pub use control::PacingControl;
pub use driver::{PacingConfig, PacingReport, RealtimeDriver};
