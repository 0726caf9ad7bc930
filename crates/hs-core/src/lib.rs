//! hs-core: shared foundation for the hybrid simulation workspace.
//!
//! Contains:
//! - numeric (finiteness checks and time comparison)
//! - ids (compact IDs for tree nodes)
//! - error (shared error types)
//! - timing (wall-clock timers and run statistics)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod timing;

pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
pub use timing::{PerfStats, Timer, enable_timing};
