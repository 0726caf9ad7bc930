//! Error types for model stepping.

use hs_core::CoreError;
use hs_system::SystemError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error(transparent)]
    System(#[from] SystemError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Step size {h:e} below minimum at t={t}")]
    StepSizeTooSmall { t: f64, h: f64 },

    #[error("Step limit of {limit} reached before t={target}")]
    StepLimit { limit: usize, target: f64 },

    #[error("State length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Model aborted by earlier failure ({reason}); reinitialize to continue")]
    Aborted { reason: String },

    #[error("Device error: {message}")]
    Device { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    /// Failures that invalidate the current run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SimError::System(_) | SimError::StepSizeTooSmall { .. } | SimError::Aborted { .. }
        )
    }
}

impl From<hs_io::DeviceError> for SimError {
    fn from(e: hs_io::DeviceError) -> Self {
        SimError::Device {
            message: e.to_string(),
        }
    }
}
