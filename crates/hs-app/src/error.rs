//! Error types for the hs-app service layer.

/// Application error wrapping the backend crates' errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Scenario error: {0}")]
    Scenario(String),

    #[error("Model compilation failed: {0}")]
    Compile(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<hs_scenario::ScenarioError> for AppError {
    fn from(err: hs_scenario::ScenarioError) -> Self {
        AppError::Scenario(err.to_string())
    }
}

impl From<hs_scenario::ValidationError> for AppError {
    fn from(err: hs_scenario::ValidationError) -> Self {
        AppError::Scenario(err.to_string())
    }
}

impl From<hs_system::SystemError> for AppError {
    fn from(err: hs_system::SystemError) -> Self {
        AppError::Compile(err.to_string())
    }
}

impl From<hs_system::ComponentError> for AppError {
    fn from(err: hs_system::ComponentError) -> Self {
        AppError::Compile(err.to_string())
    }
}

impl From<hs_sim::SimError> for AppError {
    fn from(err: hs_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<hs_io::DeviceError> for AppError {
    fn from(err: hs_io::DeviceError) -> Self {
        AppError::Device(err.to_string())
    }
}

impl From<hs_results::ResultsError> for AppError {
    fn from(err: hs_results::ResultsError) -> Self {
        match err {
            hs_results::ResultsError::RunNotFound { run_id } => AppError::RunNotFound(run_id),
            other => AppError::Results(other.to_string()),
        }
    }
}
