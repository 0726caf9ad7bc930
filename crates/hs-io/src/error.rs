use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("device '{device}': transport error: {message}")]
    Transport { device: String, message: String },

    #[error("device '{device}': malformed payload: {message}")]
    Malformed { device: String, message: String },

    #[error("device '{device}' disconnected")]
    Disconnected { device: String },

    #[error("device '{device}': failed to start: {message}")]
    Start { device: String, message: String },

    #[error("device '{device}': target leaf is not part of this system")]
    UnknownTarget { device: String },
}

pub type DeviceResult<T> = Result<T, DeviceError>;
