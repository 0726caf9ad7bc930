//! Error types for component and system operations.

use hs_core::NodeId;
use thiserror::Error;

/// Failure reported by a component's update function.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    #[error("Invalid input: {what}")]
    InvalidInput { what: String },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: String },

    #[error("{message}")]
    Failed { message: String },
}

impl ComponentError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn non_physical(what: impl Into<String>) -> Self {
        Self::NonPhysical { what: what.into() }
    }
}

pub type ComponentResult<T> = Result<T, ComponentError>;

/// Errors raised while building or evaluating a [`System`](crate::System).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SystemError {
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Duplicate child name '{name}' under '{parent}'")]
    DuplicateName { name: String, parent: String },

    #[error("Unknown node: {id}")]
    UnknownNode { id: NodeId },

    #[error("Node '{path}' is a leaf and cannot have children")]
    NotAGroup { path: String },

    #[error("State partition mismatch at '{path}': declared {declared}, children provide {actual}")]
    PartitionMismatch {
        path: String,
        declared: usize,
        actual: usize,
    },

    #[error("Initial state of '{path}' has length {actual}, component declares {declared}")]
    StateLengthMismatch {
        path: String,
        declared: usize,
        actual: usize,
    },

    #[error("Wiring from '{from}' to '{to}' runs against the declared evaluation order")]
    CyclicWiring { from: String, to: String },

    #[error("Wiring endpoint '{path}' has no {expected} record")]
    WireTypeMismatch { path: String, expected: &'static str },

    #[error("State length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Component '{path}' failed at t={t}: {source}")]
    Component {
        path: String,
        t: f64,
        source: ComponentError,
    },

    #[error("Non-finite derivative from '{path}' at t={t}: {value}")]
    NonFinite { path: String, t: f64, value: f64 },
}

impl SystemError {
    /// Whether this error was detected while building the tree.
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            SystemError::Component { .. }
                | SystemError::NonFinite { .. }
                | SystemError::LengthMismatch { .. }
        )
    }
}

pub type SystemResult<T> = Result<T, SystemError>;
