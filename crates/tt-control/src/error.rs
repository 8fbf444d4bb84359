//! Error types for PID control operations.

use thiserror::Error;

/// Result type for PID control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur when configuring or running a controller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// A gain or limit was NaN or infinite.
    #[error("Non-finite value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },
}
