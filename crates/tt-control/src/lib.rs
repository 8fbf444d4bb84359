//! PID control primitives for thermotune.
//!
//! Contains:
//! - gains (the `PidGains` record and output-clamped `PidConfig`)
//! - controller (discrete velocity-form PID)
//! - error (shared error types)

pub mod controller;
pub mod error;
pub mod gains;

pub use controller::PidController;
pub use error::{ControlError, ControlResult};
pub use gains::{PidConfig, PidGains};
