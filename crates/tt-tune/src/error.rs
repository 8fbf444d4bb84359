//! Error types for autotuning operations.

use crate::tuner::TunerState;
use thiserror::Error;

/// Result type for autotuning operations.
pub type TuneResult<T> = Result<T, TuneError>;

/// Errors that can occur while configuring or driving an autotuner.
///
/// A relay test that terminates without convergence is *not* an error:
/// it is the [`TunerState::Failed`](crate::tuner::TunerState) terminal
/// state, reported through the normal `step` return value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TuneError {
    /// Invalid tuning parameter passed to `configure` or a constructor.
    #[error("Invalid tuning parameter: {what}")]
    InvalidParam { what: &'static str },

    /// A tuning parameter was NaN or infinite.
    #[error("Non-finite value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    /// `step` was called while the tuner was off or already finished.
    #[error("autotuner is not running (state {state:?})")]
    NotRunning { state: TunerState },

    /// Gains were requested before a relay test converged.
    #[error("no converged relay test; ultimate gain and period are unavailable")]
    NotConverged,

    /// A tuning rule name did not match the rule table.
    #[error("unknown tuning rule `{name}`")]
    UnknownRule { name: String },

    /// The channel link failed to deliver a sample or accept an output.
    #[error("channel link failure: {what}")]
    Link { what: String },

    /// The driver's sample budget ran out before the tuner finished.
    #[error("relay test did not finish within {samples} samples")]
    Incomplete { samples: usize },
}
