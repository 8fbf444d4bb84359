//! Relay-feedback PID autotuning.
//!
//! This crate is the control logic for discovering PID gains on a
//! closed-loop temperature channel. The autotuner drives a two-level
//! (bang-bang) output around a setpoint, watches the induced oscillation
//! of the measurement, and once the oscillation amplitude stabilizes
//! derives the plant's ultimate gain and period. Classical tuning rules
//! then convert those into PID gains.
//!
//! # Architecture
//!
//! - [`RelayAutotuner`] owns all tuning state for one channel and is a
//!   pure, single-threaded state machine: `step` once per sample.
//! - [`TuningRule`] is the closed table of gain-conversion rules.
//! - [`driver`] provides the seam to the device link: a [`ChannelLink`]
//!   trait and a synchronous [`run_relay_test`] loop.
//!
//! Transport to the real device (sockets, framing, reconnection) is a
//! collaborator concern and lives outside this crate; multiple channels
//! use independent [`RelayAutotuner`] instances.

pub mod driver;
pub mod error;
pub mod rules;
pub mod tuner;
pub mod window;

pub use driver::{ChannelLink, ChannelReading, RelayOutcome, run_relay_test};
pub use error::{TuneError, TuneResult};
pub use rules::{RuleCoefficients, TuningRule, tuning_rule_names};
pub use tuner::{RelayAutotuner, RelayEstimate, TunerConfig, TunerState};
pub use window::SampleWindow;
