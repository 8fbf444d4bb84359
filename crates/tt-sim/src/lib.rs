//! Simulated thermal plant for exercising the autotuner without hardware.
//!
//! The plant stands in for the device link: it implements
//! [`tt_tune::ChannelLink`], producing one temperature sample per `read`
//! and accepting output-current commands. Used by the CLI demo and by
//! integration tests.

pub mod error;
pub mod plant;

pub use error::{SimError, SimResult};
pub use plant::{PlantConfig, ThermalPlant};
