//! Discrete thermal plant model.
//!
//! First-order response toward a drive-dependent equilibrium with a
//! transport delay on the measurement path. Sign convention matches a
//! thermoelectric channel: positive output current cools, so the
//! equilibrium is `ambient_c - drive_gain_c_per_a * current`.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use tt_tune::{ChannelLink, ChannelReading, TuneResult};

/// Plant parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlantConfig {
    /// Ambient (zero-drive equilibrium) temperature.
    pub ambient_c: f64,
    /// Steady-state temperature change per amp of drive; positive values
    /// cool with positive current.
    pub drive_gain_c_per_a: f64,
    /// First-order time constant in seconds.
    pub time_constant_s: f64,
    /// Transport delay on the measurement path, in seconds.
    pub delay_s: f64,
    /// Sampling interval in seconds; one `read` advances one interval.
    pub sample_interval_s: f64,
    /// Initial temperature.
    pub initial_c: f64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            ambient_c: 20.0,
            drive_gain_c_per_a: 15.0,
            time_constant_s: 10.0,
            delay_s: 2.0,
            sample_interval_s: 0.5,
            initial_c: 20.0,
        }
    }
}

impl PlantConfig {
    fn validate(&self) -> SimResult<usize> {
        for (what, value) in [
            ("ambient_c", self.ambient_c),
            ("drive_gain_c_per_a", self.drive_gain_c_per_a),
            ("time_constant_s", self.time_constant_s),
            ("delay_s", self.delay_s),
            ("sample_interval_s", self.sample_interval_s),
            ("initial_c", self.initial_c),
        ] {
            if !value.is_finite() {
                return Err(SimError::NonFinite { what, value });
            }
        }
        if self.time_constant_s <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "time_constant_s must be positive",
            });
        }
        if self.sample_interval_s <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "sample_interval_s must be positive",
            });
        }
        if self.delay_s < 0.0 {
            return Err(SimError::InvalidArg {
                what: "delay_s must be non-negative",
            });
        }
        Ok((self.delay_s / self.sample_interval_s).round() as usize)
    }
}

/// One simulated temperature channel.
#[derive(Debug, Clone)]
pub struct ThermalPlant {
    config: PlantConfig,
    /// True plant temperature.
    temp_c: f64,
    /// Measurement delay line, one slot per sample interval.
    delay_line: Vec<f64>,
    delay_idx: usize,
    time_s: f64,
    drive_a: f64,
}

impl ThermalPlant {
    pub fn new(config: PlantConfig) -> SimResult<Self> {
        let delay_slots = config.validate()?;
        Ok(Self {
            config,
            temp_c: config.initial_c,
            delay_line: vec![config.initial_c; delay_slots],
            delay_idx: 0,
            time_s: 0.0,
            drive_a: 0.0,
        })
    }

    /// True (undelayed) plant temperature.
    pub fn temperature(&self) -> f64 {
        self.temp_c
    }

    /// Simulation time in seconds.
    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    /// Set the drive current and advance one sample interval, returning
    /// the delayed measurement.
    pub fn step(&mut self, drive_a: f64) -> f64 {
        self.drive_a = drive_a;
        self.advance()
    }

    fn advance(&mut self) -> f64 {
        let config = &self.config;
        let equilibrium = config.ambient_c - config.drive_gain_c_per_a * self.drive_a;
        // Implicit-Euler relaxation: unconditionally stable for any dt.
        let alpha = config.sample_interval_s / (config.time_constant_s + config.sample_interval_s);
        self.temp_c += (equilibrium - self.temp_c) * alpha;
        self.time_s += config.sample_interval_s;

        if self.delay_line.is_empty() {
            self.temp_c
        } else {
            let measured = self.delay_line[self.delay_idx];
            self.delay_line[self.delay_idx] = self.temp_c;
            self.delay_idx = (self.delay_idx + 1) % self.delay_line.len();
            measured
        }
    }
}

impl ChannelLink for ThermalPlant {
    /// Each read is one device sample: the plant advances one interval
    /// under the last commanded drive.
    fn read(&mut self) -> TuneResult<ChannelReading> {
        let temperature = self.advance();
        Ok(ChannelReading {
            temperature: Some(temperature),
            timestamp_s: self.time_s,
        })
    }

    fn set_output(&mut self, output: f64) -> TuneResult<()> {
        self.drive_a = output;
        Ok(())
    }
}
