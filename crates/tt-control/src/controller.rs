//! Discrete velocity-form PID controller.
//!
//! The update law advances the previous output by weighted differences of
//! the input history instead of keeping an explicit integral accumulator:
//!
//! ```text
//! y0' =   y1 - ki * u
//!       + x0 * (kp + ki + kd)
//!       - x1 * (kp + 2*kd)
//!       + x2 * kd
//! y0  = clamp(y0', output_min, output_max)
//! ```
//!
//! where `x0..x2` are the current and two previous measurements and `u` is
//! the target. Clamping the advanced output gives anti-windup for free:
//! the history never accumulates past the actuator limits.
//!
//! Sign convention matches a thermoelectric output channel: a measurement
//! above target raises the output, and positive output current cools.

use crate::error::ControlResult;
use crate::gains::{PidConfig, PidGains};
use serde::{Deserialize, Serialize};

/// Velocity-form PID controller for one output channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidController {
    config: PidConfig,
    target: f64,
    /// Previous measurement.
    x1: f64,
    /// Measurement before previous.
    x2: f64,
    /// Previous (clamped) output.
    y1: f64,
}

impl PidController {
    /// Create a controller with the given configuration and a zero target.
    pub fn new(config: PidConfig) -> Self {
        Self {
            config,
            target: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
        }
    }

    /// Current target value.
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Set the target value.
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    /// Current gain coefficients.
    pub fn gains(&self) -> PidGains {
        self.config.gains
    }

    /// Replace the gain coefficients.
    ///
    /// Resets the measurement/output history so the velocity form does not
    /// carry differences computed under the old gains.
    pub fn set_gains(&mut self, gains: PidGains) -> ControlResult<()> {
        PidGains::new(gains.kp, gains.ki, gains.kd)?;
        self.config.gains = gains;
        self.reset();
        Ok(())
    }

    /// Clear the measurement and output history.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
    }

    /// Advance the controller by one sample and return the clamped output.
    pub fn update(&mut self, input: f64) -> f64 {
        let PidGains { kp, ki, kd } = self.config.gains;

        let mut output = self.y1 - ki * self.target
            + input * (kp + ki + kd)
            - self.x1 * (kp + 2.0 * kd)
            + self.x2 * kd;
        output = output.clamp(self.config.output_min, self.config.output_max);

        self.x2 = self.x1;
        self.x1 = input;
        self.y1 = output;
        output
    }
}
