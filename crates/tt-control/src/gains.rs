//! PID gain records and controller configuration.

use crate::error::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};

/// Parallel-form PID gains.
///
/// The three coefficients of `u = Kp*e + Ki*∫e + Kd*de/dt`, in whatever
/// units the measurement and output channels use (for a thermoelectric
/// channel: amps per degree, amps per degree-second, amp-seconds per
/// degree).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain.
    pub ki: f64,
    /// Derivative gain.
    pub kd: f64,
}

impl PidGains {
    /// Create a gain record, rejecting non-finite coefficients.
    pub fn new(kp: f64, ki: f64, kd: f64) -> ControlResult<Self> {
        for (what, value) in [("kp", kp), ("ki", ki), ("kd", kd)] {
            if !value.is_finite() {
                return Err(ControlError::NonFinite { what, value });
            }
        }
        Ok(Self { kp, ki, kd })
    }
}

/// PID controller configuration: gains plus the actuator clamp range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidConfig {
    /// Gain coefficients.
    pub gains: PidGains,
    /// Output limit minimum.
    pub output_min: f64,
    /// Output limit maximum.
    pub output_max: f64,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            gains: PidGains::default(),
            output_min: -2.0,
            output_max: 2.0,
        }
    }
}

impl PidConfig {
    /// Create a configuration with the given gains and output limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the limits are non-finite or inverted.
    pub fn new(gains: PidGains, output_min: f64, output_max: f64) -> ControlResult<Self> {
        if !output_min.is_finite() {
            return Err(ControlError::NonFinite {
                what: "output_min",
                value: output_min,
            });
        }
        if !output_max.is_finite() {
            return Err(ControlError::NonFinite {
                what: "output_max",
                value: output_max,
            });
        }
        if output_min >= output_max {
            return Err(ControlError::InvalidArg {
                what: "output_min must be less than output_max",
            });
        }
        Ok(Self {
            gains,
            output_min,
            output_max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gains_reject_non_finite() {
        assert!(PidGains::new(1.0, 0.1, 0.0).is_ok());
        assert!(PidGains::new(f64::NAN, 0.1, 0.0).is_err());
        assert!(PidGains::new(1.0, f64::INFINITY, 0.0).is_err());
    }

    #[test]
    fn config_rejects_inverted_limits() {
        let gains = PidGains::new(1.0, 0.0, 0.0).unwrap();
        assert!(PidConfig::new(gains, 2.0, -2.0).is_err());
        assert!(PidConfig::new(gains, -2.0, 2.0).is_ok());
    }

    #[test]
    fn default_limits_are_symmetric() {
        let config = PidConfig::default();
        assert_eq!(config.output_min, -config.output_max);
    }
}
