//! The tuning-rule table: closed-form conversions from a relay estimate
//! to PID gains.
//!
//! Each rule is three dimensionless coefficients `(c_p, c_i, c_d)` applied
//! to the ultimate gain `Ku` and ultimate period `Pu`:
//!
//! ```text
//! Kp = c_p * Ku
//! Ki = c_i * Ku / Pu
//! Kd = c_d * Ku * Pu
//! ```

use crate::error::{TuneError, TuneResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tt_control::PidGains;

/// Closed set of supported PID tuning rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TuningRule {
    /// Classic Ziegler-Nichols ultimate-cycle rule.
    ZieglerNichols,
    /// Tyreus-Luyben: slower integral action, less overshoot.
    TyreusLuyben,
    /// Ciancone-Marlin.
    CianconeMarlin,
    /// Pessen integral rule.
    PessenIntegral,
    /// "Some overshoot" variant.
    SomeOvershoot,
    /// "No overshoot" variant.
    NoOvershoot,
}

/// Dimensionless rule coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleCoefficients {
    pub c_p: f64,
    pub c_i: f64,
    pub c_d: f64,
}

impl TuningRule {
    /// Every rule in the table, in presentation order.
    pub const ALL: [TuningRule; 6] = [
        TuningRule::ZieglerNichols,
        TuningRule::TyreusLuyben,
        TuningRule::CianconeMarlin,
        TuningRule::PessenIntegral,
        TuningRule::SomeOvershoot,
        TuningRule::NoOvershoot,
    ];

    /// Kebab-case rule name as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            TuningRule::ZieglerNichols => "ziegler-nichols",
            TuningRule::TyreusLuyben => "tyreus-luyben",
            TuningRule::CianconeMarlin => "ciancone-marlin",
            TuningRule::PessenIntegral => "pessen-integral",
            TuningRule::SomeOvershoot => "some-overshoot",
            TuningRule::NoOvershoot => "no-overshoot",
        }
    }

    /// The rule's fixed coefficient triple.
    pub fn coefficients(self) -> RuleCoefficients {
        let (c_p, c_i, c_d) = match self {
            TuningRule::ZieglerNichols => (0.6, 1.2, 0.075),
            TuningRule::TyreusLuyben => (0.4545, 0.2066, 0.07214),
            TuningRule::CianconeMarlin => (0.303, 0.1364, 0.0481),
            TuningRule::PessenIntegral => (0.7, 1.75, 0.105),
            TuningRule::SomeOvershoot => (0.333, 0.667, 0.111),
            TuningRule::NoOvershoot => (0.2, 0.4, 0.0667),
        };
        RuleCoefficients { c_p, c_i, c_d }
    }

    /// Convert an ultimate gain and period into PID gains under this rule.
    pub fn gains(self, ultimate_gain: f64, ultimate_period_s: f64) -> PidGains {
        let RuleCoefficients { c_p, c_i, c_d } = self.coefficients();
        PidGains {
            kp: c_p * ultimate_gain,
            ki: c_i * ultimate_gain / ultimate_period_s,
            kd: c_d * ultimate_gain * ultimate_period_s,
        }
    }
}

impl fmt::Display for TuningRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TuningRule {
    type Err = TuneError;

    fn from_str(s: &str) -> TuneResult<Self> {
        Self::ALL
            .into_iter()
            .find(|rule| rule.name() == s)
            .ok_or_else(|| TuneError::UnknownRule {
                name: s.to_string(),
            })
    }
}

/// Names of every available tuning rule.
pub fn tuning_rule_names() -> Vec<&'static str> {
    TuningRule::ALL.into_iter().map(TuningRule::name).collect()
}
