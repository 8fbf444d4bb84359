//! Relay-feedback autotuner state machine.
//!
//! One [`RelayAutotuner`] owns the tuning state for a single control
//! channel. Driving it is synchronous: call [`RelayAutotuner::step`] once
//! per fresh measurement and push [`RelayAutotuner::output`] to the
//! actuator between calls. The relay flips between `-output_step` and
//! `+output_step` around the setpoint with a hysteresis band, the
//! measurement stream is scanned for alternating local extrema, and once
//! five recorded peaks agree on amplitude the ultimate gain and period
//! are read off the oscillation.
//!
//! The method deliberately avoids model identification: it forces a
//! sustained limit cycle whose amplitude and period are measured
//! directly, which tolerates plant nonlinearity and needs no a-priori
//! model. The lookback window sets local-extremum sensitivity: too short
//! admits false peaks from noise, too long delays detection.

use crate::error::{TuneError, TuneResult};
use crate::rules::TuningRule;
use crate::window::SampleWindow;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;
use tt_control::PidGains;

/// Number of recent peaks kept for the convergence test.
const PEAK_CAPACITY: usize = 5;

/// Peak count at which an unconverged run is abandoned (10 full cycles).
const FAILURE_PEAK_COUNT: u32 = 20;

/// Relative tolerance on the induced-oscillation amplitude.
const AMPLITUDE_TOLERANCE: f64 = 0.05;

/// Autotuner lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunerState {
    /// Idle; `step` is a misuse error in this state.
    Off,
    /// Armed; the next `step` starts the relay test.
    Ready,
    /// Relay is stepping the output down to pull the measurement up.
    StepUp,
    /// Relay is stepping the output up to pull the measurement down.
    StepDown,
    /// Terminal: oscillation converged, gains are available.
    Succeeded,
    /// Terminal: no convergence within the peak budget.
    Failed,
}

impl TunerState {
    /// True for the terminal states.
    pub fn is_finished(self) -> bool {
        matches!(self, TunerState::Succeeded | TunerState::Failed)
    }
}

/// Classification of the most recent local extremum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeakKind {
    Max,
    Min,
}

/// Tunable parameters of a relay test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Target measurement value (e.g. degrees Celsius).
    pub setpoint: f64,
    /// Magnitude of the two relay output levels (e.g. amps).
    pub output_step: f64,
    /// Hysteresis band around the setpoint; the measurement must leave
    /// `setpoint ± noise_band` before the relay flips.
    pub noise_band: f64,
    /// Device sampling interval in seconds.
    pub sample_interval_s: f64,
    /// Reference span for local minima/maxima in seconds.
    pub lookback_s: f64,
}

impl TunerConfig {
    /// Configuration with the given setpoint and the stock defaults for
    /// everything else.
    pub fn new(setpoint: f64) -> Self {
        Self {
            setpoint,
            output_step: 10.0,
            noise_band: 0.5,
            sample_interval_s: 1.2,
            lookback_s: 60.0,
        }
    }

    /// Validate the configuration and compute the sample-window capacity,
    /// `round(lookback_s / sample_interval_s)`.
    pub fn window_capacity(&self) -> TuneResult<usize> {
        for (what, value) in [
            ("setpoint", self.setpoint),
            ("output_step", self.output_step),
            ("noise_band", self.noise_band),
            ("sample_interval_s", self.sample_interval_s),
            ("lookback_s", self.lookback_s),
        ] {
            if !value.is_finite() {
                return Err(TuneError::NonFinite { what, value });
            }
        }
        if self.output_step <= 0.0 {
            return Err(TuneError::InvalidParam {
                what: "output_step must be positive",
            });
        }
        if self.noise_band < 0.0 {
            return Err(TuneError::InvalidParam {
                what: "noise_band must be non-negative",
            });
        }
        if self.sample_interval_s <= 0.0 {
            return Err(TuneError::InvalidParam {
                what: "sample_interval_s must be positive",
            });
        }
        if self.lookback_s <= 0.0 {
            return Err(TuneError::InvalidParam {
                what: "lookback_s must be positive",
            });
        }
        let capacity = (self.lookback_s / self.sample_interval_s).round() as usize;
        if capacity == 0 {
            return Err(TuneError::InvalidParam {
                what: "lookback_s must cover at least one sample interval",
            });
        }
        Ok(capacity)
    }
}

/// Ultimate gain and period read off a converged relay test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelayEstimate {
    /// Ultimate gain `Ku = 4 * output_step / (pi * amplitude)`.
    pub ultimate_gain: f64,
    /// Ultimate period `Pu` in seconds.
    pub ultimate_period_s: f64,
}

/// Relay-feedback autotuner for one control channel.
#[derive(Debug, Clone)]
pub struct RelayAutotuner {
    config: TunerConfig,
    /// Recent measurements; a new sample is a candidate extremum only
    /// against a full window.
    window: SampleWindow,
    /// Values of the most recent recorded peaks.
    peaks: SampleWindow,
    /// Timestamps of the recorded peaks, in milliseconds.
    peak_times_ms: SampleWindow,
    state: TunerState,
    output: f64,
    /// Actuator bias the relay steps around; zero for a channel that idles
    /// with no drive.
    initial_output: f64,
    peak_kind: Option<PeakKind>,
    peak_count: u32,
    induced_amplitude: f64,
    estimate: Option<RelayEstimate>,
}

impl RelayAutotuner {
    /// Create an autotuner for one channel.
    ///
    /// # Errors
    ///
    /// Rejects non-finite parameters and window capacities of zero, per
    /// [`TunerConfig::window_capacity`].
    pub fn new(config: TunerConfig) -> TuneResult<Self> {
        let capacity = config.window_capacity()?;
        Ok(Self {
            config,
            window: SampleWindow::new(capacity),
            peaks: SampleWindow::new(PEAK_CAPACITY),
            peak_times_ms: SampleWindow::new(PEAK_CAPACITY),
            state: TunerState::Off,
            output: 0.0,
            initial_output: 0.0,
            peak_kind: None,
            peak_count: 0,
            induced_amplitude: 0.0,
            estimate: None,
        })
    }

    /// Replace all tunables.
    ///
    /// Recomputes the sample-window capacity and drops any buffered
    /// samples; peak history and lifecycle state are untouched. A
    /// rejected configuration leaves the tuner exactly as it was.
    pub fn configure(&mut self, config: TunerConfig) -> TuneResult<()> {
        let capacity = config.window_capacity()?;
        self.config = config;
        self.window = SampleWindow::new(capacity);
        Ok(())
    }

    /// Arm the tuner for a fresh relay test.
    ///
    /// Clears the peak count, peak history, and sample window so nothing
    /// from a previous attempt can satisfy the convergence test, then
    /// moves to [`TunerState::Ready`]. Valid from any state.
    pub fn arm(&mut self) {
        self.state = TunerState::Ready;
        self.peak_count = 0;
        self.peak_kind = None;
        self.window.clear();
        self.peaks.clear();
        self.peak_times_ms.clear();
        self.induced_amplitude = 0.0;
        self.estimate = None;
    }

    /// Stop the tuner: state to [`TunerState::Off`], output to zero.
    /// Always safe to call.
    pub fn disarm(&mut self) {
        self.state = TunerState::Off;
        self.output = 0.0;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TunerState {
        self.state
    }

    /// Last commanded relay output.
    pub fn output(&self) -> f64 {
        self.output
    }

    /// Active configuration.
    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Number of samples currently buffered in the lookback window.
    pub fn buffered_samples(&self) -> usize {
        self.window.len()
    }

    /// Capacity of the lookback window.
    pub fn window_capacity(&self) -> usize {
        self.window.capacity()
    }

    /// Inflections detected since the last `arm`.
    pub fn peak_count(&self) -> u32 {
        self.peak_count
    }

    /// Ultimate gain and period, available once the test has succeeded.
    pub fn estimate(&self) -> Option<RelayEstimate> {
        self.estimate
    }

    /// Advance the tuner by one measurement sample.
    ///
    /// Returns `Ok(true)` exactly on the call that enters a terminal
    /// state ([`TunerState::Succeeded`] or [`TunerState::Failed`]),
    /// `Ok(false)` otherwise.
    ///
    /// # Errors
    ///
    /// Calling `step` while off or already finished is a driver bug and
    /// returns [`TuneError::NotRunning`] rather than being silently
    /// ignored.
    pub fn step(&mut self, measurement: f64, timestamp_s: f64) -> TuneResult<bool> {
        match self.state {
            TunerState::Off | TunerState::Succeeded | TunerState::Failed => {
                return Err(TuneError::NotRunning { state: self.state });
            }
            // The relay test starts by pulling the output down.
            TunerState::Ready => self.state = TunerState::StepUp,
            TunerState::StepUp | TunerState::StepDown => {}
        }

        let now_ms = timestamp_s * 1000.0;

        // Relay switching with hysteresis.
        if self.state == TunerState::StepUp
            && measurement > self.config.setpoint + self.config.noise_band
        {
            self.state = TunerState::StepDown;
            debug!(state = ?self.state, input = measurement, "relay switched");
        } else if self.state == TunerState::StepDown
            && measurement < self.config.setpoint - self.config.noise_band
        {
            self.state = TunerState::StepUp;
            debug!(state = ?self.state, input = measurement, "relay switched");
        }

        // Output command, clamped to the relay levels.
        let raw = match self.state {
            TunerState::StepUp => self.initial_output - self.config.output_step,
            _ => self.initial_output + self.config.output_step,
        };
        self.output = raw.clamp(-self.config.output_step, self.config.output_step);

        // Candidate extremum against the window as it was before this
        // sample. An empty or uniform window satisfies both.
        let mut is_max = true;
        let mut is_min = true;
        for value in self.window.iter() {
            is_max = is_max && measurement >= value;
            is_min = is_min && measurement <= value;
        }
        self.window.push(measurement);

        // Extrema are not trusted until the window is full.
        if !self.window.is_full() {
            return Ok(false);
        }

        // A maximum following a minimum (or vice versa) is an inflection.
        let mut inflection = false;
        if is_max {
            inflection = self.peak_kind == Some(PeakKind::Min);
            self.peak_kind = Some(PeakKind::Max);
        } else if is_min {
            inflection = self.peak_kind == Some(PeakKind::Max);
            self.peak_kind = Some(PeakKind::Min);
        }

        if inflection {
            self.peak_count += 1;
            self.peaks.push(measurement);
            self.peak_times_ms.push(now_ms);
            debug!(peak = measurement, count = self.peak_count, "inflection recorded");
        }

        // Amplitude convergence, assessed once five peaks are on record:
        // three pairwise differences over the earliest four peaks,
        // divided by 6.0, extrema seeded from the second-to-last peak.
        // The asymmetric windowing is intentional; gain scaling is
        // calibrated against this exact arithmetic, so do not "correct"
        // the divisor or the seeding.
        self.induced_amplitude = 0.0;
        if inflection && self.peak_count > 4 {
            let peaks: Vec<f64> = self.peaks.iter().collect();
            let n = peaks.len();
            let mut abs_max = peaks[n - 2];
            let mut abs_min = peaks[n - 2];
            for i in 0..n - 2 {
                self.induced_amplitude += (peaks[i] - peaks[i + 1]).abs();
                abs_max = abs_max.max(peaks[i]);
                abs_min = abs_min.min(peaks[i]);
            }
            self.induced_amplitude /= 6.0;

            let amplitude_dev =
                (0.5 * (abs_max - abs_min) - self.induced_amplitude) / self.induced_amplitude;
            debug!(
                amplitude = self.induced_amplitude,
                deviation = amplitude_dev,
                "induced oscillation"
            );
            if amplitude_dev < AMPLITUDE_TOLERANCE {
                self.state = TunerState::Succeeded;
            }
        }

        // Unconverged runs are abandoned after the peak budget; this
        // check outranks a convergence on the same sample.
        if self.peak_count >= FAILURE_PEAK_COUNT {
            self.output = 0.0;
            self.state = TunerState::Failed;
            return Ok(true);
        }

        if self.state == TunerState::Succeeded {
            self.output = 0.0;

            let ultimate_gain =
                4.0 * self.config.output_step / (self.induced_amplitude * PI);

            // Two period estimates from peak timestamps four apart
            // (matching extrema one full cycle apart), averaged.
            let times: Vec<f64> = self.peak_times_ms.iter().collect();
            let period1_ms = times[3] - times[1];
            let period2_ms = times[4] - times[2];
            let ultimate_period_s = 0.5 * (period1_ms + period2_ms) / 1000.0;

            debug!(ultimate_gain, ultimate_period_s, "relay test converged");
            self.estimate = Some(RelayEstimate {
                ultimate_gain,
                ultimate_period_s,
            });
            return Ok(true);
        }

        Ok(false)
    }

    /// Convert the converged estimate into PID gains under `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`TuneError::NotConverged`] unless the tuner is in
    /// [`TunerState::Succeeded`].
    pub fn derive_gains(&self, rule: TuningRule) -> TuneResult<PidGains> {
        if self.state != TunerState::Succeeded {
            return Err(TuneError::NotConverged);
        }
        let estimate = self.estimate.ok_or(TuneError::NotConverged)?;
        Ok(rule.gains(estimate.ultimate_gain, estimate.ultimate_period_s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuner() -> RelayAutotuner {
        // setpoint 20 degC, +/-2 A relay, 1 degC band, 1 s samples, 5 s lookback
        RelayAutotuner::new(TunerConfig {
            setpoint: 20.0,
            output_step: 2.0,
            noise_band: 1.0,
            sample_interval_s: 1.0,
            lookback_s: 5.0,
        })
        .unwrap()
    }

    #[test]
    fn step_while_off_is_a_misuse_error() {
        let mut tuner = tuner();
        assert_eq!(
            tuner.step(20.0, 0.0),
            Err(TuneError::NotRunning {
                state: TunerState::Off
            })
        );
    }

    #[test]
    fn first_step_enters_step_up() {
        let mut tuner = tuner();
        tuner.arm();
        assert_eq!(tuner.state(), TunerState::Ready);
        assert_eq!(tuner.step(20.0, 1.0), Ok(false));
        assert_eq!(tuner.state(), TunerState::StepUp);
        assert_eq!(tuner.output(), -2.0);
    }

    #[test]
    fn no_peak_logic_before_window_fills() {
        let mut tuner = tuner();
        tuner.arm();
        // Constant input at the setpoint: never finishes, never flips.
        for k in 0..4 {
            assert_eq!(tuner.step(20.0, k as f64), Ok(false));
            assert_eq!(tuner.state(), TunerState::StepUp);
            assert_eq!(tuner.buffered_samples(), k + 1);
        }
        assert!(tuner.buffered_samples() < tuner.window_capacity());
        // Even long after the window fills, a flat signal records no
        // inflection.
        for k in 4..40 {
            assert_eq!(tuner.step(20.0, k as f64), Ok(false));
        }
        assert_eq!(tuner.peak_count(), 0);
    }

    #[test]
    fn hysteresis_flips_the_relay() {
        let mut tuner = tuner();
        tuner.arm();
        tuner.step(20.0, 0.0).unwrap();
        assert_eq!(tuner.state(), TunerState::StepUp);
        // Above setpoint + band: step down, output +step.
        tuner.step(21.5, 1.0).unwrap();
        assert_eq!(tuner.state(), TunerState::StepDown);
        assert_eq!(tuner.output(), 2.0);
        // Inside the band: no flip.
        tuner.step(20.5, 2.0).unwrap();
        assert_eq!(tuner.state(), TunerState::StepDown);
        // Below setpoint - band: back to step up.
        tuner.step(18.5, 3.0).unwrap();
        assert_eq!(tuner.state(), TunerState::StepUp);
        assert_eq!(tuner.output(), -2.0);
    }

    #[test]
    fn disarm_from_any_state_zeroes_output() {
        let mut tuner = tuner();
        tuner.disarm();
        assert_eq!(tuner.state(), TunerState::Off);

        tuner.arm();
        tuner.disarm();
        assert_eq!(tuner.state(), TunerState::Off);
        assert_eq!(tuner.output(), 0.0);

        tuner.arm();
        tuner.step(25.0, 0.0).unwrap();
        assert_ne!(tuner.output(), 0.0);
        tuner.disarm();
        assert_eq!(tuner.state(), TunerState::Off);
        assert_eq!(tuner.output(), 0.0);
    }

    #[test]
    fn configure_rejects_bad_parameters() {
        let mut tuner = tuner();
        let capacity = tuner.window_capacity();

        let mut config = *tuner.config();
        config.setpoint = f64::NAN;
        assert!(matches!(
            tuner.configure(config),
            Err(TuneError::NonFinite { what: "setpoint", .. })
        ));

        let mut config = *tuner.config();
        config.sample_interval_s = 0.0;
        assert!(tuner.configure(config).is_err());

        let mut config = *tuner.config();
        config.output_step = -1.0;
        assert!(tuner.configure(config).is_err());

        // Lookback shorter than half a sample interval rounds to zero.
        let mut config = *tuner.config();
        config.lookback_s = 0.4;
        config.sample_interval_s = 1.0;
        assert!(tuner.configure(config).is_err());

        // A rejected call leaves the tuner untouched.
        assert_eq!(tuner.window_capacity(), capacity);
        assert_eq!(tuner.state(), TunerState::Off);
    }

    #[test]
    fn configure_clears_the_sample_window() {
        let mut tuner = tuner();
        tuner.arm();
        for k in 0..5 {
            tuner.step(20.0, k as f64).unwrap();
        }
        assert_eq!(tuner.buffered_samples(), 5);

        let mut config = *tuner.config();
        config.lookback_s = 3.0;
        tuner.configure(config).unwrap();
        assert_eq!(tuner.buffered_samples(), 0);
        assert_eq!(tuner.window_capacity(), 3);
        // State is untouched by configure.
        assert_eq!(tuner.state(), TunerState::StepUp);
    }

    #[test]
    fn gains_unavailable_before_convergence() {
        let mut tuner = tuner();
        for rule in TuningRule::ALL {
            assert_eq!(tuner.derive_gains(rule), Err(TuneError::NotConverged));
        }
        tuner.arm();
        tuner.step(20.0, 0.0).unwrap();
        assert_eq!(
            tuner.derive_gains(TuningRule::ZieglerNichols),
            Err(TuneError::NotConverged)
        );
        assert!(tuner.estimate().is_none());
    }

    #[test]
    fn arm_clears_peak_history() {
        let mut tuner = tuner();
        tuner.arm();
        // Drive a few inflections with a square wave; three cycles stays
        // below the five-peak convergence check.
        let mut t = 0.0;
        for _ in 0..3 {
            for _ in 0..4 {
                t += 1.0;
                tuner.step(25.0, t).unwrap();
            }
            for _ in 0..4 {
                t += 1.0;
                tuner.step(15.0, t).unwrap();
            }
        }
        assert!(tuner.peak_count() > 0);

        tuner.arm();
        assert_eq!(tuner.peak_count(), 0);
        assert_eq!(tuner.buffered_samples(), 0);
        assert_eq!(tuner.state(), TunerState::Ready);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn output_stays_within_relay_levels(
            samples in prop::collection::vec(-50.0_f64..150.0_f64, 1..200)
        ) {
            let mut tuner = RelayAutotuner::new(TunerConfig {
                setpoint: 20.0,
                output_step: 2.0,
                noise_band: 1.0,
                sample_interval_s: 1.0,
                lookback_s: 4.0,
            }).unwrap();
            tuner.arm();

            for (k, value) in samples.iter().enumerate() {
                let finished = tuner.step(*value, k as f64).unwrap();
                prop_assert!(tuner.output().abs() <= 2.0);
                prop_assert!(tuner.buffered_samples() <= tuner.window_capacity());
                if finished {
                    prop_assert_eq!(tuner.output(), 0.0);
                    break;
                }
            }
        }
    }
}
