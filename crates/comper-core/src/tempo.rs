//! Tempo ramp and the smoothed UI tempo readout

use serde::{Deserialize, Serialize};

/// Display smoothing time constant in seconds
pub const SMOOTHING_TAU_SECS: f64 = 0.3;

/// Default practice ramp: 65 to 140 BPM over 65 minutes
const DEFAULT_RAMP_START_BPM: f64 = 65.0;
const DEFAULT_RAMP_END_BPM: f64 = 140.0;
const DEFAULT_RAMP_DURATION_SECS: f64 = 3900.0;

/// Linear tempo ramp, clamped at both ends.
///
/// Evaluated against elapsed playback time, not wall-clock time, so a
/// stopped-and-restarted transport starts the ramp over rather than
/// skipping ahead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoRamp {
    pub start_bpm: f64,
    pub end_bpm: f64,
    pub duration_secs: f64,
}

impl Default for TempoRamp {
    fn default() -> Self {
        Self {
            start_bpm: DEFAULT_RAMP_START_BPM,
            end_bpm: DEFAULT_RAMP_END_BPM,
            duration_secs: DEFAULT_RAMP_DURATION_SECS,
        }
    }
}

impl TempoRamp {
    pub fn new(start_bpm: f64, end_bpm: f64, duration_secs: f64) -> Self {
        Self {
            start_bpm,
            end_bpm,
            duration_secs,
        }
    }

    /// A flat ramp pinned to one tempo
    pub fn constant(bpm: f64) -> Self {
        Self {
            start_bpm: bpm,
            end_bpm: bpm,
            duration_secs: 0.0,
        }
    }

    /// Instantaneous tempo after `elapsed_secs` of playback
    pub fn bpm_at(&self, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 {
            return self.start_bpm;
        }
        if self.duration_secs <= 0.0 || elapsed_secs >= self.duration_secs {
            return self.end_bpm;
        }
        let progress = elapsed_secs / self.duration_secs;
        self.start_bpm + (self.end_bpm - self.start_bpm) * progress
    }
}

/// Exponential moving average over the ramp tempo, for a jitter-free
/// numeric display
#[derive(Debug, Clone, Copy)]
pub struct TempoSmoother {
    tau_secs: f64,
    value: f64,
}

impl TempoSmoother {
    pub fn new(initial_bpm: f64) -> Self {
        Self::with_tau(initial_bpm, SMOOTHING_TAU_SECS)
    }

    pub fn with_tau(initial_bpm: f64, tau_secs: f64) -> Self {
        Self {
            tau_secs,
            value: initial_bpm,
        }
    }

    /// Integrate toward `target_bpm` over a tick of `dt_secs`.
    ///
    /// A zero, negative, or non-finite `dt` (first tick after a resume, a
    /// suspended-host gap) snaps straight to the target instead of
    /// integrating, so a stall never produces a runaway jump.
    pub fn update(&mut self, target_bpm: f64, dt_secs: f64) -> f64 {
        if dt_secs <= 0.0 || !dt_secs.is_finite() {
            self.value = target_bpm;
        } else {
            let alpha = 1.0 - (-dt_secs / self.tau_secs).exp();
            self.value += alpha * (target_bpm - self.value);
        }
        self.value
    }

    pub fn bpm(&self) -> f64 {
        self.value
    }

    /// One-decimal readout for the transport bar
    pub fn display(&self) -> String {
        format!("{:.1}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_endpoints_and_clamping() {
        let ramp = TempoRamp::new(65.0, 140.0, 3900.0);
        assert_eq!(ramp.bpm_at(0.0), 65.0);
        assert_eq!(ramp.bpm_at(-5.0), 65.0);
        assert_eq!(ramp.bpm_at(3900.0), 140.0);
        assert_eq!(ramp.bpm_at(10_000.0), 140.0);
        assert_eq!(ramp.bpm_at(1950.0), 102.5);
    }

    #[test]
    fn test_ramp_monotonic_when_ascending() {
        let ramp = TempoRamp::new(65.0, 140.0, 100.0);
        let mut last = ramp.bpm_at(0.0);
        for i in 1..=200 {
            let bpm = ramp.bpm_at(i as f64);
            assert!(bpm >= last);
            last = bpm;
        }
    }

    #[test]
    fn test_zero_duration_ramp_sits_at_end_tempo() {
        let ramp = TempoRamp::new(65.0, 140.0, 0.0);
        assert_eq!(ramp.bpm_at(0.0), 65.0);
        assert_eq!(ramp.bpm_at(0.001), 140.0);
    }

    #[test]
    fn test_smoother_converges_on_tempo_jump() {
        // Jump from 65 to 140, ticked at 10 Hz for one second
        let mut smoother = TempoSmoother::with_tau(65.0, 0.3);
        for _ in 0..10 {
            smoother.update(140.0, 0.1);
        }
        let expected = 140.0 - (140.0 - 65.0) * (-1.0f64 / 0.3).exp();
        assert!((smoother.bpm() - expected).abs() < expected * 0.05);
    }

    #[test]
    fn test_smoother_stays_within_ramp_range() {
        let mut smoother = TempoSmoother::with_tau(65.0, 0.3);
        for _ in 0..1000 {
            let bpm = smoother.update(140.0, 0.016);
            assert!((65.0..=140.0).contains(&bpm));
        }
        assert!((smoother.bpm() - 140.0).abs() < 0.01);
    }

    #[test]
    fn test_smoother_snaps_on_bogus_dt() {
        let mut smoother = TempoSmoother::with_tau(65.0, 0.3);
        assert_eq!(smoother.update(120.0, 0.0), 120.0);
        assert_eq!(smoother.update(90.0, -0.5), 90.0);
        assert_eq!(smoother.update(70.0, f64::NAN), 70.0);
        assert_eq!(smoother.update(80.0, f64::INFINITY), 80.0);
    }

    #[test]
    fn test_smoother_display_precision() {
        let smoother = TempoSmoother::new(119.9472);
        assert_eq!(smoother.display(), "119.9");
    }
}
