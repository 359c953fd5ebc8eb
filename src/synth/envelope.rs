//! Gain envelope shapes shared by the timbre renderers.

use crate::audio::ParamTimeline;

/// Level an exponential decay ends at (-60 dB)
pub const DECAY_FLOOR: f32 = 0.001;

/// Instant onset at `peak`, exponential decay to [`DECAY_FLOOR`] over `decay` seconds.
pub fn exponential_decay(start: f64, peak: f32, decay: f64) -> ParamTimeline {
    ParamTimeline::new(0.0)
        .set_value_at(peak, start)
        .exponential_ramp_to(DECAY_FLOOR, start + decay)
}

/// Instant onset held briefly before decaying, so the first cycle is not
/// smeared by the ramp.
pub fn held_exponential_decay(start: f64, peak: f32, hold: f64, decay: f64) -> ParamTimeline {
    ParamTimeline::new(0.0)
        .set_value_at(peak, start)
        .exponential_ramp_to(peak, start + hold)
        .exponential_ramp_to(DECAY_FLOOR, start + decay)
}

/// Linear attack from silence to `peak`, then exponential decay ending
/// `decay` seconds after `start`.
pub fn attack_decay(start: f64, peak: f32, attack: f64, decay: f64) -> ParamTimeline {
    ParamTimeline::new(0.0)
        .set_value_at(0.0, start)
        .linear_ramp_to(peak, start + attack)
        .exponential_ramp_to(DECAY_FLOOR, start + decay)
}

/// Pitch sweep from `from_hz` to `to_hz` over `duration` seconds.
pub fn pitch_sweep(start: f64, from_hz: f32, to_hz: f32, duration: f64) -> ParamTimeline {
    ParamTimeline::new(from_hz)
        .set_value_at(from_hz, start)
        .exponential_ramp_to(to_hz, start + duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_decay_peaks_after_attack() {
        let env = attack_decay(2.0, 0.8, 0.005, 0.05);
        assert_eq!(env.value_at(2.0), 0.0);
        assert!((env.value_at(2.005) - 0.8).abs() < 1e-4);
        assert!(env.value_at(2.03) < 0.8);
        assert!((env.value_at(2.05) - DECAY_FLOOR).abs() < 1e-6);
    }

    #[test]
    fn test_exponential_decay_starts_at_peak() {
        let env = exponential_decay(1.0, 1.0, 0.5);
        assert_eq!(env.value_at(0.999), 0.0);
        assert_eq!(env.value_at(1.0), 1.0);
        assert!(env.value_at(1.25) < 0.1);
    }

    #[test]
    fn test_pitch_sweep_endpoints() {
        let sweep = pitch_sweep(0.0, 880.0, 440.0, 0.05);
        assert_eq!(sweep.value_at(0.0), 880.0);
        assert!((sweep.value_at(0.05) - 440.0).abs() < 1e-3);
        assert!((sweep.value_at(1.0) - 440.0).abs() < 1e-3);
    }
}
