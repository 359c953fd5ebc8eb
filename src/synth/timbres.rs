//! Per-timbre voice construction.
//!
//! Every function builds one self-contained [`Voice`] for a note starting at
//! `time`. Accent selects the first-beat-of-bar variant.

use std::sync::Arc;

use crate::audio::{HighpassSpec, NoiseBuffer, ParamTimeline, Voice, VoiceSource, Waveform};

use super::envelope::{attack_decay, exponential_decay, held_exponential_decay, pitch_sweep};

pub const DIGITAL_ACCENT_HZ: f32 = 1000.0;
pub const DIGITAL_BEAT_HZ: f32 = 800.0;
pub const DIGITAL_DECAY_SECS: f64 = 0.05;

pub const ANALOG_ACCENT_SWEEP_HZ: (f32, f32) = (880.0, 440.0);
pub const ANALOG_BEAT_SWEEP_HZ: (f32, f32) = (440.0, 220.0);
pub const ANALOG_ATTACK_SECS: f64 = 0.005;
pub const ANALOG_DECAY_SECS: f64 = 0.05;

pub const KICK_START_HZ: f32 = 150.0;
/// Exponential sweeps cannot reach zero; the kick bottoms out here
pub const KICK_END_HZ: f32 = 0.01;
pub const KICK_DECAY_SECS: f64 = 0.5;

pub const HAT_HIGHPASS_HZ: f32 = 8000.0;
pub const HAT_DECAY_SECS: f64 = 0.05;

pub const WOODBLOCK_ACCENT_HZ: f32 = 1200.0;
pub const WOODBLOCK_BEAT_HZ: f32 = 800.0;
pub const WOODBLOCK_ATTACK_SECS: f64 = 0.001;
pub const WOODBLOCK_DECAY_SECS: f64 = 0.1;

fn oscillator(waveform: Waveform, frequency: ParamTimeline) -> VoiceSource {
    VoiceSource::Oscillator {
        waveform,
        frequency,
    }
}

/// Plain sine beep with a short exponential decay.
pub fn digital(accent: bool, time: f64) -> Voice {
    let hz = if accent {
        DIGITAL_ACCENT_HZ
    } else {
        DIGITAL_BEAT_HZ
    };

    Voice {
        source: oscillator(Waveform::Sine, ParamTimeline::constant(hz)),
        gain: held_exponential_decay(time, 1.0, 0.001, DIGITAL_DECAY_SECS),
        start: time,
        stop: time + DIGITAL_DECAY_SECS,
    }
}

/// Triangle blip with a one-octave downward pitch sweep.
pub fn analog(accent: bool, time: f64) -> Voice {
    let (from, to) = if accent {
        ANALOG_ACCENT_SWEEP_HZ
    } else {
        ANALOG_BEAT_SWEEP_HZ
    };

    Voice {
        source: oscillator(
            Waveform::Triangle,
            pitch_sweep(time, from, to, ANALOG_DECAY_SECS),
        ),
        gain: attack_decay(time, 0.8, ANALOG_ATTACK_SECS, ANALOG_DECAY_SECS),
        start: time,
        stop: time + ANALOG_DECAY_SECS,
    }
}

/// Synthesized kick drum: a sine dropping from 150 Hz towards zero.
pub fn kick(time: f64) -> Voice {
    Voice {
        source: oscillator(
            Waveform::Sine,
            pitch_sweep(time, KICK_START_HZ, KICK_END_HZ, KICK_DECAY_SECS),
        ),
        gain: exponential_decay(time, 1.0, KICK_DECAY_SECS),
        start: time,
        stop: time + KICK_DECAY_SECS,
    }
}

/// Highpassed noise burst reading from the shared noise buffer.
pub fn hat(time: f64, noise: &Arc<NoiseBuffer>) -> Voice {
    Voice {
        source: VoiceSource::Noise {
            buffer: Arc::clone(noise),
            highpass: Some(HighpassSpec::new(HAT_HIGHPASS_HZ)),
        },
        gain: exponential_decay(time, 0.6, HAT_DECAY_SECS),
        start: time,
        stop: time + HAT_DECAY_SECS,
    }
}

/// Sine knock with a fast linear attack and a longer decay.
pub fn woodblock(accent: bool, time: f64) -> Voice {
    let hz = if accent {
        WOODBLOCK_ACCENT_HZ
    } else {
        WOODBLOCK_BEAT_HZ
    };

    Voice {
        source: oscillator(Waveform::Sine, ParamTimeline::constant(hz)),
        gain: attack_decay(time, 1.0, WOODBLOCK_ATTACK_SECS, WOODBLOCK_DECAY_SECS),
        start: time,
        stop: time + WOODBLOCK_DECAY_SECS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digital_pitches() {
        let accent = digital(true, 1.0);
        let beat = digital(false, 1.0);
        assert_eq!(accent.frequency().unwrap().value_at(1.0), 1000.0);
        assert_eq!(beat.frequency().unwrap().value_at(1.0), 800.0);
        assert_eq!(accent.waveform(), Some(Waveform::Sine));
        assert!((accent.duration() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_analog_sweeps_an_octave() {
        let accent = analog(true, 0.0);
        let freq = accent.frequency().unwrap();
        assert_eq!(freq.value_at(0.0), 880.0);
        assert!((freq.value_at(0.05) - 440.0).abs() < 1e-3);

        let beat = analog(false, 0.0);
        let freq = beat.frequency().unwrap();
        assert_eq!(freq.value_at(0.0), 440.0);
        assert!((freq.value_at(0.05) - 220.0).abs() < 1e-3);
        assert_eq!(beat.waveform(), Some(Waveform::Triangle));
    }

    #[test]
    fn test_analog_attack_is_linear() {
        let voice = analog(true, 0.0);
        assert_eq!(voice.gain.value_at(0.0), 0.0);
        assert!((voice.gain.value_at(0.0025) - 0.4).abs() < 1e-3);
    }

    #[test]
    fn test_kick_gain_decays_exponentially() {
        let voice = kick(2.0);
        assert_eq!(voice.gain.value_at(2.0), 1.0);
        // Halfway through the decay sits at the geometric mean of 1.0 and the floor
        let mid = voice.gain.value_at(2.25);
        assert!((mid - 0.001_f32.sqrt()).abs() < 1e-4, "got {}", mid);
        assert!((voice.gain.value_at(2.5) - 0.001).abs() < 1e-6);

        let mut last = f32::MAX;
        for step in 0..=50 {
            let level = voice.gain.value_at(2.0 + step as f64 * 0.01);
            assert!(level < last, "kick gain rose at step {}", step);
            last = level;
        }
    }

    #[test]
    fn test_kick_drops_towards_zero() {
        let voice = kick(0.0);
        let freq = voice.frequency().unwrap();
        assert_eq!(freq.value_at(0.0), 150.0);
        assert!(freq.value_at(0.49) < 1.0);
        assert!((voice.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_hat_uses_shared_noise() {
        let noise = Arc::new(NoiseBuffer::generate(48000, 1.0));
        let voice = hat(0.0, &noise);
        match &voice.source {
            VoiceSource::Noise { buffer, highpass } => {
                assert!(Arc::ptr_eq(buffer, &noise));
                assert_eq!(highpass.unwrap().cutoff_hz, 8000.0);
            }
            other => panic!("expected noise source, got {:?}", other),
        }
    }

    #[test]
    fn test_woodblock_pitches_and_length() {
        assert_eq!(
            woodblock(true, 0.0).frequency().unwrap().value_at(0.0),
            1200.0
        );
        assert_eq!(
            woodblock(false, 0.0).frequency().unwrap().value_at(0.0),
            800.0
        );
        assert!((woodblock(true, 0.0).duration() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_woodblock_attack_is_linear() {
        let voice = woodblock(false, 3.0);
        assert_eq!(voice.gain.value_at(3.0), 0.0);
        assert!((voice.gain.value_at(3.0005) - 0.5).abs() < 1e-3);
        assert!((voice.gain.value_at(3.001) - 1.0).abs() < 1e-4);
        assert!(voice.gain.value_at(3.05) < 1.0);
    }
}
