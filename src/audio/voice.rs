//! One-shot voices scheduled onto the output graph.
//!
//! A `Voice` is a self-contained description of a single click: a source
//! (oscillator or noise player), a gain envelope, and absolute start/stop
//! times on the audio clock. Once handed to a backend it needs no further
//! attention; the mixer drops it after its stop time.

use std::f64::consts::TAU;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::filter::{Biquad, HighpassSpec};
use super::noise::NoiseBuffer;
use super::param::ParamTimeline;

/// Periodic oscillator shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
}

impl Waveform {
    /// Sample the waveform at normalized `phase` in [0, 1).
    #[inline]
    pub fn sample(self, phase: f64) -> f32 {
        match self {
            Waveform::Sine => (phase * TAU).sin() as f32,
            Waveform::Triangle => (1.0 - 4.0 * (phase - 0.25 - (phase - 0.25).round()).abs()) as f32,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Sound source feeding a voice's gain stage.
#[derive(Debug, Clone)]
pub enum VoiceSource {
    Oscillator {
        waveform: Waveform,
        frequency: ParamTimeline,
    },
    Noise {
        buffer: Arc<NoiseBuffer>,
        highpass: Option<HighpassSpec>,
    },
}

/// A single scheduled sound event.
#[derive(Debug, Clone)]
pub struct Voice {
    pub source: VoiceSource,
    pub gain: ParamTimeline,
    /// Absolute audio-clock time (seconds) at which the source starts
    pub start: f64,
    /// Absolute audio-clock time (seconds) at which the source stops
    pub stop: f64,
}

impl Voice {
    pub fn duration(&self) -> f64 {
        (self.stop - self.start).max(0.0)
    }

    /// Frequency timeline for oscillator voices.
    pub fn frequency(&self) -> Option<&ParamTimeline> {
        match &self.source {
            VoiceSource::Oscillator { frequency, .. } => Some(frequency),
            VoiceSource::Noise { .. } => None,
        }
    }

    pub fn waveform(&self) -> Option<Waveform> {
        match &self.source {
            VoiceSource::Oscillator { waveform, .. } => Some(*waveform),
            VoiceSource::Noise { .. } => None,
        }
    }

    pub fn is_noise(&self) -> bool {
        matches!(self.source, VoiceSource::Noise { .. })
    }
}

/// Rendering state for a voice owned by the mixer.
#[derive(Debug)]
pub struct ActiveVoice {
    voice: Voice,
    phase: f64,
    noise_position: usize,
    filter: Option<Biquad>,
}

impl ActiveVoice {
    pub fn new(voice: Voice, sample_rate: u32) -> Self {
        let filter = match &voice.source {
            VoiceSource::Noise {
                highpass: Some(spec),
                ..
            } => Some(Biquad::highpass(*spec, sample_rate)),
            _ => None,
        };

        Self {
            voice,
            phase: 0.0,
            noise_position: 0,
            filter,
        }
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    /// Render the sample at clock time `t`; `dt` is one sample period.
    #[inline]
    pub fn render(&mut self, t: f64, dt: f64) -> f32 {
        if t < self.voice.start || t >= self.voice.stop {
            return 0.0;
        }

        let raw = match &self.voice.source {
            VoiceSource::Oscillator {
                waveform,
                frequency,
            } => {
                let sample = waveform.sample(self.phase);
                let hz = frequency.value_at(t) as f64;
                self.phase = (self.phase + hz * dt).rem_euclid(1.0);
                sample
            }
            VoiceSource::Noise { buffer, .. } => {
                let sample = buffer.get(self.noise_position);
                self.noise_position += 1;
                sample
            }
        };

        let shaped = match self.filter.as_mut() {
            Some(filter) => filter.process(raw),
            None => raw,
        };

        shaped * self.voice.gain.value_at(t)
    }

    pub fn is_finished(&self, t: f64) -> bool {
        t >= self.voice.stop
    }
}
