//! Voice mixer - renders scheduled voices against a frame counter
//!
//! The mixer is the "graph" side of the engine: it owns the voices that have
//! been handed over by the scheduler and sums them into output blocks. The
//! audio clock is the shared frame counter, advanced after every block.
//!
//! # Real-Time Safety
//! - Voices arrive through a lock-free SPSC ring (`rtrb`)
//! - The active voice list is pre-allocated
//! - No locks or blocking calls in `render`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

use super::voice::{ActiveVoice, Voice};

/// Default number of simultaneously sounding voices reserved up front
pub const DEFAULT_MAX_ACTIVE_VOICES: usize = 64;

/// Create the SPSC queue carrying voices from the scheduler to the mixer.
pub fn voice_queue(capacity: usize) -> (Producer<Voice>, Consumer<Voice>) {
    RingBuffer::new(capacity.max(1))
}

/// Convert a frame count into seconds on the audio clock.
#[inline]
pub fn frames_to_seconds(frames: u64, sample_rate: u32) -> f64 {
    frames as f64 / sample_rate as f64
}

pub struct VoiceMixer {
    sample_rate: u32,
    active: Vec<ActiveVoice>,
    frame_counter: Arc<AtomicU64>,
}

impl VoiceMixer {
    pub fn new(sample_rate: u32, frame_counter: Arc<AtomicU64>) -> Self {
        Self {
            sample_rate,
            active: Vec::with_capacity(DEFAULT_MAX_ACTIVE_VOICES),
            frame_counter,
        }
    }

    pub fn active_voices(&self) -> usize {
        self.active.len()
    }

    pub fn add_voice(&mut self, voice: Voice) {
        self.active.push(ActiveVoice::new(voice, self.sample_rate));
    }

    /// Move every queued voice into the active list.
    pub fn drain(&mut self, incoming: &mut Consumer<Voice>) {
        while let Ok(voice) = incoming.pop() {
            self.add_voice(voice);
        }
    }

    /// Render one interleaved block and advance the audio clock.
    ///
    /// # Arguments
    /// * `output` - Interleaved buffer, `frames * channels` samples
    /// * `channels` - Channel count; the mono mix is copied to every channel
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frame_count = output.len() / channels;
        let start_frame = self.frame_counter.load(Ordering::Relaxed);
        let dt = 1.0 / self.sample_rate as f64;

        for (i, frame) in output.chunks_mut(channels).enumerate() {
            let t = frames_to_seconds(start_frame + i as u64, self.sample_rate);
            let mut mixed = 0.0_f32;
            for voice in self.active.iter_mut() {
                mixed += voice.render(t, dt);
            }
            let mixed = mixed.clamp(-1.0, 1.0);
            for sample in frame.iter_mut() {
                *sample = mixed;
            }
        }

        let end_frame = start_frame + frame_count as u64;
        self.frame_counter.store(end_frame, Ordering::Relaxed);

        let end_time = frames_to_seconds(end_frame, self.sample_rate);
        self.active.retain(|voice| !voice.is_finished(end_time));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::param::ParamTimeline;
    use crate::audio::voice::{VoiceSource, Waveform};

    fn click(start: f64, stop: f64) -> Voice {
        Voice {
            source: VoiceSource::Oscillator {
                waveform: Waveform::Square,
                frequency: ParamTimeline::constant(100.0),
            },
            gain: ParamTimeline::constant(0.5),
            start,
            stop,
        }
    }

    #[test]
    fn test_render_advances_frame_counter() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut mixer = VoiceMixer::new(1000, Arc::clone(&counter));
        let mut block = vec![0.0; 64];
        mixer.render(&mut block, 2);
        assert_eq!(counter.load(Ordering::Relaxed), 32);
    }

    #[test]
    fn test_voice_starts_at_exact_frame() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut mixer = VoiceMixer::new(1000, Arc::clone(&counter));
        mixer.add_voice(click(0.010, 0.020));

        let mut block = vec![0.0; 32];
        mixer.render(&mut block, 1);

        assert!(block[..10].iter().all(|&s| s == 0.0));
        assert_eq!(block[10], 0.5);
        assert!(block[20..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_finished_voices_are_dropped() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut mixer = VoiceMixer::new(1000, counter);
        mixer.add_voice(click(0.0, 0.005));
        mixer.add_voice(click(0.0, 0.5));

        let mut block = vec![0.0; 16];
        mixer.render(&mut block, 1);
        assert_eq!(mixer.active_voices(), 1);
    }

    #[test]
    fn test_drain_moves_queued_voices() {
        let (mut producer, mut consumer) = voice_queue(4);
        producer.push(click(0.0, 1.0)).unwrap();
        producer.push(click(0.5, 1.0)).unwrap();

        let mut mixer = VoiceMixer::new(1000, Arc::new(AtomicU64::new(0)));
        mixer.drain(&mut consumer);
        assert_eq!(mixer.active_voices(), 2);
    }

    #[test]
    fn test_mix_is_clamped() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut mixer = VoiceMixer::new(1000, counter);
        for _ in 0..4 {
            mixer.add_voice(click(0.0, 1.0));
        }
        let mut block = vec![0.0; 8];
        mixer.render(&mut block, 1);
        assert!(block.iter().all(|&s| s.abs() <= 1.0));
        assert_eq!(block[0], 1.0);
    }
}
