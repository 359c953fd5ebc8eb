//! Noise buffer - shared white noise for drum hits
//!
//! The buffer is generated once per engine lifetime and shared by every
//! noise voice through an `Arc`. Key properties:
//! - Fixed length (duration chosen at generation time)
//! - Deterministic content (fixed seed, identical output across runs)
//! - Immutable after generation

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed for deterministic noise generation
const NOISE_SEED: u64 = 42;

/// Immutable block of white noise samples in range [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl NoiseBuffer {
    /// Generates `duration_secs` of white noise at `sample_rate`.
    ///
    /// # Examples
    /// ```
    /// use click_engine::audio::NoiseBuffer;
    ///
    /// let noise = NoiseBuffer::generate(48000, 1.0);
    /// assert_eq!(noise.len(), 48000);
    /// ```
    pub fn generate(sample_rate: u32, duration_secs: f64) -> Self {
        let num_samples = (sample_rate as f64 * duration_secs.max(0.0)).round() as usize;

        let mut rng = StdRng::seed_from_u64(NOISE_SEED);

        let mut samples: Vec<f32> = Vec::with_capacity(num_samples);
        for _ in 0..num_samples {
            samples.push(rng.gen_range(-1.0..1.0));
        }

        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Sample at `index`, or silence past the end of the buffer.
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.samples.get(index).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_buffer_length() {
        for &sr in &[44100, 48000, 96000] {
            let noise = NoiseBuffer::generate(sr, 1.0);
            assert_eq!(noise.len(), sr as usize, "one second at {} Hz", sr);
            assert!((noise.duration_secs() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_noise_buffer_range() {
        let noise = NoiseBuffer::generate(48000, 0.5);
        for (i, &sample) in noise.samples().iter().enumerate() {
            assert!(
                (-1.0..=1.0).contains(&sample),
                "Sample {} at index {} is out of range [-1.0, 1.0]",
                sample,
                i
            );
        }
    }

    #[test]
    fn test_noise_buffer_deterministic() {
        let a = NoiseBuffer::generate(48000, 0.1);
        let b = NoiseBuffer::generate(48000, 0.1);
        assert_eq!(a, b, "Generation should be deterministic");
    }

    #[test]
    fn test_noise_buffer_reads_silence_past_end() {
        let noise = NoiseBuffer::generate(1000, 0.01);
        assert_eq!(noise.len(), 10);
        assert_eq!(noise.get(10), 0.0);
        assert_eq!(noise.get(usize::MAX), 0.0);
    }
}
