//! Second-order highpass filter used to shape noise hits.

use std::f32::consts::PI;

/// Filter description carried by a voice; the mixer instantiates the
/// stateful [`Biquad`] once it knows the output sample rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighpassSpec {
    pub cutoff_hz: f32,
    pub q: f32,
}

impl HighpassSpec {
    pub fn new(cutoff_hz: f32) -> Self {
        Self {
            cutoff_hz,
            q: std::f32::consts::FRAC_1_SQRT_2,
        }
    }
}

/// Direct form I biquad (RBJ cookbook coefficients).
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    pub fn highpass(spec: HighpassSpec, sample_rate: u32) -> Self {
        let nyquist = sample_rate as f32 * 0.5;
        let cutoff = spec.cutoff_hz.clamp(1.0, nyquist * 0.99);
        let w0 = 2.0 * PI * cutoff / sample_rate as f32;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * spec.q.max(0.01));

        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 + cos_w0) / 2.0) / a0,
            b1: (-(1.0 + cos_w0)) / a0,
            b2: ((1.0 + cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}
