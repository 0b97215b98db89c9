//! Second-order filters with a rampable cutoff.
//!
//! Coefficients follow the Audio EQ Cookbook (the same responses as a
//! WebAudio `BiquadFilterNode`); samples run through a transposed direct
//! form II section per channel. Both channels share one coefficient set.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use super::ramp::Ramp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Lowpass,
    Bandpass,
}

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Coefficients {
    fn design(kind: FilterType, frequency: f64, q: f64, sample_rate: f64) -> Self {
        let w0 = TAU * frequency / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        let norm = (1.0 + alpha).recip();
        let (b0, b1, b2) = match kind {
            FilterType::Lowpass => {
                let side = (1.0 - cos) * 0.5;
                (side, 1.0 - cos, side)
            }
            // constant 0 dB peak gain
            FilterType::Bandpass => (alpha, 0.0, -alpha),
        };
        Coefficients {
            b0: b0 * norm,
            b1: b1 * norm,
            b2: b2 * norm,
            a1: -2.0 * cos * norm,
            a2: (1.0 - alpha) * norm,
        }
    }
}

/// Per-channel filter memory.
#[derive(Debug, Clone, Copy, Default)]
struct Section {
    s1: f64,
    s2: f64,
}

impl Section {
    #[inline]
    fn tick(&mut self, c: &Coefficients, x: f64) -> f64 {
        let y = c.b0 * x + self.s1;
        self.s1 = c.b1 * x - c.a1 * y + self.s2;
        self.s2 = c.b2 * x - c.a2 * y;
        y
    }
}

/// Coefficients are redesigned at most this often while the cutoff moves.
const RETUNE_INTERVAL: usize = 32;

/// Stereo biquad whose cutoff (or band centre) can be ramped linearly.
#[derive(Debug, Clone)]
pub struct StereoFilter {
    kind: FilterType,
    q: f64,
    sample_rate: f64,
    coefficients: Coefficients,
    /// Frequency the current coefficients were designed for.
    tuned: f64,
    channels: [Section; 2],
    cutoff: Ramp,
    retune_in: usize,
}

impl StereoFilter {
    pub fn new(kind: FilterType, frequency: f64, q: f64, sample_rate: f64) -> Self {
        let q = q.max(0.01);
        let mut filter = StereoFilter {
            kind,
            q,
            sample_rate,
            coefficients: Coefficients::design(kind, 1_000.0, q, sample_rate),
            tuned: 1_000.0,
            channels: [Section::default(); 2],
            cutoff: Ramp::new(frequency),
            retune_in: 0,
        };
        filter.retune(frequency);
        filter
    }

    /// Current (possibly mid-ramp) frequency.
    pub fn frequency(&self) -> f64 {
        self.cutoff.value()
    }

    pub fn target_frequency(&self) -> f64 {
        self.cutoff.target()
    }

    /// Frequency the filter is actually tuned to, after Nyquist clamping.
    pub fn tuned_frequency(&self) -> f64 {
        self.tuned
    }

    /// Ramp the frequency to `frequency` over `seconds`.
    pub fn ramp_frequency(&mut self, frequency: f64, seconds: f64) {
        let samples = (seconds.max(0.0) * self.sample_rate) as usize;
        self.cutoff.ramp_to(frequency, samples);
        if samples == 0 {
            self.retune(frequency);
        }
    }

    fn retune(&mut self, frequency: f64) {
        let frequency = frequency.clamp(10.0, self.sample_rate * 0.49);
        if frequency != self.tuned {
            self.tuned = frequency;
            self.coefficients = Coefficients::design(self.kind, frequency, self.q, self.sample_rate);
        }
    }

    #[inline]
    fn run(&mut self, left: f32, right: f32) -> (f32, f32) {
        let c = self.coefficients;
        let [l, r] = &mut self.channels;
        (l.tick(&c, left as f64) as f32, r.tick(&c, right as f64) as f32)
    }

    /// Filter with the frequency scaled by `ratio` around its ramped value.
    #[inline]
    pub fn process_modulated(&mut self, left: f32, right: f32, ratio: f64) -> (f32, f32) {
        let was_ramping = self.cutoff.is_ramping();
        let base = self.cutoff.next_value();
        let landed = was_ramping && !self.cutoff.is_ramping();
        if self.retune_in == 0 || landed {
            self.retune(base * ratio);
            self.retune_in = RETUNE_INTERVAL;
        }
        self.retune_in -= 1;
        self.run(left, right)
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        if self.cutoff.is_ramping() {
            self.process_modulated(left, right, 1.0)
        } else {
            self.run(left, right)
        }
    }

    pub fn reset(&mut self) {
        self.channels = [Section::default(); 2];
    }
}
