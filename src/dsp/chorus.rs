//! Stereo chorus that widens the pad layer.
//!
//! Each channel reads a short delay line at a position swept by a shared
//! sine LFO; the right channel's sweep runs a quarter cycle ahead.

use std::f64::consts::TAU;

use super::{NodeError, alloc_buffer};

/// Longest base delay plus sweep the lines can hold.
const MAX_DELAY_SECONDS: f64 = 0.05;
/// Centre of the sweep.
const BASE_DELAY_SECONDS: f64 = 0.015;
const RIGHT_PHASE_OFFSET: f64 = 0.25;

/// A delay line read at fractional positions.
#[derive(Debug, Clone)]
struct SweptLine {
    buffer: Vec<f32>,
    head: usize,
}

impl SweptLine {
    fn new(len: usize) -> Result<Self, NodeError> {
        Ok(SweptLine {
            buffer: alloc_buffer("chorus", len)?,
            head: 0,
        })
    }

    /// Write `input`, then read `delay` samples back (linear interpolation).
    #[inline]
    fn push_and_read(&mut self, input: f32, delay: f64) -> f32 {
        let len = self.buffer.len();
        self.buffer[self.head] = input;
        let whole = delay as usize;
        let frac = (delay - whole as f64) as f32;
        let near = self.buffer[(self.head + len - whole) % len];
        let far = self.buffer[(self.head + 2 * len - whole - 1) % len];
        self.head = (self.head + 1) % len;
        near + (far - near) * frac
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.head = 0;
    }
}

#[derive(Debug, Clone)]
pub struct Chorus {
    left: SweptLine,
    right: SweptLine,
    sample_rate: f64,
    lfo_phase: f64,
    /// Sweep rate in Hz.
    pub rate: f64,
    /// Sweep depth in seconds either side of the base delay.
    pub depth: f64,
    pub mix: f64,
}

impl Chorus {
    pub fn new(sample_rate: f64, rate: f64, depth: f64, mix: f64) -> Result<Self, NodeError> {
        let len = (sample_rate * MAX_DELAY_SECONDS) as usize + 2;
        Ok(Chorus {
            left: SweptLine::new(len)?,
            right: SweptLine::new(len)?,
            sample_rate,
            lfo_phase: 0.0,
            rate: rate.clamp(0.05, 10.0),
            depth: depth.clamp(0.0, 0.01),
            mix: mix.clamp(0.0, 1.0),
        })
    }

    fn delay_at(&self, phase: f64) -> f64 {
        let limit = (self.left.buffer.len() - 2) as f64;
        let seconds = BASE_DELAY_SECONDS + self.depth * (TAU * phase).sin();
        (seconds * self.sample_rate).clamp(1.0, limit)
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let delay_l = self.delay_at(self.lfo_phase);
        let delay_r = self.delay_at(self.lfo_phase + RIGHT_PHASE_OFFSET);
        let wet_l = self.left.push_and_read(left, delay_l);
        let wet_r = self.right.push_and_read(right, delay_r);
        self.lfo_phase = (self.lfo_phase + self.rate / self.sample_rate).fract();

        let wet = self.mix as f32;
        let dry = 1.0 - wet;
        (left * dry + wet_l * wet, right * dry + wet_r * wet)
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
        self.lfo_phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_mix_is_transparent() {
        let mut chorus = Chorus::new(44_100.0, 0.8, 0.003, 0.0).unwrap();
        for i in 0..100 {
            let x = (i as f32 * 0.1).sin();
            assert_eq!(chorus.process(x, -x), (x, -x));
        }
    }

    #[test]
    fn wet_signal_arrives_after_the_base_delay() {
        let mut chorus = Chorus::new(8_000.0, 0.8, 0.0, 1.0).unwrap();
        // 15 ms at 8 kHz
        let out: Vec<f32> = (0..200)
            .map(|i| chorus.process(if i == 0 { 1.0 } else { 0.0 }, 0.0).0)
            .collect();
        let arrival = out.iter().position(|&s| s > 0.5).unwrap();
        assert_eq!(arrival, 120);
    }

    #[test]
    fn steady_input_gives_steady_output() {
        let mut chorus = Chorus::new(44_100.0, 2.0, 0.003, 1.0).unwrap();
        let out: Vec<f32> = (0..4_410).map(|_| chorus.process(1.0, 1.0).0).collect();
        assert!(out[3_000..].iter().all(|s| (s - 1.0).abs() < 1e-3));
    }

    #[test]
    fn channels_sweep_apart() {
        let mut chorus = Chorus::new(44_100.0, 1.5, 0.002, 1.0).unwrap();
        let spread = (0..4_410).any(|i| {
            let x = (i as f32 * 0.05).sin();
            let (l, r) = chorus.process(x, x);
            (l - r).abs() > 1e-3
        });
        assert!(spread);
    }

    #[test]
    fn clear_silences_the_lines() {
        let mut chorus = Chorus::new(8_000.0, 1.0, 0.002, 1.0).unwrap();
        for _ in 0..500 {
            chorus.process(1.0, 1.0);
        }
        chorus.clear();
        assert!((0..500).all(|_| chorus.process(0.0, 0.0) == (0.0, 0.0)));
    }
}
