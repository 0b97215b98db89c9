//! Pitched sources: a phase accumulator feeding a waveform shaper.
//!
//! Discontinuous shapes (saw, square) are smoothed with PolyBLEP so the
//! pad and melody layers stay clean at high pitches. Pitch changes can be
//! immediate or glide at a constant rate in cents, which is how the drone
//! layer moves between notes without retriggering.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

#[derive(Debug, Clone, Copy)]
struct Glide {
    /// Per-sample frequency multiplier.
    ratio: f64,
    target: f64,
    remaining: usize,
}

#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    frequency: f64,
    phase: f64,
    sample_rate: f64,
    glide: Option<Glide>,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency: 440.0,
            phase: 0.0,
            sample_rate,
            glide: None,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Change the shape; phase and pitch carry on uninterrupted.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Jump to `frequency`, cancelling any glide.
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
        self.glide = None;
    }

    /// Slide to `frequency` over `seconds`, keeping phase.
    pub fn glide_to(&mut self, frequency: f64, seconds: f64) {
        let remaining = (seconds.max(0.0) * self.sample_rate) as usize;
        if remaining == 0 || self.frequency <= 0.0 || frequency <= 0.0 {
            self.set_frequency(frequency);
            return;
        }
        self.glide = Some(Glide {
            ratio: (frequency / self.frequency).powf((remaining as f64).recip()),
            target: frequency,
            remaining,
        });
    }

    pub fn is_gliding(&self) -> bool {
        self.glide.is_some()
    }

    /// Restart the cycle at phase 0.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        self.step_glide();
        let step = self.frequency / self.sample_rate;
        let phase = self.phase;
        let out = match self.waveform {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Sawtooth => 2.0 * phase - 1.0 - blep(phase, step),
            Waveform::Square => {
                let level = if phase < 0.5 { 1.0 } else { -1.0 };
                level + blep(phase, step) - blep((phase + 0.5).fract(), step)
            }
        };
        self.phase = (phase + step).fract();
        out
    }

    fn step_glide(&mut self) {
        let Some(glide) = self.glide.as_mut() else {
            return;
        };
        glide.remaining -= 1;
        if glide.remaining == 0 {
            self.frequency = glide.target;
            self.glide = None;
        } else {
            self.frequency *= glide.ratio;
        }
    }
}

/// Polynomial band-limited step residual for a unit jump at phase 0.
///
/// `phase` is in [0, 1), `step` is the per-sample phase increment.
#[inline]
fn blep(phase: f64, step: f64) -> f64 {
    if phase < step {
        let x = phase / step;
        -(x - 1.0) * (x - 1.0)
    } else if phase > 1.0 - step {
        let x = (phase - 1.0) / step;
        (x + 1.0) * (x + 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];

    #[test]
    fn sine_starts_at_zero_and_triangle_at_trough() {
        let mut sine = Oscillator::new(Waveform::Sine, 8_000.0);
        assert_abs_diff_eq!(sine.next_sample(), 0.0, epsilon = 1e-12);
        let mut tri = Oscillator::new(Waveform::Triangle, 8_000.0);
        assert_abs_diff_eq!(tri.next_sample(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn outputs_stay_bounded_at_drone_and_melody_pitches() {
        for waveform in ALL {
            for frequency in [55.0, 880.0] {
                let mut osc = Oscillator::new(waveform, 44_100.0);
                osc.set_frequency(frequency);
                for _ in 0..44_100 {
                    let s = osc.next_sample();
                    assert!(s.abs() <= 1.5, "{waveform:?} at {frequency} Hz: {s}");
                }
            }
        }
    }

    #[test]
    fn one_cycle_per_period() {
        // 100 Hz at 8 kHz: 80 samples per cycle
        let mut osc = Oscillator::new(Waveform::Sine, 8_000.0);
        osc.set_frequency(100.0);
        let first: Vec<f64> = (0..80).map(|_| osc.next_sample()).collect();
        let second: Vec<f64> = (0..80).map(|_| osc.next_sample()).collect();
        for (a, b) in first.iter().zip(&second) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn glide_rises_to_target_and_stops() {
        let mut osc = Oscillator::new(Waveform::Sine, 1_000.0);
        osc.set_frequency(110.0);
        osc.glide_to(220.0, 0.5);
        assert!(osc.is_gliding());

        let mut last = osc.frequency();
        for _ in 0..500 {
            osc.next_sample();
            assert!(osc.frequency() >= last - 1e-9);
            last = osc.frequency();
        }
        assert_eq!(osc.frequency(), 220.0);
        assert!(!osc.is_gliding());
    }

    #[test]
    fn instant_glide_and_retune_cancel_the_slide() {
        let mut osc = Oscillator::new(Waveform::Sine, 44_100.0);
        osc.glide_to(330.0, 0.0);
        assert_eq!(osc.frequency(), 330.0);
        osc.glide_to(660.0, 1.0);
        osc.set_frequency(440.0);
        osc.next_sample();
        assert_eq!(osc.frequency(), 440.0);
    }

    #[test]
    fn waveform_swap_keeps_pitch() {
        let mut osc = Oscillator::new(Waveform::Sawtooth, 8_000.0);
        osc.set_frequency(200.0);
        osc.next_sample();
        osc.set_waveform(Waveform::Triangle);
        assert_eq!(osc.waveform(), Waveform::Triangle);
        assert_eq!(osc.frequency(), 200.0);
    }
}
