//! A low-pass whose cutoff is swept by a slow sine LFO.
//!
//! The sweep is exponential around the base frequency: with `octaves = 2`
//! the cutoff travels from `base / 2` to `base * 2` over one LFO period.

use std::f64::consts::TAU;

use super::filter::{FilterType, StereoFilter};

#[derive(Debug, Clone)]
pub struct AutoFilter {
    filter: StereoFilter,
    phase: f64,
    phase_inc: f64,
    octaves: f64,
    /// Dry/wet mix (0.0 = fully dry, 1.0 = fully wet).
    pub mix: f32,
}

impl AutoFilter {
    pub fn new(sample_rate: f64, rate_hz: f64, base_frequency: f64, octaves: f64, mix: f64) -> Self {
        AutoFilter {
            filter: StereoFilter::new(FilterType::Lowpass, base_frequency, 1.0, sample_rate),
            phase: 0.0,
            phase_inc: rate_hz.max(0.0) / sample_rate,
            octaves: octaves.clamp(0.0, 6.0),
            mix: mix.clamp(0.0, 1.0) as f32,
        }
    }

    /// Cutoff multiplier for the current LFO position.
    fn sweep_ratio(&self) -> f64 {
        2.0_f64.powf(self.octaves * (TAU * self.phase).sin())
    }

    /// Process a stereo sample pair.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let ratio = self.sweep_ratio();
        self.phase = (self.phase + self.phase_inc) % 1.0;
        let (wet_l, wet_r) = self.filter.process_modulated(left, right, ratio);
        let mix = self.mix;
        (
            left * (1.0 - mix) + wet_l * mix,
            right * (1.0 - mix) + wet_r * mix,
        )
    }

    pub fn reset(&mut self) {
        self.filter.reset();
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_stays_within_octave_range() {
        let mut af = AutoFilter::new(1000.0, 1.0, 100.0, 2.0, 1.0);
        for _ in 0..1000 {
            let ratio = af.sweep_ratio();
            assert!((0.25 - 1e-9..=4.0 + 1e-9).contains(&ratio), "ratio {ratio}");
            af.process(0.0, 0.0);
        }
    }

    #[test]
    fn filters_high_content() {
        let mut af = AutoFilter::new(44100.0, 0.05, 200.0, 1.0, 1.0);
        let mut peak = 0.0_f32;
        for i in 0..8820 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let (l, _) = af.process(x, x);
            if i > 4410 {
                peak = peak.max(l.abs());
            }
        }
        assert!(peak < 0.05, "nyquist tone should be removed, got {peak}");
    }
}
