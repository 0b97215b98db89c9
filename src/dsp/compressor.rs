//! Stereo-linked feed-forward compressor at the head of the master chain.
//!
//! A peak detector with separate attack/release smoothing drives a static
//! soft-knee curve. Parameters mirror a WebAudio `DynamicsCompressorNode`.

use serde::{Deserialize, Serialize};

use super::gain_to_db;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorSettings {
    /// dBFS.
    pub threshold: f64,
    pub ratio: f64,
    /// Knee width in dB; 0 is a hard knee.
    pub knee: f64,
    /// Seconds.
    pub attack: f64,
    /// Seconds.
    pub release: f64,
    /// Gain added after compression, in dB.
    pub makeup: f64,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        CompressorSettings {
            threshold: -24.0,
            ratio: 3.0,
            knee: 6.0,
            attack: 0.003,
            release: 0.25,
            makeup: 0.0,
        }
    }
}

impl CompressorSettings {
    fn sanitized(self) -> Self {
        CompressorSettings {
            threshold: self.threshold.clamp(-60.0, 0.0),
            ratio: self.ratio.clamp(1.0, 20.0),
            knee: self.knee.clamp(0.0, 40.0),
            attack: self.attack.clamp(1e-4, 1.0),
            release: self.release.clamp(1e-3, 5.0),
            makeup: self.makeup.clamp(-24.0, 24.0),
        }
    }

    /// Static curve: gain change in dB (never positive) at `level_db`.
    fn curve(&self, level_db: f64) -> f64 {
        let slope = 1.0 - self.ratio.recip();
        let over = level_db - self.threshold;
        let half = self.knee * 0.5;
        if over <= -half {
            0.0
        } else if over >= half {
            -over * slope
        } else {
            // quadratic blend across the knee
            let into = over + half;
            -slope * into * into / (2.0 * self.knee)
        }
    }
}

/// Smoothed peak level of the linked channels.
#[derive(Debug, Clone, Copy)]
struct Detector {
    rise: f64,
    fall: f64,
    level: f64,
}

impl Detector {
    fn new(attack: f64, release: f64, sample_rate: f64) -> Self {
        let pole = |seconds: f64| (-(seconds * sample_rate).recip()).exp();
        Detector {
            rise: pole(attack),
            fall: pole(release),
            level: 0.0,
        }
    }

    #[inline]
    fn follow(&mut self, peak: f64) -> f64 {
        let pole = if peak > self.level { self.rise } else { self.fall };
        self.level = peak + (self.level - peak) * pole;
        self.level
    }
}

#[derive(Debug, Clone)]
pub struct Compressor {
    settings: CompressorSettings,
    detector: Detector,
}

impl Compressor {
    pub fn new(sample_rate: f64, settings: CompressorSettings) -> Self {
        let settings = settings.sanitized();
        Compressor {
            detector: Detector::new(settings.attack, settings.release, sample_rate),
            settings,
        }
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    /// Current reduction in dB, as a positive number.
    pub fn gain_reduction(&self) -> f64 {
        -self.settings.curve(gain_to_db(self.detector.level))
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let peak = f64::from(left.abs().max(right.abs()));
        let level = self.detector.follow(peak);
        let change = self.settings.curve(gain_to_db(level)) + self.settings.makeup;
        let gain = 10f64.powf(change / 20.0) as f32;
        (left * gain, right * gain)
    }

    pub fn reset(&mut self) {
        self.detector.level = 0.0;
    }
}
