//! Smoothed pseudo-intensity ("how busy does this sound") for visualizers.
//!
//! The value is cosmetic: it drives visualizations and never feeds back into
//! synthesis. While playing it is re-evaluated once per period on the audio
//! clock and held in between; while paused it is exactly 0.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::IntensityConfig;
use crate::mode::IntensityProfile;

/// Lock-free handle for reading the latest intensity from any thread.
#[derive(Debug, Clone, Default)]
pub struct IntensityReader(Arc<AtomicU32>);

impl IntensityReader {
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// `clamp01(center + swing * sin(t_ms * rate) + U(0, jitter))`
pub fn evaluate(profile: &IntensityProfile, t_ms: f64, rng: &mut fastrand::Rng) -> f64 {
    let base = profile.center + profile.swing * (t_ms * profile.rate_per_ms).sin();
    (base + rng.f64() * profile.jitter).clamp(0.0, 1.0)
}

#[derive(Debug)]
pub struct IntensityEstimator {
    profile: IntensityProfile,
    period_samples: u64,
    sample_rate: f64,
    next_update: Option<u64>,
    playing: bool,
    rng: fastrand::Rng,
    shared: IntensityReader,
}

impl IntensityEstimator {
    pub fn new(config: IntensityConfig, profile: IntensityProfile, sample_rate: f64, seed: u64) -> Self {
        let period_samples = (config.period_ms as f64 / 1000.0 * sample_rate).round().max(1.0) as u64;
        IntensityEstimator {
            profile,
            period_samples,
            sample_rate,
            next_update: None,
            playing: false,
            rng: fastrand::Rng::with_seed(seed),
            shared: IntensityReader::default(),
        }
    }

    pub fn reader(&self) -> IntensityReader {
        self.shared.clone()
    }

    pub fn value(&self) -> f32 {
        self.shared.get()
    }

    pub fn profile(&self) -> &IntensityProfile {
        &self.profile
    }

    /// Takes effect at the next period boundary.
    pub fn set_profile(&mut self, profile: IntensityProfile) {
        self.profile = profile;
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
        if !playing {
            self.next_update = None;
            self.shared.set(0.0);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Called with the audio clock position at the start of each block.
    pub fn advance(&mut self, now: u64) {
        if !self.playing {
            return;
        }
        let due = self.next_update.is_none_or(|at| now >= at);
        if due {
            let t_ms = now as f64 / self.sample_rate * 1000.0;
            let value = evaluate(&self.profile, t_ms, &mut self.rng);
            self.shared.set(value as f32);
            self.next_update = Some(now + self.period_samples);
        }
    }
}
