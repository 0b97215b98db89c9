//! Engine configuration.
//!
//! Every field has a default, so a JSON file only needs the values it wants
//! to change:
//!
//! ```json
//! { "sample_rate": 48000, "seed": 7, "crossfade": { "steps": 40 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::compressor::CompressorSettings;
use crate::error::{AmbientError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f64,
    /// Seed for every random choice the engine makes; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Mode used before the first `set_mode` call.
    pub default_mode: String,
    /// How far ahead of the render position pattern ticks are scheduled.
    pub lookahead_seconds: f64,
    /// Frames per render quantum.
    pub block_size: usize,
    /// Per-layer phase offset, as a fraction of one subdivision.
    pub stagger_fraction: f64,
    pub crossfade: CrossfadeConfig,
    pub generate: GenerateConfig,
    pub intensity: IntensityConfig,
    pub master: MasterConfig,
    pub player: PlayerConfig,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            seed: None,
            default_mode: "focus".to_string(),
            lookahead_seconds: 0.1,
            block_size: 128,
            stagger_fraction: 0.1,
            crossfade: CrossfadeConfig::default(),
            generate: GenerateConfig::default(),
            intensity: IntensityConfig::default(),
            master: MasterConfig::default(),
            player: PlayerConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Fade window: `steps` volume steps, `step_ms` apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeConfig {
    pub steps: u32,
    pub step_ms: u32,
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            steps: 20,
            step_ms: 50,
        }
    }
}

impl CrossfadeConfig {
    pub fn window_seconds(&self) -> f64 {
        self.steps as f64 * self.step_ms as f64 / 1000.0
    }
}

/// Ramp times used when a mode is (re)generated outside a crossfade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    pub filter_ramp_seconds: f64,
    pub volume_ramp_seconds: f64,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            filter_ramp_seconds: 2.0,
            volume_ramp_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityConfig {
    /// Update period of the intensity signal.
    pub period_ms: u32,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self { period_ms: 100 }
    }
}

/// Master reverb, fixed at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// RT60 in seconds.
    pub decay: f64,
    /// Damping (0.0 to 1.0).
    pub damping: f64,
    /// Dry/wet mix (0.0 to 1.0).
    pub wet: f64,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            decay: 8.0,
            damping: 0.4,
            wet: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    pub compressor: CompressorSettings,
    pub reverb: ReverbConfig,
    /// Linear gain before the soft clipper.
    pub output_gain: f32,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            compressor: CompressorSettings::default(),
            reverb: ReverbConfig::default(),
            output_gain: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Longest `set_playing` waits for the audio side to confirm.
    pub confirm_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_ms: 250,
        }
    }
}

/// Bounded retry for engine initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// A default config with a fixed seed, for reproducible output.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Reject values the engine cannot run with.
    ///
    /// The sample rate is not checked here; `initialize` reports an unusable
    /// rate as an initialization failure.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(AmbientError::config(format!("{name} must be positive, got {value}")))
            }
        };
        positive("lookahead_seconds", self.lookahead_seconds)?;
        positive("generate.filter_ramp_seconds", self.generate.filter_ramp_seconds)?;
        positive("generate.volume_ramp_seconds", self.generate.volume_ramp_seconds)?;
        if !(0.0..1.0).contains(&self.stagger_fraction) {
            return Err(AmbientError::config(format!(
                "stagger_fraction must be in [0, 1), got {}",
                self.stagger_fraction
            )));
        }
        if self.block_size == 0 {
            return Err(AmbientError::config("block_size must be at least 1"));
        }
        if self.crossfade.steps == 0 || self.crossfade.step_ms == 0 {
            return Err(AmbientError::config("crossfade steps and step_ms must be non-zero"));
        }
        if self.intensity.period_ms == 0 {
            return Err(AmbientError::config("intensity.period_ms must be non-zero"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AmbientError::config("retry.max_attempts must be at least 1"));
        }
        if !self.master.output_gain.is_finite() || self.master.output_gain < 0.0 {
            return Err(AmbientError::config("master.output_gain must be a non-negative number"));
        }
        Ok(())
    }
}
