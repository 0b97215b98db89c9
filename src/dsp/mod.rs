//! Synthesis and effect nodes in pure Rust.
//!
//! Every node runs one sample at a time on the audio timeline. Nodes that
//! own delay lines allocate them through [`alloc_buffer`], so a failed
//! allocation surfaces as an error instead of aborting the process.

pub mod auto_filter;
pub mod chorus;
pub mod compressor;
pub mod delay;
pub mod distortion;
pub mod effect;
pub mod envelope;
pub mod filter;
pub mod mixer;
pub mod noise;
pub mod oscillator;
pub mod ramp;
pub mod reverb;
pub mod synth;
pub mod voice;

use thiserror::Error;

/// Longest delay line any node may request (ten seconds at 192 kHz).
pub const MAX_BUFFER_SAMPLES: usize = 192_000 * 10;

/// Gain levels at or below this are treated as silence.
pub const SILENCE_FLOOR_DB: f64 = -80.0;

/// A node could not acquire the memory it needs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("sample rate {0} Hz is not usable")]
    InvalidSampleRate(f64),
    #[error("{name} needs {samples} samples, limit is {MAX_BUFFER_SAMPLES}")]
    BufferTooLarge { name: &'static str, samples: usize },
    #[error("{name} could not allocate {samples} samples")]
    OutOfMemory { name: &'static str, samples: usize },
}

/// Check that a sample rate can drive the DSP graph.
pub fn check_sample_rate(sample_rate: f64) -> Result<(), NodeError> {
    if sample_rate.is_finite() && (8_000.0..=192_000.0).contains(&sample_rate) {
        Ok(())
    } else {
        Err(NodeError::InvalidSampleRate(sample_rate))
    }
}

/// Allocate a zeroed delay-line buffer of `samples` length.
pub fn alloc_buffer(name: &'static str, samples: usize) -> Result<Vec<f32>, NodeError> {
    if samples > MAX_BUFFER_SAMPLES {
        return Err(NodeError::BufferTooLarge { name, samples });
    }
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(samples)
        .map_err(|_| NodeError::OutOfMemory { name, samples })?;
    buffer.resize(samples, 0.0);
    Ok(buffer)
}

/// Convert decibels to linear gain. Anything at or below the silence floor is 0.
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    if db <= SILENCE_FLOOR_DB || db.is_nan() {
        0.0
    } else {
        10.0_f64.powf(db / 20.0)
    }
}

/// Convert linear gain to decibels, clamped at the silence floor.
#[inline]
pub fn gain_to_db(gain: f64) -> f64 {
    if gain <= 0.0 {
        SILENCE_FLOOR_DB
    } else {
        (20.0 * gain.log10()).max(SILENCE_FLOOR_DB)
    }
}
