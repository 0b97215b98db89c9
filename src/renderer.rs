//! Renders a soundscape offline to a WAV byte buffer.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use crate::config::EngineConfig;
use crate::engine::SoundscapeEngine;
use crate::error::{AmbientError, Result};

/// A second mode to crossfade to part-way through a render.
#[derive(Debug, Clone, Copy)]
pub struct ModeChange<'a> {
    pub mode: &'a str,
    pub at_seconds: f64,
}

/// Play `mode` from silence for `seconds` and return interleaved stereo.
pub fn render_samples(
    config: EngineConfig,
    mode: &str,
    seconds: f64,
    change: Option<ModeChange<'_>>,
) -> Result<Vec<f32>> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(AmbientError::config(format!("render length must be non-negative, got {seconds}")));
    }
    let mut engine = SoundscapeEngine::new(config)?;
    engine.initialize()?;
    engine.set_mode(mode);
    engine.set_playing(true)?;

    let sample_rate = engine.sample_rate();
    let total = (seconds * sample_rate).round() as usize;
    let split = change
        .map(|c| (c.at_seconds.clamp(0.0, seconds) * sample_rate).round() as usize)
        .unwrap_or(total);

    let mut samples = vec![0.0; total * 2];
    engine.render(&mut samples[..split * 2]);
    if let Some(change) = change {
        engine.set_mode(change.mode);
        engine.render(&mut samples[split * 2..]);
    }
    engine.dispose();
    Ok(samples)
}

/// Render to a WAV file as bytes (16-bit stereo PCM).
pub fn render_wav(
    config: EngineConfig,
    mode: &str,
    seconds: f64,
    change: Option<ModeChange<'_>>,
) -> Result<Vec<u8>> {
    let sample_rate = config.sample_rate.round() as u32;
    let samples = render_samples(config, mode, seconds, change)?;
    encode_wav(&samples, sample_rate)
}

pub fn write_wav(
    path: &Path,
    config: EngineConfig,
    mode: &str,
    seconds: f64,
    change: Option<ModeChange<'_>>,
) -> Result<()> {
    let bytes = render_wav(config, mode, seconds, change)?;
    std::fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote WAV");
    Ok(())
}

fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig {
            sample_rate: 8_000.0,
            ..EngineConfig::seeded(5)
        }
    }

    #[test]
    fn wav_header_valid() {
        let wav = render_wav(config(), "focus", 0.25, None).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");

        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 8_000);
        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 2);
    }

    #[test]
    fn wav_size_correct() {
        let wav = render_wav(config(), "sleep", 0.5, None).unwrap();
        // 4000 frames * 2 channels * 2 bytes
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.len(), 8_000);
        assert_eq!(reader.duration(), 4_000);
    }

    #[test]
    fn seeded_renders_are_reproducible() {
        let a = render_samples(config(), "odyssey", 1.0, None).unwrap();
        let b = render_samples(config(), "odyssey", 1.0, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mode_change_mid_render() {
        let change = ModeChange {
            mode: "relax",
            at_seconds: 1.5,
        };
        let samples = render_samples(config(), "move", 3.0, Some(change)).unwrap();
        assert_eq!(samples.len(), 48_000);
        assert!(samples.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    }

    #[test]
    fn negative_length_is_rejected() {
        let err = render_wav(config(), "focus", -1.0, None).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn write_wav_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focus.wav");
        write_wav(&path, config(), "focus", 0.1, None).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
    }
}
