//! The five independently synthesized layers of a soundscape.
//!
//! A layer owns its synth and its effect list outright. Both are built once,
//! in a fixed order, and released together by [`Layer::dispose`].

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::dsp::auto_filter::AutoFilter;
use crate::dsp::chorus::Chorus;
use crate::dsp::delay::Delay;
use crate::dsp::distortion::Distortion;
use crate::dsp::effect::{Effect, EffectKind};
use crate::dsp::envelope::EnvelopeShape;
use crate::dsp::filter::{FilterType, StereoFilter};
use crate::dsp::noise::NoiseColor;
use crate::dsp::oscillator::Waveform;
use crate::dsp::ramp::Ramp;
use crate::dsp::reverb::Reverb;
use crate::dsp::synth::{NoteEvent, Synth, SynthKind};
use crate::dsp::{NodeError, db_to_gain};
use crate::error::{AmbientError, Result};
use crate::pattern::NoteRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerId {
    Pad,
    Drone,
    Pulse,
    Texture,
    Melody,
}

impl LayerId {
    pub const ALL: [LayerId; 5] = [
        LayerId::Pad,
        LayerId::Drone,
        LayerId::Pulse,
        LayerId::Texture,
        LayerId::Melody,
    ];

    /// Position in [`LayerId::ALL`]; also the layer's stagger multiplier.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayerId::Pad => "pad",
            LayerId::Drone => "drone",
            LayerId::Pulse => "pulse",
            LayerId::Texture => "texture",
            LayerId::Melody => "melody",
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The synth and effect nodes of one layer.
#[derive(Debug, Clone)]
pub struct LayerPatch {
    pub synth: Synth,
    pub effects: Vec<Effect>,
    /// Fixed scaling applied after the effects, so polyphonic layers leave headroom.
    pub headroom: f32,
}

impl LayerPatch {
    /// Build the fixed recipe for `id`. Any node that fails to allocate
    /// drops everything built before it.
    pub fn build(id: LayerId, sample_rate: f64, seed: u64) -> std::result::Result<Self, NodeError> {
        let sr = sample_rate;
        let lowpass = |hz: f64, q: f64| Effect::Filter(StereoFilter::new(FilterType::Lowpass, hz, q, sr));

        let patch = match id {
            LayerId::Pad => LayerPatch {
                synth: Synth::new(
                    SynthKind::Poly {
                        waveform: Waveform::Sawtooth,
                        voices: 8,
                    },
                    EnvelopeShape::new(2.0, 1.0, 0.8, 4.0),
                    sr,
                    seed,
                ),
                effects: vec![
                    lowpass(1200.0, 0.7),
                    Effect::Chorus(Chorus::new(sr, 0.8, 0.003, 0.5)?),
                    Effect::Reverb(Reverb::new(sr, 6.0, 0.5, 0.4)?),
                ],
                headroom: 0.3,
            },
            LayerId::Drone => LayerPatch {
                synth: Synth::new(
                    SynthKind::Mono {
                        waveform: Waveform::Sine,
                        glide: 1.5,
                    },
                    EnvelopeShape::new(4.0, 2.0, 0.9, 6.0),
                    sr,
                    seed,
                ),
                effects: vec![
                    lowpass(400.0, 0.7),
                    Effect::AutoFilter(AutoFilter::new(sr, 0.05, 300.0, 1.5, 1.0)),
                ],
                headroom: 1.0,
            },
            LayerId::Pulse => LayerPatch {
                synth: Synth::new(
                    SynthKind::Mono {
                        waveform: Waveform::Triangle,
                        glide: 0.0,
                    },
                    EnvelopeShape::new(0.001, 0.2, 0.0, 0.1),
                    sr,
                    seed,
                ),
                effects: vec![
                    lowpass(800.0, 1.0),
                    Effect::Distortion(Distortion::new(0.3, 0.4)),
                    Effect::Delay(Delay::new(sr, 2.0, 0.375, 0.35, 0.3)?.ping_pong()),
                ],
                headroom: 1.0,
            },
            LayerId::Texture => LayerPatch {
                synth: Synth::new(
                    SynthKind::Noise {
                        color: NoiseColor::Pink,
                    },
                    EnvelopeShape::new(2.0, 1.0, 1.0, 3.0),
                    sr,
                    seed,
                ),
                effects: vec![
                    Effect::Filter(StereoFilter::new(FilterType::Bandpass, 800.0, 1.2, sr)),
                    Effect::Reverb(Reverb::new(sr, 5.0, 0.6, 0.5)?),
                ],
                headroom: 1.0,
            },
            LayerId::Melody => LayerPatch {
                synth: Synth::new(
                    SynthKind::Poly {
                        waveform: Waveform::Triangle,
                        voices: 6,
                    },
                    EnvelopeShape::new(0.05, 0.3, 0.4, 1.5),
                    sr,
                    seed,
                ),
                effects: vec![
                    Effect::Delay(Delay::new(sr, 2.0, 0.5, 0.4, 0.3)?),
                    Effect::Reverb(Reverb::new(sr, 7.0, 0.5, 0.45)?),
                ],
                headroom: 0.5,
            },
        };
        Ok(patch)
    }
}

/// One layer of the soundscape: a patch plus its volume control.
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    patch: Option<LayerPatch>,
    gain: Ramp,
    target_db: f64,
    sample_rate: f64,
}

impl Layer {
    /// Build a silent layer (gain 0) with its fixed recipe.
    pub fn new(id: LayerId, sample_rate: f64, seed: u64) -> Result<Self> {
        let patch = LayerPatch::build(id, sample_rate, seed)
            .map_err(|e| AmbientError::init(format!("{id} layer: {e}")))?;
        debug!(layer = %id, effects = patch.effects.len(), "layer built");
        Ok(Layer {
            id,
            patch: Some(patch),
            gain: Ramp::new(0.0),
            target_db: crate::dsp::SILENCE_FLOOR_DB,
            sample_rate,
        })
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    fn ramp_samples(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate).round() as usize
    }

    /// Ramp the layer gain linearly to `db` over `ramp_seconds`.
    pub fn set_volume(&mut self, db: f64, ramp_seconds: f64) {
        self.target_db = db;
        let samples = self.ramp_samples(ramp_seconds);
        self.gain.ramp_to(db_to_gain(db), samples);
    }

    /// Ramp to a raw linear gain without touching the dB target.
    pub fn ramp_gain(&mut self, gain: f64, ramp_seconds: f64) {
        let samples = self.ramp_samples(ramp_seconds);
        self.gain.ramp_to(gain.max(0.0), samples);
    }

    /// Remember `db` as the layer's target without moving the gain.
    pub fn set_target_db(&mut self, db: f64) {
        self.target_db = db;
    }

    /// Current linear gain.
    pub fn gain(&self) -> f64 {
        self.gain.value()
    }

    pub fn target_db(&self) -> f64 {
        self.target_db
    }

    pub fn is_ramping(&self) -> bool {
        self.gain.is_ramping()
    }

    /// Queue a note to start exactly at absolute sample `at`.
    ///
    /// A time already behind `now` is played late rather than dropped.
    pub fn trigger_note(&mut self, request: NoteRequest, at: u64, now: u64) -> Result<()> {
        let id = self.id;
        let sample_rate = self.sample_rate;
        let patch = self
            .patch
            .as_mut()
            .ok_or(AmbientError::LayerDisposed { layer: id })?;
        let start = at.max(now);
        let length = request
            .duration
            .map(|seconds| (seconds.max(0.0) * sample_rate).round() as u64);
        patch.synth.schedule(NoteEvent {
            frequency: request.frequency,
            velocity: request.velocity,
            start,
            length,
        });
        Ok(())
    }

    /// Ramp the centre/cutoff of the layer's first filter.
    pub fn retarget_filter(&mut self, frequency: f64, ramp_seconds: f64) -> Result<()> {
        let patch = self.patch_mut()?;
        if let Some(filter) = patch.effects.iter_mut().find_map(Effect::as_filter_mut) {
            filter.ramp_frequency(frequency, ramp_seconds);
        }
        Ok(())
    }

    pub fn filter_frequency(&self) -> Option<f64> {
        self.patch.as_ref()?.effects.iter().find_map(|e| match e {
            Effect::Filter(f) => Some(f.target_frequency()),
            _ => None,
        })
    }

    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<()> {
        self.patch_mut()?.synth.set_waveform(waveform);
        Ok(())
    }

    /// Gate off everything and drop queued notes; tails ring out.
    pub fn release_all(&mut self) {
        if let Some(patch) = self.patch.as_mut() {
            patch.synth.release_all();
        }
    }

    /// Whether a mono/noise layer is currently holding a note.
    pub fn is_held(&self) -> bool {
        self.patch.as_ref().is_some_and(|p| p.synth.is_held())
    }

    pub fn pending_notes(&self) -> usize {
        self.patch.as_ref().map_or(0, |p| p.synth.pending())
    }

    /// Release the synth and every effect. Returns false if already disposed.
    pub fn dispose(&mut self) -> bool {
        let released = self.patch.take().is_some();
        if released {
            self.gain.set(0.0);
            debug!(layer = %self.id, "layer disposed");
        }
        released
    }

    pub fn is_live(&self) -> bool {
        self.patch.is_some()
    }

    /// Synth plus effects currently owned.
    pub fn node_count(&self) -> usize {
        self.patch.as_ref().map_or(0, |p| 1 + p.effects.len())
    }

    pub fn effect_kinds(&self) -> Vec<EffectKind> {
        self.patch
            .as_ref()
            .map(|p| p.effects.iter().map(Effect::kind).collect())
            .unwrap_or_default()
    }

    /// Render one stereo frame at absolute sample `now`.
    #[inline]
    pub fn process(&mut self, now: u64) -> (f32, f32) {
        let gain = self.gain.next_value() as f32;
        let Some(patch) = self.patch.as_mut() else {
            return (0.0, 0.0);
        };
        let dry = patch.synth.next_sample(now) as f32;
        let (mut left, mut right) = (dry, dry);
        for effect in &mut patch.effects {
            (left, right) = effect.process(left, right);
        }
        let out = gain * patch.headroom;
        (left * out, right * out)
    }

    fn patch_mut(&mut self) -> Result<&mut LayerPatch> {
        let id = self.id;
        self.patch
            .as_mut()
            .ok_or(AmbientError::LayerDisposed { layer: id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::SILENCE_FLOOR_DB;

    const SR: f64 = 8_000.0;

    fn note(frequency: f64) -> NoteRequest {
        NoteRequest {
            frequency,
            duration: Some(0.5),
            velocity: 0.9,
        }
    }

    #[test]
    fn recipes_have_fixed_effect_order() {
        let kinds = |id| Layer::new(id, SR, 1).unwrap().effect_kinds();
        assert_eq!(
            kinds(LayerId::Pad),
            vec![EffectKind::Filter, EffectKind::Chorus, EffectKind::Reverb]
        );
        assert_eq!(kinds(LayerId::Drone), vec![EffectKind::Filter, EffectKind::AutoFilter]);
        assert_eq!(
            kinds(LayerId::Pulse),
            vec![EffectKind::Filter, EffectKind::Distortion, EffectKind::Delay]
        );
        assert_eq!(kinds(LayerId::Texture), vec![EffectKind::Filter, EffectKind::Reverb]);
        assert_eq!(kinds(LayerId::Melody), vec![EffectKind::Delay, EffectKind::Reverb]);
    }

    #[test]
    fn set_volume_ramp_is_bounded_and_monotonic() {
        let mut layer = Layer::new(LayerId::Pad, SR, 1).unwrap();
        let target = db_to_gain(-12.0);
        layer.set_volume(-12.0, 0.5);
        let mut last = 0.0;
        for now in 0..(SR as u64) {
            layer.process(now);
            let g = layer.gain();
            assert!((0.0..=target + 1e-12).contains(&g), "gain {g} escaped [0, {target}]");
            assert!(g >= last);
            last = g;
        }
        assert_eq!(layer.gain(), target);
        assert_eq!(layer.target_db(), -12.0);
    }

    #[test]
    fn silence_floor_maps_to_zero_gain() {
        let mut layer = Layer::new(LayerId::Drone, SR, 1).unwrap();
        layer.set_volume(SILENCE_FLOOR_DB, 0.0);
        assert_eq!(layer.gain(), 0.0);
    }

    #[test]
    fn scheduled_note_is_silent_until_its_sample() {
        let mut layer = Layer::new(LayerId::Melody, SR, 1).unwrap();
        layer.set_volume(0.0, 0.0);
        layer.trigger_note(note(440.0), 400, 0).unwrap();
        for now in 0..400 {
            assert_eq!(layer.process(now), (0.0, 0.0), "sound before start at {now}");
        }
        let heard = (400..1200).any(|now| layer.process(now).0.abs() > 1e-4);
        assert!(heard);
    }

    #[test]
    fn late_notes_are_clamped_to_now() {
        let mut layer = Layer::new(LayerId::Pulse, SR, 1).unwrap();
        layer.trigger_note(note(110.0), 5, 100).unwrap();
        assert_eq!(layer.pending_notes(), 1);
        layer.process(100);
        assert_eq!(layer.pending_notes(), 0);
    }

    #[test]
    fn texture_filter_can_be_retargeted() {
        let mut layer = Layer::new(LayerId::Texture, SR, 1).unwrap();
        layer.retarget_filter(1500.0, 0.1).unwrap();
        assert_eq!(layer.filter_frequency(), Some(1500.0));
    }

    #[test]
    fn dispose_releases_every_node_once() {
        let mut layer = Layer::new(LayerId::Pad, SR, 1).unwrap();
        assert_eq!(layer.node_count(), 4);
        assert!(layer.dispose());
        assert!(!layer.dispose());
        assert!(!layer.is_live());
        assert_eq!(layer.node_count(), 0);
        assert_eq!(layer.process(0), (0.0, 0.0));
    }

    #[test]
    fn disposed_layer_rejects_notes() {
        let mut layer = Layer::new(LayerId::Melody, SR, 1).unwrap();
        layer.dispose();
        let err = layer.trigger_note(note(440.0), 0, 0).unwrap_err();
        assert!(matches!(err, AmbientError::LayerDisposed { layer: LayerId::Melody }));
        assert!(layer.set_waveform(Waveform::Sine).is_err());
    }

    #[test]
    fn oversized_sample_rate_fails_initialization() {
        // two seconds of delay line at this rate exceeds the buffer limit
        let err = Layer::new(LayerId::Melody, 10_000_000.0, 1).unwrap_err();
        assert_eq!(err.error_code(), "INITIALIZATION_ERROR");
    }
}
