//! Effect nodes a layer can own, as a closed set.
//!
//! Every layer's effect list is built once and processed in order, one stereo
//! sample pair at a time.

use serde::Serialize;

use super::auto_filter::AutoFilter;
use super::chorus::Chorus;
use super::delay::Delay;
use super::distortion::Distortion;
use super::filter::StereoFilter;
use super::reverb::Reverb;

/// Which kind of node an [`Effect`] is, for inspection and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectKind {
    Filter,
    Chorus,
    Distortion,
    Delay,
    Reverb,
    AutoFilter,
}

#[derive(Debug, Clone)]
pub enum Effect {
    Filter(StereoFilter),
    Chorus(Chorus),
    Distortion(Distortion),
    Delay(Delay),
    Reverb(Reverb),
    AutoFilter(AutoFilter),
}

impl Effect {
    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Filter(_) => EffectKind::Filter,
            Effect::Chorus(_) => EffectKind::Chorus,
            Effect::Distortion(_) => EffectKind::Distortion,
            Effect::Delay(_) => EffectKind::Delay,
            Effect::Reverb(_) => EffectKind::Reverb,
            Effect::AutoFilter(_) => EffectKind::AutoFilter,
        }
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        match self {
            Effect::Filter(f) => f.process(left, right),
            Effect::Chorus(c) => c.process(left, right),
            Effect::Distortion(d) => d.process(left, right),
            Effect::Delay(d) => d.process(left, right),
            Effect::Reverb(r) => r.process(left, right),
            Effect::AutoFilter(a) => a.process(left, right),
        }
    }

    /// Clear any internal state (delay lines, filter history).
    pub fn reset(&mut self) {
        match self {
            Effect::Filter(f) => f.reset(),
            Effect::Chorus(c) => c.clear(),
            Effect::Distortion(_) => {}
            Effect::Delay(d) => d.clear(),
            Effect::Reverb(r) => r.clear(),
            Effect::AutoFilter(a) => a.reset(),
        }
    }

    pub fn as_filter_mut(&mut self) -> Option<&mut StereoFilter> {
        match self {
            Effect::Filter(f) => Some(f),
            _ => None,
        }
    }
}
