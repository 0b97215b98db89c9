//! Master chain: compressor, low-pass, reverb, then output gain with soft clip.
//!
//! Every layer feeds this one shared bus. Only the low-pass cutoff moves
//! after initialization; the reverb's decay and wet level are fixed.

use tracing::debug;

use crate::config::MasterConfig;
use crate::dsp::compressor::Compressor;
use crate::dsp::filter::{FilterType, StereoFilter};
use crate::dsp::mixer::Mixer;
use crate::dsp::reverb::Reverb;
use crate::error::{AmbientError, Result};

#[derive(Debug, Clone)]
struct MasterNodes {
    compressor: Compressor,
    filter: StereoFilter,
    reverb: Reverb,
}

#[derive(Debug, Clone)]
pub struct MasterChain {
    nodes: Option<MasterNodes>,
    mixer: Mixer,
}

impl MasterChain {
    pub fn new(config: &MasterConfig, sample_rate: f64, filter_hz: f64) -> Result<Self> {
        let reverb = Reverb::new(
            sample_rate,
            config.reverb.decay,
            config.reverb.damping,
            config.reverb.wet,
        )
        .map_err(|e| AmbientError::init(format!("master reverb: {e}")))?;
        Ok(MasterChain {
            nodes: Some(MasterNodes {
                compressor: Compressor::new(sample_rate, config.compressor),
                filter: StereoFilter::new(FilterType::Lowpass, filter_hz, 0.707, sample_rate),
                reverb,
            }),
            mixer: Mixer::new(config.output_gain),
        })
    }

    /// Sum a layer's output into the bus for the current frame.
    #[inline]
    pub fn add(&mut self, left: f32, right: f32) {
        self.mixer.add(left, right);
    }

    /// Process the summed frame and clear the bus.
    #[inline]
    pub fn process(&mut self) -> (f32, f32) {
        let (left, right) = self.mixer.take();
        let Some(nodes) = self.nodes.as_mut() else {
            return (0.0, 0.0);
        };
        let (left, right) = nodes.compressor.process(left, right);
        let (left, right) = nodes.filter.process(left, right);
        let (left, right) = nodes.reverb.process(left, right);
        self.mixer.finish(left, right)
    }

    /// Ramp the low-pass cutoff to `frequency` over `seconds`.
    pub fn ramp_filter(&mut self, frequency: f64, seconds: f64) {
        if let Some(nodes) = self.nodes.as_mut() {
            debug!(frequency, seconds, "master filter ramp");
            nodes.filter.ramp_frequency(frequency, seconds);
        }
    }

    pub fn filter_frequency(&self) -> Option<f64> {
        self.nodes.as_ref().map(|n| n.filter.frequency())
    }

    pub fn filter_target(&self) -> Option<f64> {
        self.nodes.as_ref().map(|n| n.filter.target_frequency())
    }

    pub fn reverb_settings(&self) -> Option<(f64, f64)> {
        self.nodes.as_ref().map(|n| (n.reverb.decay(), n.reverb.wet()))
    }

    pub fn dispose(&mut self) -> bool {
        self.nodes.take().is_some()
    }

    pub fn is_live(&self) -> bool {
        self.nodes.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> MasterChain {
        MasterChain::new(&MasterConfig::default(), 8_000.0, 1_000.0).unwrap()
    }

    #[test]
    fn silence_in_silence_out() {
        let mut master = chain();
        for _ in 0..1000 {
            assert_eq!(master.process(), (0.0, 0.0));
        }
    }

    #[test]
    fn output_is_soft_clipped() {
        let mut master = chain();
        for _ in 0..1000 {
            master.add(5.0, -5.0);
            let (l, r) = master.process();
            assert!(l.abs() <= 1.0 && r.abs() <= 1.0);
        }
    }

    #[test]
    fn filter_ramps_to_target() {
        let mut master = chain();
        master.ramp_filter(2_000.0, 0.5);
        assert_eq!(master.filter_target(), Some(2_000.0));
        for _ in 0..4_000 {
            master.process();
        }
        assert_eq!(master.filter_frequency(), Some(2_000.0));
    }

    #[test]
    fn reverb_is_fixed_at_init() {
        let master = chain();
        let config = MasterConfig::default();
        assert_eq!(master.reverb_settings(), Some((config.reverb.decay, config.reverb.wet)));
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut master = chain();
        assert!(master.dispose());
        assert!(!master.dispose());
        master.add(1.0, 1.0);
        assert_eq!(master.process(), (0.0, 0.0));
    }
}
