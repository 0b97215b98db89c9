//! Tanh waveshaper that gives the pulse layer its bite.

/// Soft-clipping distortion with drive and wet/dry mix.
///
/// `amount` in [0, 1] maps onto a pre-gain of 1x..21x before `tanh`, and the
/// shaped signal is normalised by `tanh(drive)` so a full-scale input stays at
/// full scale.
#[derive(Debug, Clone)]
pub struct Distortion {
    drive: f32,
    norm: f32,
    /// Dry/wet mix (0.0 = fully dry, 1.0 = fully wet).
    pub mix: f32,
}

impl Distortion {
    pub fn new(amount: f64, mix: f64) -> Self {
        let drive = 1.0 + 20.0 * amount.clamp(0.0, 1.0) as f32;
        Distortion {
            drive,
            norm: drive.tanh().recip(),
            mix: mix.clamp(0.0, 1.0) as f32,
        }
    }

    pub fn drive(&self) -> f32 {
        self.drive
    }

    #[inline]
    fn shape(&self, x: f32) -> f32 {
        (x * self.drive).tanh() * self.norm
    }

    /// Process a stereo sample pair.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mix = self.mix;
        (
            left * (1.0 - mix) + self.shape(left) * mix,
            right * (1.0 - mix) + self.shape(right) * mix,
        )
    }
}
