//! Sums the layer outputs into one stereo bus with output gain.

/// A stereo summing bus that accumulates one frame at a time.
///
/// Layers add into the bus, the master chain processes the sum, and
/// [`Mixer::finish`] applies output gain with tanh soft clipping.
#[derive(Debug, Clone)]
pub struct Mixer {
    pub output_gain: f32,
    left: f32,
    right: f32,
}

impl Default for Mixer {
    fn default() -> Self {
        Mixer::new(0.8)
    }
}

impl Mixer {
    pub fn new(output_gain: f32) -> Self {
        Mixer {
            output_gain,
            left: 0.0,
            right: 0.0,
        }
    }

    /// Add a stereo pair into the current frame.
    #[inline]
    pub fn add(&mut self, left: f32, right: f32) {
        self.left += left;
        self.right += right;
    }

    /// Take the accumulated frame and clear the bus for the next one.
    #[inline]
    pub fn take(&mut self) -> (f32, f32) {
        let frame = (self.left, self.right);
        self.left = 0.0;
        self.right = 0.0;
        frame
    }

    /// Apply output gain and soft clipping to a processed frame.
    #[inline]
    pub fn finish(&self, left: f32, right: f32) -> (f32, f32) {
        (
            soft_clip(left * self.output_gain),
            soft_clip(right * self.output_gain),
        )
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
#[inline]
fn soft_clip(x: f32) -> f32 {
    x.tanh()
}
