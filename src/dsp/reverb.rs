//! Algorithmic reverb in the Freeverb mould.
//!
//! Each channel owns a tank: eight damped feedback combs summed in parallel,
//! then four diffusers in series. The right tank's lines are slightly longer
//! to decorrelate the channels. The tail length is given as an RT60 decay
//! time and fixed at construction.

use super::{NodeError, alloc_buffer};

/// Line lengths in samples at 44.1 kHz.
const COMB_LENGTHS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const DIFFUSER_LENGTHS: [usize; 4] = [556, 441, 341, 225];
const RIGHT_OFFSET: usize = 23;
const INPUT_GAIN: f32 = 0.015;
const DIFFUSION: f32 = 0.5;
/// Average comb length in seconds, used to turn RT60 into comb feedback.
const MEAN_COMB_SECONDS: f64 = 1378.0 / 44_100.0;

/// Fixed-length ring buffer; reads return the oldest sample.
#[derive(Debug, Clone)]
struct Line {
    samples: Vec<f32>,
    cursor: usize,
}

impl Line {
    fn new(what: &'static str, len: usize) -> Result<Self, NodeError> {
        Ok(Line {
            samples: alloc_buffer(what, len.max(1))?,
            cursor: 0,
        })
    }

    #[inline]
    fn oldest(&self) -> f32 {
        self.samples[self.cursor]
    }

    #[inline]
    fn replace_oldest(&mut self, value: f32) {
        self.samples[self.cursor] = value;
        self.cursor = (self.cursor + 1) % self.samples.len();
    }

    fn clear(&mut self) {
        self.samples.fill(0.0);
    }
}

#[derive(Debug, Clone)]
struct DampedComb {
    line: Line,
    /// One-pole low-pass state in the feedback path.
    lowpass: f32,
}

impl DampedComb {
    #[inline]
    fn tick(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let out = self.line.oldest();
        self.lowpass = out + (self.lowpass - out) * damp;
        self.line.replace_oldest(input + self.lowpass * feedback);
        out
    }
}

#[derive(Debug, Clone)]
struct Tank {
    combs: Vec<DampedComb>,
    diffusers: Vec<Line>,
}

impl Tank {
    fn new(scale: f64, offset: usize) -> Result<Self, NodeError> {
        let len = |base: usize| (base as f64 * scale) as usize + offset;
        let combs = COMB_LENGTHS
            .iter()
            .map(|&base| {
                Ok(DampedComb {
                    line: Line::new("reverb comb", len(base))?,
                    lowpass: 0.0,
                })
            })
            .collect::<Result<Vec<_>, NodeError>>()?;
        let diffusers = DIFFUSER_LENGTHS
            .iter()
            .map(|&base| Line::new("reverb diffuser", len(base)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Tank { combs, diffusers })
    }

    #[inline]
    fn tick(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let mut out: f32 = self.combs.iter_mut().map(|c| c.tick(input, feedback, damp)).sum();
        for line in &mut self.diffusers {
            let delayed = line.oldest();
            line.replace_oldest(out + delayed * DIFFUSION);
            out = delayed - out;
        }
        out
    }

    fn clear(&mut self) {
        for comb in &mut self.combs {
            comb.line.clear();
            comb.lowpass = 0.0;
        }
        self.diffusers.iter_mut().for_each(Line::clear);
    }
}

#[derive(Debug, Clone)]
pub struct Reverb {
    left: Tank,
    right: Tank,
    feedback: f32,
    damp: f32,
    decay: f64,
    wet: f64,
}

impl Reverb {
    /// Create a reverb whose tail falls 60 dB over `decay` seconds.
    ///
    /// `damping` in [0, 1] darkens the tail; `wet` is the dry/wet mix.
    pub fn new(sample_rate: f64, decay: f64, damping: f64, wet: f64) -> Result<Self, NodeError> {
        let scale = sample_rate / 44_100.0;
        let decay = decay.max(0.1);
        // each trip round a comb loses 60 dB * (comb length / decay)
        let feedback = 0.001_f64.powf(MEAN_COMB_SECONDS / decay).min(0.98) as f32;
        Ok(Reverb {
            left: Tank::new(scale, 0)?,
            right: Tank::new(scale, RIGHT_OFFSET)?,
            feedback,
            damp: damping.clamp(0.0, 1.0) as f32,
            decay,
            wet: wet.clamp(0.0, 1.0),
        })
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    pub fn wet(&self) -> f64 {
        self.wet
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let send = (left + right) * INPUT_GAIN;
        let tail_l = self.left.tick(send, self.feedback, self.damp);
        let tail_r = self.right.tick(send, self.feedback, self.damp);
        let wet = self.wet as f32;
        let dry = 1.0 - wet;
        (left * dry + tail_l * wet, right * dry + tail_r * wet)
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}
