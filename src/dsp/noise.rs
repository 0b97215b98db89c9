//! White, pink, and brown noise for the texture layer.

use serde::{Deserialize, Serialize};

/// Spectral color of the noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoiseColor {
    White,
    #[default]
    Pink,
    Brown,
}

/// Paul Kellet's economy pink filter, fed with white noise.
#[derive(Debug, Clone, Default)]
struct PinkFilter {
    b: [f64; 7],
}

impl PinkFilter {
    fn process(&mut self, white: f64) -> f64 {
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.0555179;
        b[1] = 0.99332 * b[1] + white * 0.0750759;
        b[2] = 0.96900 * b[2] + white * 0.1538520;
        b[3] = 0.86650 * b[3] + white * 0.3104856;
        b[4] = 0.55000 * b[4] + white * 0.5329522;
        b[5] = -0.7616 * b[5] - white * 0.0168980;
        let pink = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
        b[6] = white * 0.115926;
        (pink * 0.11).clamp(-1.0, 1.0)
    }
}

/// A seeded noise generator.
#[derive(Debug, Clone)]
pub struct Noise {
    pub color: NoiseColor,
    rng: fastrand::Rng,
    pink: PinkFilter,
    brown: f64,
}

impl Noise {
    pub fn new(color: NoiseColor, seed: u64) -> Self {
        Noise {
            color,
            rng: fastrand::Rng::with_seed(seed),
            pink: PinkFilter::default(),
            brown: 0.0,
        }
    }

    /// Generate the next sample in [-1, 1].
    pub fn next_sample(&mut self) -> f64 {
        let white = self.rng.f64() * 2.0 - 1.0;
        match self.color {
            NoiseColor::White => white,
            NoiseColor::Pink => self.pink.process(white),
            NoiseColor::Brown => {
                self.brown = (self.brown + white * 0.02).clamp(-1.0, 1.0);
                self.brown
            }
        }
    }
}
