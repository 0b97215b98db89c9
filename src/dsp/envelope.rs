//! ADSR amplitude envelope built from linear segments.

use serde::{Deserialize, Serialize};

/// Attack/decay/release in seconds, sustain level in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeShape {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl EnvelopeShape {
    pub const fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        EnvelopeShape {
            attack,
            decay,
            sustain,
            release,
        }
    }

    /// A shape with zero sustain dies away on its own, gate or not.
    pub fn is_percussive(&self) -> bool {
        self.sustain <= 0.0
    }
}

impl Default for EnvelopeShape {
    fn default() -> Self {
        EnvelopeShape::new(0.01, 0.1, 0.7, 0.3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// A straight line from `from` to `to` over `length` samples.
#[derive(Debug, Clone, Copy)]
struct Segment {
    from: f64,
    to: f64,
    length: usize,
    elapsed: usize,
}

impl Segment {
    fn new(from: f64, to: f64, length: usize) -> Self {
        Segment {
            from,
            to,
            length,
            elapsed: 0,
        }
    }

    /// Next point on the line, or `None` once the end is reached.
    fn step(&mut self) -> Option<f64> {
        self.elapsed += 1;
        (self.elapsed < self.length)
            .then(|| self.from + (self.to - self.from) * self.elapsed as f64 / self.length as f64)
    }
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub shape: EnvelopeShape,
    sample_rate: f64,
    stage: Stage,
    level: f64,
    segment: Segment,
}

impl Envelope {
    pub fn new(shape: EnvelopeShape, sample_rate: f64) -> Self {
        Envelope {
            shape,
            sample_rate,
            stage: Stage::Idle,
            level: 0.0,
            segment: Segment::new(0.0, 0.0, 0),
        }
    }

    fn samples(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate) as usize
    }

    fn enter(&mut self, stage: Stage, to: f64, seconds: f64) {
        self.stage = stage;
        self.segment = Segment::new(self.level, to, self.samples(seconds));
    }

    /// Note on. A retrigger climbs from wherever the level is now.
    pub fn gate_on(&mut self) {
        self.enter(Stage::Attack, 1.0, self.shape.attack);
    }

    /// Note off. Releases from the current level; a no-op when already releasing.
    pub fn gate_off(&mut self) {
        if self.is_gated() {
            self.enter(Stage::Release, 0.0, self.shape.release);
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        match self.stage {
            Stage::Idle => self.level = 0.0,
            Stage::Sustain => {
                self.level = self.shape.sustain;
                if self.shape.is_percussive() {
                    self.stage = Stage::Idle;
                }
            }
            Stage::Attack | Stage::Decay | Stage::Release => match self.segment.step() {
                Some(level) => self.level = level,
                None => self.finish_stage(),
            },
        }
        self.level
    }

    fn finish_stage(&mut self) {
        self.level = self.segment.to;
        match self.stage {
            Stage::Attack => self.enter(Stage::Decay, self.shape.sustain, self.shape.decay),
            Stage::Decay => self.stage = Stage::Sustain,
            _ => self.stage = Stage::Idle,
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// Silent and waiting for the next gate.
    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Idle
    }

    /// Gate held: attack, decay or sustain.
    pub fn is_gated(&self) -> bool {
        matches!(self.stage, Stage::Attack | Stage::Decay | Stage::Sustain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SR: f64 = 1_000.0;

    fn run(env: &mut Envelope, samples: usize) -> Vec<f64> {
        (0..samples).map(|_| env.next_sample()).collect()
    }

    #[test]
    fn idle_until_gated() {
        let mut env = Envelope::new(EnvelopeShape::default(), SR);
        assert!(env.is_finished());
        assert!(!env.is_gated());
        assert!(run(&mut env, 100).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn pad_like_swell_peaks_then_settles() {
        // 0.2 s attack, 0.1 s decay to 0.8
        let mut env = Envelope::new(EnvelopeShape::new(0.2, 0.1, 0.8, 0.4), SR);
        env.gate_on();
        let out = run(&mut env, 400);
        assert!(out[..200].windows(2).all(|w| w[1] >= w[0]), "attack rises");
        assert_abs_diff_eq!(out[199], 1.0);
        assert_abs_diff_eq!(out[299], 0.8);
        assert_abs_diff_eq!(*out.last().unwrap(), 0.8);
        assert!(env.is_gated());
    }

    #[test]
    fn release_falls_from_current_level() {
        let mut env = Envelope::new(EnvelopeShape::new(0.1, 0.0, 1.0, 0.1), SR);
        env.gate_on();
        run(&mut env, 50); // halfway up the attack
        let from = env.level();
        env.gate_off();
        let out = run(&mut env, 100);
        assert!(out.iter().all(|&s| s <= from));
        assert!(out.windows(2).all(|w| w[1] <= w[0]));
        assert!(env.is_finished());
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn gate_off_twice_does_not_restart_release() {
        let mut env = Envelope::new(EnvelopeShape::new(0.0, 0.0, 1.0, 0.1), SR);
        env.gate_on();
        run(&mut env, 5);
        env.gate_off();
        run(&mut env, 50);
        let mid = env.level();
        env.gate_off();
        assert!(env.next_sample() < mid);
    }

    #[test]
    fn pulse_shape_finishes_without_gate_off() {
        let mut env = Envelope::new(EnvelopeShape::new(0.001, 0.2, 0.0, 0.1), SR);
        env.gate_on();
        run(&mut env, 300);
        assert!(env.is_finished());
    }

    #[test]
    fn retrigger_climbs_without_a_click() {
        let mut env = Envelope::new(EnvelopeShape::new(0.1, 0.1, 0.5, 1.0), SR);
        env.gate_on();
        run(&mut env, 300);
        env.gate_off();
        run(&mut env, 100);
        let before = env.level();
        env.gate_on();
        let after = env.next_sample();
        assert!(after >= before && after - before < 0.05);
    }

    #[test]
    fn levels_stay_in_unit_range() {
        let mut env = Envelope::new(EnvelopeShape::new(0.01, 0.05, 0.5, 0.1), 44_100.0);
        env.gate_on();
        assert!(run(&mut env, 10_000).iter().all(|s| (0.0..=1.0).contains(s)));
        env.gate_off();
        assert!(run(&mut env, 10_000).iter().all(|s| (0.0..=1.0).contains(s)));
        assert!(env.is_finished());
    }
}
