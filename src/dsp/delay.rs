//! Stereo feedback echo used by the pulse and melody layers.

use super::{NodeError, alloc_buffer};

/// Where each channel's repeats are fed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Left feeds left, right feeds right.
    Straight,
    /// Mono input enters on the left; repeats cross sides each pass.
    PingPong,
}

#[derive(Debug, Clone)]
pub struct Delay {
    /// Interleaved left/right frames.
    frames: Vec<f32>,
    cursor: usize,
    /// Repeat spacing in whole frames.
    spacing: usize,
    routing: Routing,
    pub feedback: f64,
    pub mix: f64,
}

impl Delay {
    /// Allocate room for `max_seconds` of audio and echo every `seconds`.
    pub fn new(
        sample_rate: f64,
        max_seconds: f64,
        seconds: f64,
        feedback: f64,
        mix: f64,
    ) -> Result<Self, NodeError> {
        let capacity = (sample_rate * max_seconds.max(0.0)) as usize + 2;
        let spacing = (seconds.max(0.0) * sample_rate) as usize;
        Ok(Delay {
            frames: alloc_buffer("delay", capacity * 2)?,
            cursor: 0,
            spacing: spacing.clamp(1, capacity - 1),
            routing: Routing::Straight,
            feedback: feedback.clamp(0.0, 0.95),
            mix: mix.clamp(0.0, 1.0),
        })
    }

    pub fn ping_pong(self) -> Self {
        Delay {
            routing: Routing::PingPong,
            ..self
        }
    }

    pub fn routing(&self) -> Routing {
        self.routing
    }

    fn capacity(&self) -> usize {
        self.frames.len() / 2
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let capacity = self.capacity();
        let tap = 2 * ((self.cursor + capacity - self.spacing) % capacity);
        let (echo_l, echo_r) = (self.frames[tap], self.frames[tap + 1]);

        let fb = self.feedback as f32;
        let write = match self.routing {
            Routing::Straight => [left + echo_l * fb, right + echo_r * fb],
            Routing::PingPong => [(left + right) * 0.5 + echo_r * fb, echo_l * fb],
        };
        let at = 2 * self.cursor;
        self.frames[at..at + 2].copy_from_slice(&write);
        self.cursor = (self.cursor + 1) % capacity;

        let wet = self.mix as f32;
        let dry = 1.0 - wet;
        (left * dry + echo_l * wet, right * dry + echo_r * wet)
    }

    pub fn clear(&mut self) {
        self.frames.fill(0.0);
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed one impulse, then return the output `count` frames later.
    fn after_impulse(delay: &mut Delay, count: usize) -> Vec<(f32, f32)> {
        let mut out = vec![delay.process(1.0, 1.0)];
        out.extend((0..count).map(|_| delay.process(0.0, 0.0)));
        out
    }

    #[test]
    fn dry_mix_passes_input() {
        let mut delay = Delay::new(44_100.0, 2.0, 0.5, 0.0, 0.0).unwrap();
        assert_eq!(delay.process(0.5, -0.5), (0.5, -0.5));
    }

    #[test]
    fn echo_lands_after_the_spacing() {
        // 10 ms at 1 kHz
        let mut delay = Delay::new(1_000.0, 1.0, 0.01, 0.0, 1.0).unwrap();
        let out = after_impulse(&mut delay, 15);
        assert!(out[1..10].iter().all(|&(l, r)| l == 0.0 && r == 0.0));
        assert_eq!(out[10], (1.0, 1.0));
        assert_eq!(out[11], (0.0, 0.0));
    }

    #[test]
    fn each_repeat_is_scaled_by_feedback() {
        let mut delay = Delay::new(1_000.0, 1.0, 0.01, 0.5, 1.0).unwrap();
        let out = after_impulse(&mut delay, 30);
        assert_eq!(out[10].0, 1.0);
        assert_eq!(out[20].0, 0.5);
        assert_eq!(out[30].0, 0.25);
    }

    #[test]
    fn ping_pong_bounces_between_sides() {
        let mut delay = Delay::new(1_000.0, 1.0, 0.01, 0.5, 1.0).unwrap().ping_pong();
        assert_eq!(delay.routing(), Routing::PingPong);
        let out = after_impulse(&mut delay, 20);
        assert_eq!(out[10], (1.0, 0.0));
        assert_eq!(out[20], (0.0, 0.5));
    }

    #[test]
    fn clear_drops_pending_echoes() {
        let mut delay = Delay::new(1_000.0, 1.0, 0.01, 0.5, 1.0).unwrap();
        delay.process(1.0, 1.0);
        delay.clear();
        assert!((0..40).all(|_| delay.process(0.0, 0.0) == (0.0, 0.0)));
    }

    #[test]
    fn oversized_line_is_an_error() {
        assert!(matches!(
            Delay::new(192_000.0, 60.0, 1.0, 0.3, 0.5),
            Err(NodeError::BufferTooLarge { .. })
        ));
    }
}
