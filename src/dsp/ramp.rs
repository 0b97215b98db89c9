//! Linear parameter ramps, advanced one sample at a time.
//!
//! Gains and filter frequencies never jump: every change is a straight line
//! from the current value to the target, so the value at any sampled instant
//! stays between the two endpoints.

/// A linearly ramped scalar parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Ramp {
    current: f64,
    target: f64,
    step: f64,
    remaining: usize,
}

impl Ramp {
    pub fn new(value: f64) -> Self {
        Ramp {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Jump to `value` now, cancelling any ramp in flight.
    pub fn set(&mut self, value: f64) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Ramp from the current value to `target` over `samples`.
    pub fn ramp_to(&mut self, target: f64, samples: usize) {
        if samples == 0 {
            self.set(target);
            return;
        }
        self.target = target;
        self.step = (target - self.current) / samples as f64;
        self.remaining = samples;
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn next_value(&mut self) -> f64 {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            } else {
                self.current += self.step;
            }
        }
        self.current
    }

    pub fn value(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }
}
