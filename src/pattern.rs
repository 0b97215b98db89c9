//! What a layer plays, tick by tick.
//!
//! A [`Sequence`] steps through a fixed list of steps, one per subdivision,
//! wrapping forever. A [`Loop`] calls a decision routine once per interval;
//! the routine may choose a note, a filter move, both, or nothing.
//!
//! Patterns know nothing about sample clocks beyond the next tick position;
//! the scheduler decides when a tick is due and turns the resulting
//! [`PatternEvent`] into layer calls.

use std::fmt;

use serde::Serialize;

use crate::layer::LayerId;
use crate::transport::Subdivision;

/// One note to play on a layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoteRequest {
    /// Pitch in Hz; ignored by noise layers.
    pub frequency: f64,
    /// Seconds until release; `None` holds the note.
    pub duration: Option<f64>,
    pub velocity: f64,
}

/// A sequence step: silence, or one or more pitches (in Hz) sounded together.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Rest,
    Play(Vec<f64>),
}

impl Step {
    pub fn note(frequency: f64) -> Step {
        Step::Play(vec![frequency])
    }
}

/// A ramp of the layer's filter requested by a loop routine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterMove {
    pub frequency: f64,
    pub ramp_seconds: f64,
}

/// What a tick asks the layer to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternEvent {
    pub notes: Vec<NoteRequest>,
    pub filter: Option<FilterMove>,
}

impl PatternEvent {
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.filter.is_none()
    }
}

/// Everything a tick can look at.
pub struct TickContext<'a> {
    pub rng: &'a mut fastrand::Rng,
    /// Ticks fired so far by this pattern.
    pub tick: u64,
    /// Tick time on the audio clock, in milliseconds.
    pub time_ms: f64,
    /// Length of one subdivision/interval at the current tempo.
    pub step_seconds: f64,
}

/// Result of one loop routine invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopOutcome {
    pub note: Option<NoteRequest>,
    pub filter: Option<FilterMove>,
}

pub type LoopRoutine = Box<dyn FnMut(&mut TickContext<'_>) -> LoopOutcome + Send>;

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub steps: Vec<Step>,
    pub subdivision: Subdivision,
    /// Note length as a fraction of the subdivision.
    pub duration_fraction: f64,
    pub velocity: f64,
    /// Velocity is varied by up to ± this amount per step.
    pub velocity_jitter: f64,
    index: usize,
}

impl Sequence {
    pub fn new(steps: Vec<Step>, subdivision: Subdivision) -> Self {
        Sequence {
            steps,
            subdivision,
            duration_fraction: 0.9,
            velocity: 0.7,
            velocity_jitter: 0.1,
            index: 0,
        }
    }

    pub fn with_duration(mut self, fraction: f64) -> Self {
        self.duration_fraction = fraction.clamp(0.01, 16.0);
        self
    }

    pub fn with_velocity(mut self, velocity: f64, jitter: f64) -> Self {
        self.velocity = velocity.clamp(0.0, 1.0);
        self.velocity_jitter = jitter.max(0.0);
        self
    }

    /// Index of the step the next tick plays.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Play the step at the current index, then advance it. A fresh sequence
    /// therefore opens on step 0.
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> PatternEvent {
        if self.steps.is_empty() {
            return PatternEvent::default();
        }
        let step = &self.steps[self.index];
        self.index = (self.index + 1) % self.steps.len();

        let Step::Play(pitches) = step else {
            return PatternEvent::default();
        };
        let duration = Some(ctx.step_seconds * self.duration_fraction);
        let notes = pitches
            .iter()
            .map(|&frequency| {
                let jitter = (ctx.rng.f64() * 2.0 - 1.0) * self.velocity_jitter;
                NoteRequest {
                    frequency,
                    duration,
                    velocity: (self.velocity + jitter).clamp(0.0, 1.0),
                }
            })
            .collect();
        PatternEvent {
            notes,
            filter: None,
        }
    }
}

pub struct Loop {
    pub interval: Subdivision,
    routine: LoopRoutine,
}

impl Loop {
    pub fn new(
        interval: Subdivision,
        routine: impl FnMut(&mut TickContext<'_>) -> LoopOutcome + Send + 'static,
    ) -> Self {
        Loop {
            interval,
            routine: Box::new(routine),
        }
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> PatternEvent {
        let outcome = (self.routine)(ctx);
        PatternEvent {
            notes: outcome.note.into_iter().collect(),
            filter: outcome.filter,
        }
    }
}

impl fmt::Debug for Loop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loop")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum PatternBody {
    Sequence(Sequence),
    Loop(Loop),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Sequence,
    Loop,
}

/// Comparable description of a pattern's structure (not its random content).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternShape {
    pub layer: LayerId,
    pub kind: PatternKind,
    pub subdivision: Subdivision,
    /// Step template for sequences; `None` for loops.
    pub steps: Option<Vec<Step>>,
}

/// A pattern bound to one layer.
#[derive(Debug)]
pub struct Pattern {
    layer: LayerId,
    body: PatternBody,
    /// Next tick position in fractional samples; `None` while stopped.
    next_tick: Option<f64>,
    ticks: u64,
}

impl Pattern {
    pub fn sequence(layer: LayerId, sequence: Sequence) -> Self {
        Pattern::with_body(layer, PatternBody::Sequence(sequence))
    }

    pub fn looped(layer: LayerId, lp: Loop) -> Self {
        Pattern::with_body(layer, PatternBody::Loop(lp))
    }

    fn with_body(layer: LayerId, body: PatternBody) -> Self {
        Pattern {
            layer,
            body,
            next_tick: None,
            ticks: 0,
        }
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn body(&self) -> &PatternBody {
        &self.body
    }

    /// The musical grid the pattern ticks on.
    pub fn subdivision(&self) -> Subdivision {
        match &self.body {
            PatternBody::Sequence(s) => s.subdivision,
            PatternBody::Loop(l) => l.interval,
        }
    }

    pub fn shape(&self) -> PatternShape {
        let (kind, steps) = match &self.body {
            PatternBody::Sequence(s) => (PatternKind::Sequence, Some(s.steps.clone())),
            PatternBody::Loop(_) => (PatternKind::Loop, None),
        };
        PatternShape {
            layer: self.layer,
            kind,
            subdivision: self.subdivision(),
            steps,
        }
    }

    /// Arm the pattern so its first tick falls at `at` (fractional samples).
    pub fn start(&mut self, at: f64) {
        self.next_tick = Some(at.max(0.0));
    }

    /// No further ticks fire after this.
    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn next_tick(&self) -> Option<f64> {
        self.next_tick
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Fire the due tick and move the next one `step_samples` later.
    pub fn fire(&mut self, ctx: &mut TickContext<'_>, step_samples: f64) -> PatternEvent {
        ctx.tick = self.ticks;
        let event = match &mut self.body {
            PatternBody::Sequence(s) => s.tick(ctx),
            PatternBody::Loop(l) => l.tick(ctx),
        };
        self.ticks += 1;
        if let Some(tick) = self.next_tick.as_mut() {
            *tick += step_samples.max(1.0);
        }
        event
    }
}
