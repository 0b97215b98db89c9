//! Crossfade controller: mode transitions as an explicit state machine.
//!
//! A transition is `FadingOut → Swapping → FadingIn → Idle`, stepped on the
//! audio clock: every step boundary is an absolute sample, and the engine
//! calls [`CrossfadeController::advance`] when the render position reaches
//! it. The controller only decides *what* happens at each boundary; the
//! engine applies the resulting [`Transition`] to the layers.
//!
//! Requests that arrive mid-transition are collapsed, never interleaved:
//! during the fade-out the in-flight transition is simply retargeted, and
//! later requests are queued with the newest one winning.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::CrossfadeConfig;
use crate::mode::ModeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum CrossfadePhase {
    Idle,
    FadingOut { step: u32 },
    Swapping,
    FadingIn { step: u32 },
}

/// What the engine must do at a step boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Ramp every layer to `level` times the gain it had when the fade began.
    FadeOut { level: f64 },
    /// Install `mode` without ramping volumes.
    Swap { mode: ModeId },
    /// Ramp every layer to `level` times its new target gain.
    FadeIn { level: f64 },
    /// The transition is over; `next` is a collapsed request still to run.
    Done { next: Option<ModeId> },
}

/// How a crossfade request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Started,
    /// The in-flight fade-out now leads to the new mode.
    Retargeted,
    /// Will run after the current transition, unless superseded.
    Queued,
}

#[derive(Debug, Clone)]
pub struct CrossfadeController {
    phase: CrossfadePhase,
    target: Option<ModeId>,
    queued: Option<ModeId>,
    steps: u32,
    step_samples: u64,
    next_boundary: Option<u64>,
    fade_from: [f64; 5],
    completed: u64,
}

impl CrossfadeController {
    pub fn new(config: CrossfadeConfig, sample_rate: f64) -> Self {
        let step_samples = (config.step_ms as f64 / 1000.0 * sample_rate).round().max(1.0) as u64;
        CrossfadeController {
            phase: CrossfadePhase::Idle,
            target: None,
            queued: None,
            steps: config.steps.max(1),
            step_samples,
            next_boundary: None,
            fade_from: [0.0; 5],
            completed: 0,
        }
    }

    pub fn phase(&self) -> CrossfadePhase {
        self.phase
    }

    /// True from the start of a fade-out until its fade-in completes.
    pub fn in_progress(&self) -> bool {
        self.phase != CrossfadePhase::Idle
    }

    /// Mode the in-flight transition leads to.
    pub fn target(&self) -> Option<ModeId> {
        self.target
    }

    pub fn queued(&self) -> Option<ModeId> {
        self.queued
    }

    pub fn next_boundary(&self) -> Option<u64> {
        self.next_boundary
    }

    pub fn step_samples(&self) -> u64 {
        self.step_samples
    }

    /// Length of one full fade (out or in), in samples.
    pub fn window_samples(&self) -> u64 {
        self.step_samples * self.steps as u64
    }

    /// Transitions run to completion so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Gains captured when the current fade-out began.
    pub fn fade_from(&self) -> &[f64; 5] {
        &self.fade_from
    }

    /// Ask for a transition to `mode` at sample `now`.
    ///
    /// `gains` are the layers' current gains. When they are all silent there
    /// is nothing to fade out and the swap happens at `now`.
    pub fn request(&mut self, mode: ModeId, gains: [f64; 5], now: u64) -> RequestOutcome {
        match self.phase {
            CrossfadePhase::Idle => {
                self.target = Some(mode);
                self.fade_from = gains;
                self.phase = if gains.iter().all(|&g| g <= 0.0) {
                    CrossfadePhase::Swapping
                } else {
                    CrossfadePhase::FadingOut { step: 0 }
                };
                self.next_boundary = Some(now);
                info!(%mode, "crossfade started");
                RequestOutcome::Started
            }
            CrossfadePhase::FadingOut { .. } => {
                self.target = Some(mode);
                debug!(%mode, "crossfade retargeted");
                RequestOutcome::Retargeted
            }
            CrossfadePhase::Swapping | CrossfadePhase::FadingIn { .. } => {
                self.queued = Some(mode);
                debug!(%mode, "crossfade request queued");
                RequestOutcome::Queued
            }
        }
    }

    /// Perform the boundary due at `now`, if any.
    pub fn advance(&mut self, now: u64) -> Option<Transition> {
        let boundary = self.next_boundary.filter(|&b| b <= now)?;
        let steps = self.steps;
        let transition = match self.phase {
            CrossfadePhase::Idle => {
                self.next_boundary = None;
                return None;
            }
            CrossfadePhase::FadingOut { step } if step < steps => {
                self.phase = CrossfadePhase::FadingOut { step: step + 1 };
                self.next_boundary = Some(boundary + self.step_samples);
                Transition::FadeOut {
                    level: 1.0 - (step + 1) as f64 / steps as f64,
                }
            }
            CrossfadePhase::FadingOut { .. } => {
                self.phase = CrossfadePhase::Swapping;
                self.next_boundary = Some(boundary);
                return self.advance(now);
            }
            CrossfadePhase::Swapping => {
                let Some(mode) = self.target else {
                    self.cancel();
                    return None;
                };
                self.phase = CrossfadePhase::FadingIn { step: 0 };
                self.next_boundary = Some(boundary);
                Transition::Swap { mode }
            }
            CrossfadePhase::FadingIn { step } if step < steps => {
                self.phase = CrossfadePhase::FadingIn { step: step + 1 };
                self.next_boundary = Some(boundary + self.step_samples);
                Transition::FadeIn {
                    level: (step + 1) as f64 / steps as f64,
                }
            }
            CrossfadePhase::FadingIn { .. } => {
                let installed = self.target.take();
                let next = self.queued.take().filter(|&m| Some(m) != installed);
                self.phase = CrossfadePhase::Idle;
                self.next_boundary = None;
                self.completed += 1;
                info!(mode = ?installed, ?next, "crossfade complete");
                Transition::Done { next }
            }
        };
        Some(transition)
    }

    /// Force the controller back to `Idle`, dropping any queued request.
    pub fn cancel(&mut self) {
        if self.in_progress() {
            debug!(phase = ?self.phase, "crossfade cancelled");
        }
        self.phase = CrossfadePhase::Idle;
        self.target = None;
        self.queued = None;
        self.next_boundary = None;
    }
}
