//! Turns due pattern ticks into timestamped layer events.
//!
//! Once per render block the engine asks the scheduler to cover the window
//! up to `block end + lookahead`. Every tick inside the window fires exactly
//! once, and its notes are queued on the layer at the tick's own sample, so
//! when the control side gets to run has no effect on where notes land.

use tracing::{debug, warn};

use crate::error::{AmbientError, Result};
use crate::layer::{Layer, LayerId};
use crate::pattern::{NoteRequest, Pattern, PatternEvent, TickContext};
use crate::transport::Transport;

pub struct Scheduler {
    patterns: Vec<Pattern>,
    rng: fastrand::Rng,
    stagger_fraction: f64,
}

impl Scheduler {
    pub fn new(stagger_fraction: f64, seed: u64) -> Self {
        Scheduler {
            patterns: Vec::with_capacity(LayerId::ALL.len()),
            rng: fastrand::Rng::with_seed(seed),
            stagger_fraction,
        }
    }

    /// Stop and drop every bound pattern, then bind `patterns`.
    ///
    /// The new patterns are armed at `start` when the transport is running,
    /// otherwise they wait for [`Scheduler::restart`].
    pub fn bind(&mut self, patterns: impl IntoIterator<Item = Pattern>, transport: &Transport, start: u64) {
        self.clear();
        self.patterns.extend(patterns);
        if transport.is_running() {
            self.restart(transport, start);
        }
        debug!(patterns = self.patterns.len(), "patterns bound");
    }

    /// Stop and drop every pattern. Notes already queued still play.
    pub fn clear(&mut self) {
        for pattern in &mut self.patterns {
            pattern.stop();
        }
        self.patterns.clear();
    }

    /// Re-arm every pattern from `start`, each offset by its layer's stagger.
    pub fn restart(&mut self, transport: &Transport, start: u64) {
        for pattern in &mut self.patterns {
            let grid = transport.subdivision_samples(pattern.subdivision());
            let offset = pattern.layer().ordinal() as f64 * self.stagger_fraction * grid;
            pattern.start(start as f64 + offset);
        }
    }

    /// Stop every pattern in place; [`Scheduler::restart`] resumes them.
    pub fn pause(&mut self) {
        for pattern in &mut self.patterns {
            pattern.stop();
        }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn pattern(&self, layer: LayerId) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.layer() == layer)
    }

    /// Fire every tick due before `window_end`.
    ///
    /// Returns the number of ticks fired. A tick whose event cannot be placed
    /// is logged and dropped; the pattern carries on.
    pub fn pump(&mut self, layers: &mut [Layer], transport: &Transport, window_end: u64) -> usize {
        if !transport.is_running() {
            return 0;
        }
        let now = transport.position();
        let mut fired = 0;
        for pattern in &mut self.patterns {
            let grid = transport.subdivision_samples(pattern.subdivision());
            while let Some(tick) = pattern.next_tick().filter(|&t| t < window_end as f64) {
                let at = tick.round() as u64;
                let mut ctx = TickContext {
                    rng: &mut self.rng,
                    tick: 0,
                    time_ms: transport.samples_to_seconds(at) * 1000.0,
                    step_seconds: grid / transport.sample_rate(),
                };
                let event = pattern.fire(&mut ctx, grid);
                fired += 1;
                if let Some(layer) = layers.iter_mut().find(|l| l.id() == pattern.layer()) {
                    apply(layer, transport, event, at, now);
                }
            }
        }
        fired
    }
}

fn apply(layer: &mut Layer, transport: &Transport, event: PatternEvent, at: u64, now: u64) {
    for note in event.notes {
        if let Err(err) = schedule_note(layer, transport, note, at, now) {
            warn!(error = %err, "dropping pattern event");
        }
    }
    if let Some(filter) = event.filter {
        if let Err(err) = layer.retarget_filter(filter.frequency, filter.ramp_seconds) {
            warn!(error = %err, "dropping filter move");
        }
    }
}

/// Queue `note` on `layer` at absolute sample `at`.
///
/// Fails with [`AmbientError::LayerDisposed`] once the layer is gone and with
/// [`AmbientError::Schedule`] when the transport is stopped.
pub fn schedule_note(
    layer: &mut Layer,
    transport: &Transport,
    note: NoteRequest,
    at: u64,
    now: u64,
) -> Result<()> {
    let id = layer.id();
    if !layer.is_live() {
        return Err(AmbientError::LayerDisposed { layer: id });
    }
    let schedule_error = |reason: String| AmbientError::Schedule {
        layer: id,
        at_seconds: transport.samples_to_seconds(at),
        reason,
    };
    if !transport.is_running() {
        return Err(schedule_error("transport is not running".to_string()));
    }
    layer
        .trigger_note(note, at, now)
        .map_err(|err| schedule_error(err.to_string()))
}
