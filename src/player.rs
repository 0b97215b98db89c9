//! Thread-safe front end shared by a control thread and an audio callback.
//!
//! The engine sits behind one `parking_lot::Mutex`. The audio side holds a
//! [`RenderHandle`] and pulls blocks; the control side issues commands
//! through [`Player`]. `set_playing` waits (bounded) until the audio side has
//! rendered at least one block after the command took effect, and gives up
//! early when a newer command supersedes it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::engine::{EngineState, SoundscapeEngine};
use crate::error::Result;
use crate::intensity::IntensityReader;
use crate::mode::ModeId;

/// How a blocking `set_playing` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The audio timeline rendered a block with the command applied.
    Confirmed,
    /// A newer command was issued while waiting.
    Superseded,
    /// No block was rendered within the confirmation timeout.
    TimedOut,
}

struct Shared {
    engine: Mutex<SoundscapeEngine>,
    /// Sequence number of the latest control command.
    commands: AtomicU64,
    /// Blocks rendered so far; guarded so waiters can use the condvar.
    rendered: Mutex<u64>,
    block_done: Condvar,
    intensity: IntensityReader,
}

#[derive(Clone)]
pub struct Player {
    shared: Arc<Shared>,
    confirm_timeout: Duration,
}

impl Player {
    pub fn new(engine: SoundscapeEngine) -> Self {
        let confirm_timeout = Duration::from_millis(engine.config().player.confirm_timeout_ms);
        let intensity = engine.intensity_reader();
        Player {
            shared: Arc::new(Shared {
                engine: Mutex::new(engine),
                commands: AtomicU64::new(0),
                rendered: Mutex::new(0),
                block_done: Condvar::new(),
                intensity,
            }),
            confirm_timeout,
        }
    }

    /// Handle for the audio callback.
    pub fn render_handle(&self) -> RenderHandle {
        RenderHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn next_command(&self) -> u64 {
        let seq = self.shared.commands.fetch_add(1, Ordering::AcqRel) + 1;
        // Notify under the waiter's lock so the wake-up cannot fall between
        // its supersession check and its wait.
        let _rendered = self.shared.rendered.lock();
        self.shared.block_done.notify_all();
        seq
    }

    pub fn set_mode(&self, name: &str) {
        self.next_command();
        self.shared.engine.lock().set_mode(name);
    }

    /// Start or stop playback and wait for the audio side to pick it up.
    pub fn set_playing(&self, playing: bool) -> Result<Confirmation> {
        let seq = self.next_command();
        let mark = {
            let mut engine = self.shared.engine.lock();
            engine.set_playing(playing)?;
            // Read under the engine lock: blocks counted later saw the command.
            *self.shared.rendered.lock()
        };

        let deadline = Instant::now() + self.confirm_timeout;
        let mut rendered = self.shared.rendered.lock();
        loop {
            if self.shared.commands.load(Ordering::Acquire) != seq {
                debug!(playing, "playback command superseded");
                return Ok(Confirmation::Superseded);
            }
            if *rendered > mark {
                return Ok(Confirmation::Confirmed);
            }
            if self.shared.block_done.wait_until(&mut rendered, deadline).timed_out() {
                let confirmation = if self.shared.commands.load(Ordering::Acquire) != seq {
                    Confirmation::Superseded
                } else if *rendered > mark {
                    Confirmation::Confirmed
                } else {
                    Confirmation::TimedOut
                };
                debug!(playing, ?confirmation, "confirmation wait ended");
                return Ok(confirmation);
            }
        }
    }

    /// Lock-free; never waits for the audio side.
    pub fn audio_intensity(&self) -> f32 {
        self.shared.intensity.get()
    }

    pub fn state(&self) -> EngineState {
        self.shared.engine.lock().state()
    }

    pub fn ready(&self) -> bool {
        self.shared.engine.lock().ready()
    }

    pub fn mode(&self) -> ModeId {
        self.shared.engine.lock().mode()
    }

    pub fn dispose(&self) {
        self.next_command();
        self.shared.engine.lock().dispose();
    }
}

/// The audio side of a [`Player`].
#[derive(Clone)]
pub struct RenderHandle {
    shared: Arc<Shared>,
}

impl RenderHandle {
    /// Render the next block of interleaved stereo into `out`.
    pub fn fill(&self, out: &mut [f32]) {
        {
            let mut engine = self.shared.engine.lock();
            engine.render(out);
            *self.shared.rendered.lock() += 1;
        }
        self.shared.block_done.notify_all();
    }

    pub fn sample_rate(&self) -> f64 {
        self.shared.engine.lock().sample_rate()
    }
}
