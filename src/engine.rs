//! The soundscape engine. Owns every node and drives them on the audio clock.
//!
//! The engine is pull-rendered: [`SoundscapeEngine::render`] produces the
//! next block of interleaved stereo and, on the way, fires due pattern ticks
//! (with look-ahead), crossfade boundaries and intensity updates. Control
//! calls (`set_mode`, `set_playing`) only change state; nothing they do is
//! heard until the audio clock reaches it.
//!
//! Lifecycle: `Uninitialized → Initializing → Ready → {Stopped ⇄ Playing} →
//! Disposed`. A failed initialization returns to `Uninitialized`;
//! `Disposed` is terminal.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::crossfade::{CrossfadeController, CrossfadePhase, RequestOutcome, Transition};
use crate::dsp::{check_sample_rate, db_to_gain};
use crate::error::{AmbientError, Result};
use crate::generator::build_patterns;
use crate::intensity::{IntensityEstimator, IntensityReader};
use crate::layer::{Layer, LayerId};
use crate::master::MasterChain;
use crate::mode::{ModeConfig, ModeId};
use crate::pattern::NoteRequest;
use crate::scheduler::{Scheduler, schedule_note};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Stopped,
    Playing,
    Disposed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Initializing => "initializing",
            EngineState::Ready => "ready",
            EngineState::Stopped => "stopped",
            EngineState::Playing => "playing",
            EngineState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// How `generate` treats layer volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Volumes {
    /// Ramp to the new targets over the configured time.
    Ramp,
    /// Record the targets only; a fade-in applies them later.
    Deferred,
}

#[derive(Debug)]
struct Graph {
    layers: [Layer; 5],
    master: MasterChain,
}

pub struct SoundscapeEngine {
    config: EngineConfig,
    state: EngineState,
    graph: Option<Graph>,
    transport: Transport,
    scheduler: Scheduler,
    crossfade: CrossfadeController,
    intensity: IntensityEstimator,
    mode: ModeId,
    seed: u64,
}

impl SoundscapeEngine {
    /// Create an engine in the `Uninitialized` state. No audio nodes exist yet.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(|| fastrand::u64(..));
        let mode = ModeId::resolve(&config.default_mode);
        let mode_config = mode.config();
        Ok(SoundscapeEngine {
            transport: Transport::new(config.sample_rate, mode_config.tempo_bpm),
            scheduler: Scheduler::new(config.stagger_fraction, seed.wrapping_add(1)),
            crossfade: CrossfadeController::new(config.crossfade, config.sample_rate),
            intensity: IntensityEstimator::new(
                config.intensity,
                mode_config.intensity,
                config.sample_rate,
                seed.wrapping_add(2),
            ),
            state: EngineState::Uninitialized,
            graph: None,
            mode,
            seed,
            config,
        })
    }

    /// Build every layer and the master chain.
    ///
    /// On failure nothing stays allocated, the state returns to
    /// `Uninitialized` and the call may be retried.
    pub fn initialize(&mut self) -> Result<()> {
        match self.state {
            EngineState::Uninitialized => {}
            EngineState::Disposed => return Err(AmbientError::NotReady { state: self.state }),
            _ => return Ok(()),
        }
        self.state = EngineState::Initializing;
        match self.build_graph() {
            Ok(graph) => {
                self.graph = Some(graph);
                self.state = EngineState::Ready;
                info!(sample_rate = self.config.sample_rate, mode = %self.mode, "engine ready");
                self.install(self.mode, Volumes::Deferred);
                Ok(())
            }
            Err(err) => {
                self.state = EngineState::Uninitialized;
                warn!(error = %err, "engine initialization failed");
                Err(err)
            }
        }
    }

    /// [`initialize`](Self::initialize) with the configured bounded retry.
    pub fn initialize_with_retry(&mut self) -> Result<()> {
        let policy = self.config.retry;
        let mut attempt = 1;
        loop {
            match self.initialize() {
                Ok(()) => return Ok(()),
                Err(err) if err.is_recoverable() && attempt < policy.max_attempts => {
                    warn!(attempt, max = policy.max_attempts, "retrying initialization");
                    std::thread::sleep(Duration::from_millis(policy.delay_ms));
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn build_graph(&self) -> Result<Graph> {
        let sample_rate = self.config.sample_rate;
        check_sample_rate(sample_rate).map_err(|e| AmbientError::init(e.to_string()))?;
        let layers: Vec<Layer> = LayerId::ALL
            .iter()
            .map(|&id| Layer::new(id, sample_rate, self.layer_seed(id)))
            .collect::<Result<_>>()?;
        let layers: [Layer; 5] = layers
            .try_into()
            .map_err(|_| AmbientError::init("layer count mismatch"))?;
        let master = MasterChain::new(
            &self.config.master,
            sample_rate,
            self.mode.config().master_filter_hz,
        )?;
        Ok(Graph { layers, master })
    }

    fn layer_seed(&self, id: LayerId) -> u64 {
        self.seed ^ (id.ordinal() as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// True once every layer and the master chain exist.
    pub fn ready(&self) -> bool {
        matches!(
            self.state,
            EngineState::Ready | EngineState::Stopped | EngineState::Playing
        )
    }

    pub fn is_playing(&self) -> bool {
        self.state == EngineState::Playing
    }

    /// The mode currently installed (or that will be, once ready).
    pub fn mode(&self) -> ModeId {
        self.mode
    }

    pub fn mode_config(&self) -> &'static ModeConfig {
        self.mode.config()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn crossfade_phase(&self) -> CrossfadePhase {
        self.crossfade.phase()
    }

    pub fn crossfade_in_progress(&self) -> bool {
        self.crossfade.in_progress()
    }

    /// Transitions completed since the engine was created.
    pub fn crossfades_completed(&self) -> u64 {
        self.crossfade.completed()
    }

    pub fn layers(&self) -> Option<&[Layer; 5]> {
        self.graph.as_ref().map(|g| &g.layers)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers().map(|layers| &layers[id.ordinal()])
    }

    pub fn master(&self) -> Option<&MasterChain> {
        self.graph.as_ref().map(|g| &g.master)
    }

    /// Latest intensity in [0, 1]; exactly 0 unless playing.
    pub fn audio_intensity(&self) -> f32 {
        self.intensity.value()
    }

    pub fn intensity_reader(&self) -> IntensityReader {
        self.intensity.reader()
    }

    fn gains(&self) -> [f64; 5] {
        self.layers()
            .map(|layers| std::array::from_fn(|i| layers[i].gain()))
            .unwrap_or([0.0; 5])
    }

    /// Select a mode by name; unknown names resolve to `focus`.
    ///
    /// While playing this crossfades; otherwise the mode is installed
    /// directly and its volumes apply when playback starts. Before the
    /// engine is ready the choice is only remembered.
    pub fn set_mode(&mut self, name: &str) {
        let mode = ModeId::resolve(name);
        match self.state {
            EngineState::Playing => {
                if mode == self.mode && !self.crossfade.in_progress() {
                    debug!(%mode, "mode already active");
                    return;
                }
                let now = self.transport.position();
                let gains = self.gains();
                let outcome = self.crossfade.request(mode, gains, now);
                debug!(%mode, ?outcome, "mode change requested");
            }
            EngineState::Ready | EngineState::Stopped => {
                if mode != self.mode {
                    self.install(mode, Volumes::Deferred);
                }
            }
            EngineState::Uninitialized | EngineState::Initializing => self.mode = mode,
            EngineState::Disposed => {}
        }
    }

    /// Regenerate the current or a new mode with audible volume ramps.
    ///
    /// A no-op until the engine is ready.
    pub fn generate(&mut self, name: &str) {
        if self.ready() {
            self.install(ModeId::resolve(name), Volumes::Ramp);
        }
    }

    /// Start or stop playback.
    ///
    /// Starting fades the current mode in from silence; stopping releases
    /// held notes and fades every layer out over the crossfade window.
    pub fn set_playing(&mut self, playing: bool) -> Result<()> {
        if !self.ready() {
            return Err(AmbientError::NotReady { state: self.state });
        }
        let now = self.transport.position();
        match (playing, self.state) {
            (true, EngineState::Playing) | (false, EngineState::Ready | EngineState::Stopped) => {}
            (true, _) => {
                self.transport.start();
                self.intensity.set_playing(true);
                self.state = EngineState::Playing;
                let gains = self.gains();
                if self.crossfade.request(self.mode, gains, now) != RequestOutcome::Started {
                    debug!("start folded into running crossfade");
                }
                info!(mode = %self.mode, "playback started");
            }
            (false, _) => {
                let pending = self.crossfade.queued().or(self.crossfade.target());
                let swapped = !matches!(self.crossfade.phase(), CrossfadePhase::FadingOut { .. });
                self.crossfade.cancel();
                self.transport.stop();
                self.scheduler.pause();
                self.intensity.set_playing(false);
                let window = self.config.crossfade.window_seconds();
                if let Some(graph) = self.graph.as_mut() {
                    for layer in &mut graph.layers {
                        layer.release_all();
                        layer.ramp_gain(0.0, window);
                    }
                }
                self.state = EngineState::Stopped;
                // A transition cut short still decides which mode plays next.
                if let Some(mode) = pending.filter(|&m| m != self.mode || !swapped) {
                    self.install(mode, Volumes::Deferred);
                }
                info!(mode = %self.mode, "playback stopped");
            }
        }
        Ok(())
    }

    /// Install `mode`: new patterns, tempo, timbre, master filter and volume targets.
    fn install(&mut self, mode: ModeId, volumes: Volumes) {
        let Some(graph) = self.graph.as_mut() else {
            self.mode = mode;
            return;
        };
        let config = mode.config();
        let now = self.transport.position();

        self.scheduler.clear();
        graph
            .master
            .ramp_filter(config.master_filter_hz, self.config.generate.filter_ramp_seconds);
        for layer in &mut graph.layers {
            let db = config.volume_db(layer.id());
            match volumes {
                Volumes::Ramp => layer.set_volume(db, self.config.generate.volume_ramp_seconds),
                Volumes::Deferred => layer.set_target_db(db),
            }
        }
        let timbre = [
            (LayerId::Pad, config.pad_waveform),
            (LayerId::Melody, config.melody_waveform),
        ];
        for (id, waveform) in timbre {
            if let Err(err) = graph.layers[id.ordinal()].set_waveform(waveform) {
                warn!(error = %err, "timbre change skipped");
            }
        }
        self.transport.set_bpm(config.tempo_bpm);
        self.intensity.set_profile(config.intensity);
        self.scheduler.bind(build_patterns(config), &self.transport, now);
        self.mode = mode;
        info!(%mode, bpm = config.tempo_bpm, "soundscape generated");
    }

    /// Queue a note on one layer, `at_seconds` on the audio clock.
    pub fn trigger_note(&mut self, layer: LayerId, note: NoteRequest, at_seconds: f64) -> Result<()> {
        let now = self.transport.position();
        let at = self.transport.seconds_to_samples(at_seconds);
        match (self.state, self.graph.as_mut()) {
            (EngineState::Disposed, _) => Err(AmbientError::LayerDisposed { layer }),
            (_, Some(graph)) => {
                schedule_note(&mut graph.layers[layer.ordinal()], &self.transport, note, at, now)
            }
            (state, None) => Err(AmbientError::NotReady { state }),
        }
    }

    /// Apply every crossfade boundary due at `now`.
    fn run_crossfade(&mut self, now: u64) {
        let step_seconds = self.crossfade.step_samples() as f64 / self.config.sample_rate;
        while let Some(transition) = self.crossfade.advance(now) {
            match transition {
                Transition::FadeOut { level } => {
                    let from = *self.crossfade.fade_from();
                    if let Some(graph) = self.graph.as_mut() {
                        for (layer, start) in graph.layers.iter_mut().zip(from) {
                            layer.ramp_gain(start * level, step_seconds);
                        }
                    }
                }
                Transition::Swap { mode } => self.install(mode, Volumes::Deferred),
                Transition::FadeIn { level } => {
                    if let Some(graph) = self.graph.as_mut() {
                        for layer in &mut graph.layers {
                            layer.ramp_gain(db_to_gain(layer.target_db()) * level, step_seconds);
                        }
                    }
                }
                Transition::Done { next } => {
                    if let Some(mode) = next {
                        let gains = self.gains();
                        self.crossfade.request(mode, gains, now);
                    }
                }
            }
        }
    }

    /// Render interleaved stereo into `out` (`[l, r, l, r, ...]`).
    pub fn render(&mut self, out: &mut [f32]) {
        let frames = out.len() / 2;
        if self.graph.is_none() || self.state == EngineState::Disposed {
            out.fill(0.0);
            return;
        }
        let block_size = self.config.block_size as u64;
        let lookahead = self.transport.seconds_to_samples(self.config.lookahead_seconds);

        let mut frame = 0;
        while frame < frames {
            let now = self.transport.position();
            self.run_crossfade(now);

            let mut len = block_size.min((frames - frame) as u64);
            if let Some(boundary) = self.crossfade.next_boundary().filter(|&b| b > now) {
                len = len.min(boundary - now);
            }
            self.intensity.advance(now);

            let Some(graph) = self.graph.as_mut() else {
                break;
            };
            self.scheduler
                .pump(&mut graph.layers, &self.transport, now + len + lookahead);
            let block = &mut out[frame * 2..(frame + len as usize) * 2];
            for (offset, pair) in block.chunks_exact_mut(2).enumerate() {
                let t = now + offset as u64;
                for layer in &mut graph.layers {
                    let (left, right) = layer.process(t);
                    graph.master.add(left, right);
                }
                let (left, right) = graph.master.process();
                pair[0] = left;
                pair[1] = right;
            }
            self.transport.advance(len);
            frame += len as usize;
        }
        out[frames * 2..].fill(0.0);
    }

    /// Render `frames` frames and return them interleaved.
    pub fn render_frames(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        self.render(&mut out);
        out
    }

    /// Release every node exactly once. Safe mid-crossfade; later calls do nothing.
    pub fn dispose(&mut self) {
        if self.state == EngineState::Disposed {
            return;
        }
        self.crossfade.cancel();
        self.transport.stop();
        self.scheduler.clear();
        self.intensity.set_playing(false);
        if let Some(graph) = self.graph.as_mut() {
            let released = graph.layers.iter_mut().map(Layer::dispose).filter(|&d| d).count();
            graph.master.dispose();
            debug!(released, "layers released");
        }
        self.state = EngineState::Disposed;
        info!("engine disposed");
    }
}

impl fmt::Debug for SoundscapeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundscapeEngine")
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("position", &self.transport.position())
            .field("crossfade", &self.crossfade.phase())
            .finish_non_exhaustive()
    }
}
