//! End-to-end behaviour of the soundscape engine, driven by offline rendering.

use ambient_core::dsp::db_to_gain;
use ambient_core::generator::build_patterns;
use ambient_core::layer::Layer;
use ambient_core::mode::{self, ModeId};
use ambient_core::pattern::{NoteRequest, PatternShape};
use ambient_core::{AmbientError, EngineConfig, EngineState, LayerId, SoundscapeEngine};
use approx::assert_relative_eq;

const SR: f64 = 8_000.0;
/// One crossfade window (20 steps of 50 ms) in frames.
const WINDOW: usize = 8_000;

fn engine() -> SoundscapeEngine {
    let config = EngineConfig {
        sample_rate: SR,
        ..EngineConfig::seeded(2024)
    };
    let mut engine = SoundscapeEngine::new(config).unwrap();
    engine.initialize().unwrap();
    engine
}

fn playing_engine() -> SoundscapeEngine {
    let mut engine = engine();
    engine.set_playing(true).unwrap();
    // let the opening fade-in finish
    engine.render_frames(WINDOW + 400);
    assert!(!engine.crossfade_in_progress());
    engine
}

fn gain(engine: &SoundscapeEngine, layer: LayerId) -> f64 {
    engine.layer(layer).unwrap().gain()
}

/// Render `frames` in slices of `hop`, recording `layer`'s gain after each.
fn trace_gain(engine: &mut SoundscapeEngine, layer: LayerId, frames: usize, hop: usize) -> Vec<f64> {
    (0..frames / hop)
        .map(|_| {
            engine.render_frames(hop);
            gain(engine, layer)
        })
        .collect()
}

fn shapes(engine: &SoundscapeEngine) -> Vec<PatternShape> {
    engine.scheduler().patterns().iter().map(|p| p.shape()).collect()
}

fn note() -> NoteRequest {
    NoteRequest {
        frequency: 440.0,
        duration: Some(0.25),
        velocity: 0.7,
    }
}

#[test]
fn unknown_modes_resolve_to_focus() {
    let focus = mode::lookup("focus");
    for name in ["", "party", "odyssey2", "🌊"] {
        assert!(std::ptr::eq(mode::lookup(name), focus), "{name:?}");
    }
    assert_eq!(ModeId::resolve("  RELAX "), ModeId::Relax);

    let mut engine = engine();
    engine.set_mode("relax");
    engine.set_mode("no-such-mode");
    assert_eq!(engine.mode(), ModeId::Focus);
}

#[test]
fn volume_ramps_stay_between_floor_and_target() {
    let mut layer = Layer::new(LayerId::Pad, SR, 9).unwrap();
    let target = db_to_gain(-12.0);
    layer.set_volume(-12.0, 0.5);
    let mut last = 0.0;
    for now in 0..5_000 {
        layer.process(now);
        let g = layer.gain();
        assert!((0.0..=target).contains(&g), "gain {g} outside [0, {target}]");
        assert!(g >= last);
        last = g;
    }
    assert_relative_eq!(last, target);

    layer.set_volume(-80.0, 0.25);
    for now in 5_000..8_000 {
        layer.process(now);
        let g = layer.gain();
        assert!((0.0..=target).contains(&g));
        assert!(g <= last);
        last = g;
    }
    assert_eq!(last, 0.0);
}

#[test]
fn focus_scenario_fades_in_with_focus_patterns() {
    let mut engine = engine();
    assert!(engine.ready());
    engine.set_mode("focus");
    engine.set_playing(true).unwrap();

    let focus = ModeId::Focus.config();
    let target = db_to_gain(focus.volumes.pad);
    let trace = trace_gain(&mut engine, LayerId::Pad, WINDOW, 100);
    assert!(trace.windows(2).all(|w| w[1] >= w[0]));
    assert!(trace.iter().all(|&g| g <= target + 1e-12));
    assert!(trace[WINDOW / 200] < target, "still ramping halfway through");
    assert_relative_eq!(*trace.last().unwrap(), target, epsilon = 1e-12);

    for id in LayerId::ALL {
        assert_relative_eq!(gain(&engine, id), db_to_gain(focus.volume_db(id)), epsilon = 1e-12);
    }
    let expected: Vec<_> = build_patterns(focus).iter().map(|p| p.shape()).collect();
    assert_eq!(shapes(&engine), expected);
    assert!(engine.scheduler().patterns().iter().all(|p| p.is_running()));
    assert!(engine.transport().is_running());
    assert_eq!(engine.transport().bpm(), focus.tempo_bpm);
}

#[test]
fn overlapping_requests_collapse_into_one_dip() {
    let mut engine = playing_engine();
    engine.set_mode("relax");
    engine.render_frames(800);
    engine.set_mode("move");
    engine.render_frames(800);
    engine.set_mode("sleep");

    let trace = trace_gain(&mut engine, LayerId::Pad, 3 * WINDOW, 50);
    let lowest = trace
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert!(trace[..=lowest].windows(2).all(|w| w[1] <= w[0]), "fade-out must not rise");
    assert!(trace[lowest..].windows(2).all(|w| w[1] >= w[0]), "fade-in must not dip again");
    assert_eq!(trace[lowest], 0.0);

    assert_eq!(engine.mode(), ModeId::Sleep);
    assert!(!engine.crossfade_in_progress());
    assert_relative_eq!(
        gain(&engine, LayerId::Pad),
        db_to_gain(ModeId::Sleep.config().volumes.pad),
        epsilon = 1e-12
    );
}

#[test]
fn request_during_fade_in_runs_after_it() {
    let mut engine = playing_engine();
    let before = engine.crossfades_completed();
    engine.set_mode("relax");
    // past the fade-out and into the fade-in
    engine.render_frames(WINDOW + 2_000);
    engine.set_mode("study");
    engine.set_mode("odyssey");
    engine.render_frames(4 * WINDOW);
    assert_eq!(engine.mode(), ModeId::Odyssey);
    assert_eq!(engine.crossfades_completed(), before + 2);
}

#[test]
fn generate_is_structurally_idempotent() {
    let mut engine = engine();
    engine.generate("study");
    let first = shapes(&engine);
    engine.generate("study");
    assert_eq!(shapes(&engine), first);
    assert_eq!(first.len(), LayerId::ALL.len());
}

#[test]
fn intensity_is_zero_while_paused() {
    let mut engine = engine();
    for id in ModeId::ALL {
        engine.set_mode(id.as_str());
        for _ in 0..10 {
            engine.render_frames(400);
            assert_eq!(engine.audio_intensity(), 0.0, "{id}");
        }
    }
}

#[test]
fn dispose_mid_crossfade_releases_everything() {
    let mut engine = playing_engine();
    engine.set_mode("sleep");
    engine.render_frames(2_400);
    assert!(engine.crossfade_in_progress());

    engine.dispose();
    assert_eq!(engine.state(), EngineState::Disposed);
    assert!(!engine.crossfade_in_progress());
    for layer in engine.layers().unwrap() {
        assert!(!layer.is_live());
        assert_eq!(layer.node_count(), 0);
    }
    for id in LayerId::ALL {
        let err = engine.trigger_note(id, note(), 1.0).unwrap_err();
        assert!(matches!(err, AmbientError::LayerDisposed { layer } if layer == id));
        assert!(err.to_string().contains(id.as_str()));
    }
    // later renders stay silent instead of touching released nodes
    assert!(engine.render_frames(512).iter().all(|&s| s == 0.0));
}

#[test]
fn round_trip_matches_direct_install() {
    let mut travelled = playing_engine();
    travelled.set_mode("relax");
    travelled.render_frames(2 * WINDOW + 800);
    travelled.set_mode("move");
    travelled.render_frames(2 * WINDOW + 800);
    travelled.set_mode("relax");
    travelled.render_frames(2 * WINDOW + 800);

    let mut direct = engine();
    direct.set_mode("relax");
    direct.set_playing(true).unwrap();
    direct.render_frames(WINDOW + 800);

    assert_eq!(travelled.mode(), direct.mode());
    assert!(std::ptr::eq(travelled.mode_config(), direct.mode_config()));
    assert_eq!(shapes(&travelled), shapes(&direct));
    assert_eq!(travelled.transport().bpm(), direct.transport().bpm());
    for id in LayerId::ALL {
        let a = travelled.layer(id).unwrap();
        let b = direct.layer(id).unwrap();
        assert_eq!(a.target_db(), b.target_db());
        assert_relative_eq!(a.gain(), b.gain(), epsilon = 1e-12);
    }
    assert_eq!(
        travelled.master().unwrap().filter_target(),
        direct.master().unwrap().filter_target()
    );
}

#[test]
fn playing_output_is_audible_and_bounded() {
    let mut engine = playing_engine();
    let out = engine.render_frames(4 * 8_000);
    let peak = out.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
    assert!(peak > 1e-3);
    assert!(peak <= 1.0);
    assert!(engine.audio_intensity() > 0.0);
}
