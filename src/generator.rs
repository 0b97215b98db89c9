//! Turns a mode's configuration into five patterns.
//!
//! [`build_patterns`] is pure: the same config always yields the same
//! sequence templates and loop intervals. Only what the loops choose at tick
//! time is random. Applying the patterns (stopping the old ones, ramping
//! volumes and the master filter) is the engine's job.

use std::f64::consts::TAU;

use crate::layer::LayerId;
use crate::mode::ModeConfig;
use crate::note::{lowest_note, midi_to_frequency, note_to_frequency, note_to_midi};
use crate::pattern::{FilterMove, Loop, LoopOutcome, NoteRequest, Pattern, Sequence, Step, TickContext};
use crate::transport::Subdivision;

/// Sparse on/off grid for the pulse layer.
const PULSE_TEMPLATE: [bool; 16] = [
    true, false, false, false, true, false, false, false, //
    true, false, true, false, false, false, false, false,
];

/// Scale degrees (indices into the melody scale) for the melody layer.
const MELODY_TEMPLATE: [Option<usize>; 16] = [
    Some(0),
    None,
    None,
    Some(2),
    None,
    None,
    Some(4),
    None,
    None,
    None,
    Some(3),
    None,
    Some(1),
    None,
    None,
    None,
];

/// Centre of the texture band-pass sweep.
const TEXTURE_CENTER_HZ: f64 = 800.0;
/// Slow sinusoid driving the texture sweep, per millisecond.
const TEXTURE_SWEEP_RATE: f64 = 0.000_2;

/// Build the pattern for every layer, in [`LayerId::ALL`] order.
pub fn build_patterns(config: &ModeConfig) -> [Pattern; 5] {
    [
        pad(config),
        drone(config),
        pulse(config),
        texture(config),
        melody(config),
    ]
}

fn frequencies(notes: &[&str]) -> Vec<f64> {
    notes.iter().filter_map(|n| note_to_frequency(n)).collect()
}

fn pad(config: &ModeConfig) -> Pattern {
    let steps = config
        .pad_chords
        .iter()
        .map(|chord| Step::Play(frequencies(chord)))
        .collect();
    let seq = Sequence::new(steps, Subdivision::Bars(1))
        .with_duration(0.95)
        .with_velocity(0.5, 0.08);
    Pattern::sequence(LayerId::Pad, seq)
}

fn drone(config: &ModeConfig) -> Pattern {
    let notes = frequencies(config.drone_notes);
    let probability = config.drone_probability;
    let routine = move |ctx: &mut TickContext<'_>| {
        // The first tick always sounds so the drone is present from the start.
        if notes.is_empty() || (ctx.tick > 0 && ctx.rng.f64() >= probability) {
            return LoopOutcome::default();
        }
        let frequency = notes[ctx.rng.usize(..notes.len())];
        LoopOutcome {
            note: Some(NoteRequest {
                frequency,
                duration: None,
                velocity: 0.6,
            }),
            filter: None,
        }
    };
    Pattern::looped(LayerId::Drone, Loop::new(Subdivision::Bars(2), routine))
}

fn pulse(config: &ModeConfig) -> Pattern {
    // One octave above the lowest drone note.
    let midi = lowest_note(config.drone_notes)
        .and_then(note_to_midi)
        .map_or(48, |m| m + 12);
    let frequency = midi_to_frequency(midi, 440.0);
    let steps = PULSE_TEMPLATE
        .iter()
        .map(|&on| if on { Step::note(frequency) } else { Step::Rest })
        .collect();
    let seq = Sequence::new(steps, config.pulse_subdivision)
        .with_duration(0.5)
        .with_velocity(0.7, 0.15);
    Pattern::sequence(LayerId::Pulse, seq)
}

fn texture(config: &ModeConfig) -> Pattern {
    let intensity = config.texture_intensity.clamp(0.0, 1.0);
    let mut walk = 0.0_f64;
    let routine = move |ctx: &mut TickContext<'_>| {
        walk = (walk + (ctx.rng.f64() - 0.5) * 0.3 * intensity).clamp(-1.0, 1.0);
        let sweep = 0.8 * (TAU * TEXTURE_SWEEP_RATE * ctx.time_ms).sin();
        let octaves = (sweep + walk) * (0.5 + intensity);
        LoopOutcome {
            // Holding noise note; re-triggering a held noise voice is a no-op.
            note: Some(NoteRequest {
                frequency: 0.0,
                duration: None,
                velocity: 0.3 + 0.5 * intensity,
            }),
            filter: Some(FilterMove {
                frequency: (TEXTURE_CENTER_HZ * 2.0_f64.powf(octaves)).clamp(150.0, 6_000.0),
                ramp_seconds: ctx.step_seconds,
            }),
        }
    };
    Pattern::looped(LayerId::Texture, Loop::new(Subdivision::Bars(1), routine))
}

fn melody(config: &ModeConfig) -> Pattern {
    let scale = frequencies(config.melody_scale);
    let steps = MELODY_TEMPLATE
        .iter()
        .map(|degree| match (degree, scale.len()) {
            (Some(d), len) if len > 0 => Step::note(scale[d % len]),
            _ => Step::Rest,
        })
        .collect();
    let seq = Sequence::new(steps, Subdivision::Eighth)
        .with_duration(1.5)
        .with_velocity(0.55, 0.15);
    Pattern::sequence(LayerId::Melody, seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{ModeId, catalog, lookup};
    use crate::pattern::{PatternKind, PatternShape};

    fn shapes(config: &'static ModeConfig) -> Vec<PatternShape> {
        build_patterns(config).iter().map(Pattern::shape).collect()
    }

    fn tick(pattern: &mut Pattern, rng: &mut fastrand::Rng, time_ms: f64) -> crate::pattern::PatternEvent {
        let mut ctx = TickContext {
            rng,
            tick: 0,
            time_ms,
            step_seconds: 2.0,
        };
        pattern.fire(&mut ctx, 1.0)
    }

    #[test]
    fn one_pattern_per_layer_in_order() {
        let patterns = build_patterns(lookup("focus"));
        let layers: Vec<LayerId> = patterns.iter().map(Pattern::layer).collect();
        assert_eq!(layers, LayerId::ALL.to_vec());
    }

    #[test]
    fn structure_is_idempotent() {
        for config in catalog() {
            assert_eq!(shapes(config), shapes(config), "{}", config.id);
        }
    }

    #[test]
    fn pattern_kinds_follow_layer_roles() {
        let kinds: Vec<PatternKind> = shapes(lookup("relax")).iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PatternKind::Sequence,
                PatternKind::Loop,
                PatternKind::Sequence,
                PatternKind::Loop,
                PatternKind::Sequence,
            ]
        );
    }

    #[test]
    fn pad_steps_are_the_mode_chords() {
        let config = ModeId::Focus.config();
        let shape = &shapes(config)[0];
        let steps = shape.steps.as_ref().unwrap();
        assert_eq!(steps.len(), config.pad_chords.len());
        assert!(steps.iter().all(|s| matches!(s, Step::Play(p) if p.len() == 4)));
    }

    #[test]
    fn pulse_uses_mode_subdivision() {
        for config in catalog() {
            let shape = &shapes(config)[2];
            assert_eq!(shape.subdivision, config.pulse_subdivision);
            let steps = shape.steps.as_ref().unwrap();
            assert_eq!(steps.len(), PULSE_TEMPLATE.len());
        }
    }

    #[test]
    fn melody_draws_from_scale() {
        let config = ModeId::Odyssey.config();
        let scale = frequencies(config.melody_scale);
        let shape = &shapes(config)[4];
        for step in shape.steps.as_ref().unwrap() {
            if let Step::Play(p) = step {
                assert!(scale.contains(&p[0]));
            }
        }
    }

    #[test]
    fn drone_first_tick_always_plays_a_mode_note() {
        let config = ModeId::Sleep.config();
        let notes = frequencies(config.drone_notes);
        let mut rng = fastrand::Rng::with_seed(11);
        let mut pattern = drone(config);
        let event = tick(&mut pattern, &mut rng, 0.0);
        assert_eq!(event.notes.len(), 1);
        assert!(notes.contains(&event.notes[0].frequency));
    }

    #[test]
    fn drone_is_probabilistic_after_first_tick() {
        let mut rng = fastrand::Rng::with_seed(5);
        let mut pattern = drone(ModeId::Sleep.config());
        let fired = (0..200)
            .filter(|_| !tick(&mut pattern, &mut rng, 0.0).notes.is_empty())
            .count();
        assert!(fired > 20 && fired < 180, "fired {fired} of 200");
    }

    #[test]
    fn texture_keeps_noise_running_and_moves_filter() {
        let mut rng = fastrand::Rng::with_seed(9);
        let mut pattern = texture(ModeId::Relax.config());
        let mut targets = Vec::new();
        for i in 0..8 {
            let event = tick(&mut pattern, &mut rng, i as f64 * 2000.0);
            assert_eq!(event.notes.len(), 1);
            assert_eq!(event.notes[0].duration, None);
            let filter = event.filter.unwrap();
            assert!((150.0..=6_000.0).contains(&filter.frequency));
            assert_eq!(filter.ramp_seconds, 2.0);
            targets.push(filter.frequency);
        }
        assert!(targets.windows(2).any(|w| (w[0] - w[1]).abs() > 1.0));
    }
}
