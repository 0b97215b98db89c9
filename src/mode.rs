//! The mode catalog: fixed musical configuration behind each mood.
//!
//! Every mode id maps to one immutable [`ModeConfig`]. Lookup by name never
//! fails: anything unrecognized resolves to [`ModeId::Focus`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::dsp::oscillator::Waveform;
use crate::error::AmbientError;
use crate::layer::LayerId;
use crate::transport::Subdivision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModeId {
    #[default]
    Focus,
    Relax,
    Sleep,
    Move,
    Study,
    Odyssey,
}

impl ModeId {
    pub const ALL: [ModeId; 6] = [
        ModeId::Focus,
        ModeId::Relax,
        ModeId::Sleep,
        ModeId::Move,
        ModeId::Study,
        ModeId::Odyssey,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModeId::Focus => "focus",
            ModeId::Relax => "relax",
            ModeId::Sleep => "sleep",
            ModeId::Move => "move",
            ModeId::Study => "study",
            ModeId::Odyssey => "odyssey",
        }
    }

    /// Case-insensitive lookup that falls back to `Focus`.
    pub fn resolve(name: &str) -> ModeId {
        name.parse().unwrap_or_default()
    }

    pub fn config(self) -> &'static ModeConfig {
        ModeConfig::get(self)
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeId {
    type Err = AmbientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ModeId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| AmbientError::config(format!("unknown mode '{name}'")))
    }
}

/// Target volume per layer, in dB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayerVolumes {
    pub pad: f64,
    pub drone: f64,
    pub pulse: f64,
    pub texture: f64,
    pub melody: f64,
}

impl LayerVolumes {
    pub fn get(&self, layer: LayerId) -> f64 {
        match layer {
            LayerId::Pad => self.pad,
            LayerId::Drone => self.drone,
            LayerId::Pulse => self.pulse,
            LayerId::Texture => self.texture,
            LayerId::Melody => self.melody,
        }
    }
}

/// Shape of a mode's "breathing" intensity curve.
///
/// `center + swing * sin(t_ms * rate_per_ms) + U(0, jitter)`, clamped to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntensityProfile {
    pub center: f64,
    pub swing: f64,
    pub rate_per_ms: f64,
    pub jitter: f64,
}

/// Immutable musical parameters of one mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeConfig {
    pub id: ModeId,
    pub name: &'static str,
    pub description: &'static str,
    pub tempo_bpm: f64,
    pub pad_chords: &'static [&'static [&'static str]],
    pub drone_notes: &'static [&'static str],
    pub pulse_subdivision: Subdivision,
    pub melody_scale: &'static [&'static str],
    /// 0..1, scales the texture filter's wandering and its noise level.
    pub texture_intensity: f64,
    pub master_filter_hz: f64,
    pub volumes: LayerVolumes,
    pub pad_waveform: Waveform,
    pub melody_waveform: Waveform,
    /// Chance that a drone loop tick moves to a new note.
    pub drone_probability: f64,
    pub intensity: IntensityProfile,
}

impl ModeConfig {
    pub fn get(id: ModeId) -> &'static ModeConfig {
        match id {
            ModeId::Focus => &CATALOG[0],
            ModeId::Relax => &CATALOG[1],
            ModeId::Sleep => &CATALOG[2],
            ModeId::Move => &CATALOG[3],
            ModeId::Study => &CATALOG[4],
            ModeId::Odyssey => &CATALOG[5],
        }
    }

    pub fn volume_db(&self, layer: LayerId) -> f64 {
        self.volumes.get(layer)
    }
}

/// Resolve a mode name to its configuration. Never fails.
pub fn lookup(name: &str) -> &'static ModeConfig {
    ModeConfig::get(ModeId::resolve(name))
}

/// Every mode, in [`ModeId::ALL`] order.
pub fn catalog() -> &'static [ModeConfig] {
    &CATALOG
}

static CATALOG: [ModeConfig; 6] = [
    ModeConfig {
        id: ModeId::Focus,
        name: "Focus",
        description: "Deep concentration",
        tempo_bpm: 72.0,
        pad_chords: &[
            &["C3", "E3", "G3", "B3"],
            &["A2", "C3", "E3", "G3"],
            &["F2", "A2", "C3", "E3"],
            &["G2", "B2", "D3", "A3"],
        ],
        drone_notes: &["C2", "G2"],
        pulse_subdivision: Subdivision::Eighth,
        melody_scale: &["C4", "D4", "E4", "G4", "A4", "C5"],
        texture_intensity: 0.3,
        master_filter_hz: 2400.0,
        volumes: LayerVolumes {
            pad: -14.0,
            drone: -16.0,
            pulse: -24.0,
            texture: -28.0,
            melody: -20.0,
        },
        pad_waveform: Waveform::Sawtooth,
        melody_waveform: Waveform::Triangle,
        drone_probability: 0.5,
        intensity: IntensityProfile {
            center: 0.4,
            swing: 0.15,
            rate_per_ms: 0.002,
            jitter: 0.2,
        },
    },
    ModeConfig {
        id: ModeId::Relax,
        name: "Relax",
        description: "Calm your mind",
        tempo_bpm: 60.0,
        pad_chords: &[
            &["F2", "A2", "C3", "E3"],
            &["G2", "B2", "D3", "E3"],
            &["D2", "F2", "A2", "C3"],
            &["C3", "E3", "G3", "D4"],
        ],
        drone_notes: &["F1", "C2", "F2"],
        pulse_subdivision: Subdivision::Quarter,
        melody_scale: &["F4", "G4", "A4", "C5", "D5"],
        texture_intensity: 0.5,
        master_filter_hz: 1600.0,
        volumes: LayerVolumes {
            pad: -12.0,
            drone: -15.0,
            pulse: -30.0,
            texture: -24.0,
            melody: -22.0,
        },
        pad_waveform: Waveform::Triangle,
        melody_waveform: Waveform::Sine,
        drone_probability: 0.4,
        intensity: IntensityProfile {
            center: 0.25,
            swing: 0.1,
            rate_per_ms: 0.001,
            jitter: 0.15,
        },
    },
    ModeConfig {
        id: ModeId::Sleep,
        name: "Sleep",
        description: "Drift off slowly",
        tempo_bpm: 48.0,
        pad_chords: &[&["D2", "F2", "A2", "C3"], &["Bb1", "D2", "F2", "A2"]],
        drone_notes: &["D1", "A1"],
        pulse_subdivision: Subdivision::Half,
        melody_scale: &["D4", "F4", "A4", "C5"],
        texture_intensity: 0.7,
        master_filter_hz: 900.0,
        volumes: LayerVolumes {
            pad: -13.0,
            drone: -14.0,
            pulse: -36.0,
            texture: -22.0,
            melody: -28.0,
        },
        pad_waveform: Waveform::Sine,
        melody_waveform: Waveform::Sine,
        drone_probability: 0.3,
        intensity: IntensityProfile {
            center: 0.15,
            swing: 0.05,
            rate_per_ms: 0.0005,
            jitter: 0.05,
        },
    },
    ModeConfig {
        id: ModeId::Move,
        name: "Move",
        description: "Keep the momentum",
        tempo_bpm: 96.0,
        pad_chords: &[
            &["E2", "G2", "B2", "D3"],
            &["C3", "E3", "G3", "B3"],
            &["D3", "F#3", "A3", "C4"],
            &["B2", "D3", "F#3", "A3"],
        ],
        drone_notes: &["E1", "B1", "E2"],
        pulse_subdivision: Subdivision::Sixteenth,
        melody_scale: &["E4", "G4", "A4", "B4", "D5", "E5"],
        texture_intensity: 0.2,
        master_filter_hz: 4000.0,
        volumes: LayerVolumes {
            pad: -16.0,
            drone: -18.0,
            pulse: -18.0,
            texture: -30.0,
            melody: -19.0,
        },
        pad_waveform: Waveform::Sawtooth,
        melody_waveform: Waveform::Square,
        drone_probability: 0.7,
        intensity: IntensityProfile {
            center: 0.55,
            swing: 0.2,
            rate_per_ms: 0.003,
            jitter: 0.25,
        },
    },
    ModeConfig {
        id: ModeId::Study,
        name: "Study",
        description: "Steady and unobtrusive",
        tempo_bpm: 66.0,
        pad_chords: &[
            &["G2", "B2", "D3", "F#3"],
            &["E2", "G2", "B2", "D3"],
            &["C3", "E3", "G3", "B3"],
            &["D3", "F#3", "A3", "E4"],
        ],
        drone_notes: &["G1", "D2"],
        pulse_subdivision: Subdivision::DottedEighth,
        melody_scale: &["G4", "A4", "B4", "D5", "E5"],
        texture_intensity: 0.35,
        master_filter_hz: 2000.0,
        volumes: LayerVolumes {
            pad: -15.0,
            drone: -17.0,
            pulse: -26.0,
            texture: -27.0,
            melody: -23.0,
        },
        pad_waveform: Waveform::Triangle,
        melody_waveform: Waveform::Triangle,
        drone_probability: 0.5,
        intensity: IntensityProfile {
            center: 0.35,
            swing: 0.1,
            rate_per_ms: 0.0015,
            jitter: 0.15,
        },
    },
    ModeConfig {
        id: ModeId::Odyssey,
        name: "Odyssey",
        description: "Epic journey",
        tempo_bpm: 80.0,
        pad_chords: &[
            &["A2", "C3", "E3", "G3"],
            &["F2", "A2", "C3", "E3"],
            &["C3", "E3", "G3", "B3"],
            &["G2", "B2", "D3", "F#3"],
        ],
        drone_notes: &["A1", "E2", "A2"],
        pulse_subdivision: Subdivision::Eighth,
        melody_scale: &["A4", "B4", "C5", "E5", "G5", "A5"],
        texture_intensity: 0.45,
        master_filter_hz: 3200.0,
        volumes: LayerVolumes {
            pad: -12.0,
            drone: -15.0,
            pulse: -22.0,
            texture: -25.0,
            melody: -18.0,
        },
        pad_waveform: Waveform::Sawtooth,
        melody_waveform: Waveform::Triangle,
        drone_probability: 0.6,
        intensity: IntensityProfile {
            center: 0.5,
            swing: 0.2,
            rate_per_ms: 0.0015,
            jitter: 0.3,
        },
    },
];
