//! The shared musical clock.
//!
//! The clock is a count of rendered samples. It advances whenever audio is
//! rendered, running or not; `running` only decides whether patterns may
//! schedule new events. Tempo converts musical subdivisions into samples and
//! is read at the moment a tick time is computed, so a tempo change never
//! moves an event that is already on the timeline.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::AmbientError;

/// A musical duration in Tone-style notation (`"1m"`, `"4n"`, `"8n."`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subdivision {
    Bars(u32),
    Whole,
    Half,
    Quarter,
    DottedQuarter,
    Eighth,
    DottedEighth,
    Sixteenth,
}

impl Subdivision {
    /// Length in quarter-note beats (4/4 time).
    pub fn beats(self) -> f64 {
        match self {
            Subdivision::Bars(n) => 4.0 * n as f64,
            Subdivision::Whole => 4.0,
            Subdivision::Half => 2.0,
            Subdivision::Quarter => 1.0,
            Subdivision::DottedQuarter => 1.5,
            Subdivision::Eighth => 0.5,
            Subdivision::DottedEighth => 0.75,
            Subdivision::Sixteenth => 0.25,
        }
    }
}

impl fmt::Display for Subdivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subdivision::Bars(n) => write!(f, "{n}m"),
            Subdivision::Whole => f.write_str("1n"),
            Subdivision::Half => f.write_str("2n"),
            Subdivision::Quarter => f.write_str("4n"),
            Subdivision::DottedQuarter => f.write_str("4n."),
            Subdivision::Eighth => f.write_str("8n"),
            Subdivision::DottedEighth => f.write_str("8n."),
            Subdivision::Sixteenth => f.write_str("16n"),
        }
    }
}

impl FromStr for Subdivision {
    type Err = AmbientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sub = match s.trim() {
            "1n" => Subdivision::Whole,
            "2n" => Subdivision::Half,
            "4n" => Subdivision::Quarter,
            "4n." => Subdivision::DottedQuarter,
            "8n" => Subdivision::Eighth,
            "8n." => Subdivision::DottedEighth,
            "16n" => Subdivision::Sixteenth,
            other => match other.strip_suffix('m').map(str::parse::<u32>) {
                Some(Ok(n)) if n > 0 => Subdivision::Bars(n),
                _ => return Err(AmbientError::config(format!("unknown subdivision '{s}'"))),
            },
        };
        Ok(sub)
    }
}

impl Serialize for Subdivision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;

/// Sample clock plus tempo.
#[derive(Debug, Clone)]
pub struct Transport {
    sample_rate: f64,
    bpm: f64,
    position: u64,
    running: bool,
}

impl Transport {
    pub fn new(sample_rate: f64, bpm: f64) -> Self {
        Transport {
            sample_rate,
            bpm: bpm.clamp(MIN_BPM, MAX_BPM),
            position: 0,
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current absolute sample.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn advance(&mut self, frames: u64) {
        self.position += frames;
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Affects tick times computed from now on.
    pub fn set_bpm(&mut self, bpm: f64) {
        if bpm.is_finite() {
            self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Length of one subdivision at the current tempo, in (fractional) samples.
    pub fn subdivision_samples(&self, subdivision: Subdivision) -> f64 {
        subdivision.beats() * 60.0 / self.bpm * self.sample_rate
    }

    pub fn seconds_to_samples(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate).round() as u64
    }

    pub fn samples_to_seconds(&self, samples: u64) -> f64 {
        samples as f64 / self.sample_rate
    }
}
