//! A bank of voices fed by a sample-stamped note queue.
//!
//! Notes are never started "now": each one carries the absolute sample at
//! which it begins (and optionally the sample at which it is released), and
//! the synth starts it exactly on that sample while rendering. This keeps
//! musical timing independent of when the control side happened to enqueue
//! the note.

use std::collections::VecDeque;

use serde::Serialize;

use super::envelope::EnvelopeShape;
use super::noise::NoiseColor;
use super::oscillator::Waveform;
use super::voice::Voice;

/// Voice architecture of a synth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SynthKind {
    /// Up to `voices` overlapping notes; the quietest voice is stolen when full.
    Poly { waveform: Waveform, voices: usize },
    /// One voice; a new note while gated glides instead of retriggering.
    Mono { waveform: Waveform, glide: f64 },
    /// One noise voice; triggering while already gated keeps it running.
    Noise { color: NoiseColor },
}

/// A note queued for a sample-accurate start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub frequency: f64,
    pub velocity: f64,
    /// Absolute sample on the transport clock.
    pub start: u64,
    /// Length in samples before gate off; `None` holds until released.
    pub length: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Synth {
    kind: SynthKind,
    voices: Vec<Voice>,
    pending: VecDeque<NoteEvent>,
    sample_rate: f64,
}

impl Synth {
    pub fn new(kind: SynthKind, shape: EnvelopeShape, sample_rate: f64, seed: u64) -> Self {
        let voices = match kind {
            SynthKind::Poly { waveform, voices } => (0..voices.max(1))
                .map(|_| Voice::oscillator(waveform, shape, sample_rate))
                .collect(),
            SynthKind::Mono { waveform, .. } => {
                vec![Voice::oscillator(waveform, shape, sample_rate)]
            }
            SynthKind::Noise { color } => vec![Voice::noise(color, seed, shape, sample_rate)],
        };
        Synth {
            kind,
            voices,
            pending: VecDeque::new(),
            sample_rate,
        }
    }

    pub fn kind(&self) -> SynthKind {
        self.kind
    }

    /// Queue a note. Events with equal start times keep their enqueue order.
    pub fn schedule(&mut self, event: NoteEvent) {
        let index = self.pending.partition_point(|e| e.start <= event.start);
        self.pending.insert(index, event);
    }

    /// Change the oscillator shape of every voice (ringing notes included).
    pub fn set_waveform(&mut self, waveform: Waveform) {
        for voice in &mut self.voices {
            if let Some(osc) = voice.oscillator_mut() {
                osc.set_waveform(waveform);
            }
        }
        match &mut self.kind {
            SynthKind::Poly { waveform: w, .. } | SynthKind::Mono { waveform: w, .. } => {
                *w = waveform
            }
            SynthKind::Noise { .. } => {}
        }
    }

    /// Drop queued notes and gate off every voice; tails ring out.
    pub fn release_all(&mut self) {
        self.pending.clear();
        self.voices.iter_mut().for_each(Voice::note_off);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_finished()).count()
    }

    /// True while the held (gated) voice of a mono/noise synth is sounding.
    pub fn is_held(&self) -> bool {
        self.voices.iter().any(Voice::is_gated)
    }

    /// Render the sample at absolute position `now`.
    #[inline]
    pub fn next_sample(&mut self, now: u64) -> f64 {
        while self.pending.front().is_some_and(|e| e.start <= now) {
            if let Some(event) = self.pending.pop_front() {
                self.start(event);
            }
        }
        self.voices.iter_mut().map(|v| v.next_sample(now)).sum()
    }

    fn start(&mut self, event: NoteEvent) {
        let release_at = event.length.map(|len| event.start + len.max(1));
        let voice = match self.kind {
            SynthKind::Poly { .. } => {
                let index = self.free_voice();
                let voice = &mut self.voices[index];
                voice.note_on(event.frequency, event.velocity);
                voice
            }
            SynthKind::Mono { glide, .. } => {
                let voice = &mut self.voices[0];
                if voice.is_gated() {
                    voice.glide(event.frequency, glide, event.velocity);
                } else {
                    voice.note_on(event.frequency, event.velocity);
                }
                voice
            }
            SynthKind::Noise { .. } => {
                let voice = &mut self.voices[0];
                if voice.is_gated() {
                    voice.set_velocity(event.velocity);
                } else {
                    voice.note_on(0.0, event.velocity);
                }
                voice
            }
        };
        voice.release_at(release_at);
    }

    /// A finished voice if there is one, otherwise the quietest.
    fn free_voice(&self) -> usize {
        if let Some(index) = self.voices.iter().position(Voice::is_finished) {
            return index;
        }
        self.voices
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.level().total_cmp(&b.level()))
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 1000.0;

    fn note(start: u64, length: Option<u64>) -> NoteEvent {
        NoteEvent {
            frequency: 110.0,
            velocity: 0.8,
            start,
            length,
        }
    }

    fn poly() -> Synth {
        Synth::new(
            SynthKind::Poly {
                waveform: Waveform::Sawtooth,
                voices: 4,
            },
            EnvelopeShape::new(0.01, 0.01, 0.8, 0.05),
            SR,
            1,
        )
    }

    #[test]
    fn silent_until_scheduled_start() {
        let mut synth = poly();
        synth.schedule(note(100, Some(200)));
        for t in 0..100 {
            assert_eq!(synth.next_sample(t), 0.0, "sound before start at {t}");
        }
        let energy: f64 = (100..200).map(|t| synth.next_sample(t).abs()).sum();
        assert!(energy > 0.0);
        assert_eq!(synth.pending(), 0);
    }

    #[test]
    fn queue_stays_ordered() {
        let mut synth = poly();
        synth.schedule(note(300, None));
        synth.schedule(note(100, None));
        synth.schedule(note(200, None));
        let starts: Vec<u64> = synth.pending.iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn length_releases_note() {
        let mut synth = poly();
        synth.schedule(note(0, Some(50)));
        for t in 0..50 {
            synth.next_sample(t);
        }
        assert_eq!(synth.active_voices(), 1);
        for t in 50..200 {
            synth.next_sample(t);
        }
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn poly_overlaps_notes() {
        let mut synth = poly();
        synth.schedule(note(0, None));
        synth.schedule(note(10, None));
        synth.schedule(note(20, None));
        for t in 0..30 {
            synth.next_sample(t);
        }
        assert_eq!(synth.active_voices(), 3);
    }

    #[test]
    fn poly_steals_when_full() {
        let mut synth = poly();
        for i in 0..6 {
            synth.schedule(note(i * 5, None));
        }
        for t in 0..40 {
            synth.next_sample(t);
        }
        assert_eq!(synth.active_voices(), 4);
    }

    #[test]
    fn mono_glides_instead_of_retriggering() {
        let mut synth = Synth::new(
            SynthKind::Mono {
                waveform: Waveform::Sine,
                glide: 0.1,
            },
            EnvelopeShape::new(0.01, 0.01, 0.9, 0.5),
            SR,
            1,
        );
        synth.schedule(note(0, None));
        synth.schedule(NoteEvent {
            frequency: 220.0,
            ..note(50, None)
        });
        for t in 0..200 {
            synth.next_sample(t);
        }
        assert!(synth.is_held());
        let osc = synth.voices[0]
            .oscillator_ref()
            .expect("mono synth must use an oscillator");
        assert!((osc.frequency() - 220.0).abs() < 1e-6);
    }

    #[test]
    fn noise_trigger_keeps_running() {
        let mut synth = Synth::new(
            SynthKind::Noise {
                color: NoiseColor::Pink,
            },
            EnvelopeShape::new(0.01, 0.01, 1.0, 0.1),
            SR,
            9,
        );
        synth.schedule(note(0, None));
        synth.schedule(note(100, None));
        for t in 0..200 {
            synth.next_sample(t);
        }
        assert!(synth.is_held());
        assert_eq!(synth.voices[0].level(), 1.0);
    }

    #[test]
    fn release_all_clears_queue_and_gates() {
        let mut synth = poly();
        synth.schedule(note(0, None));
        synth.schedule(note(500, None));
        for t in 0..20 {
            synth.next_sample(t);
        }
        synth.release_all();
        assert_eq!(synth.pending(), 0);
        assert!(!synth.is_held());
        for t in 20..200 {
            synth.next_sample(t);
        }
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn waveform_change_reaches_voices() {
        let mut synth = poly();
        synth.set_waveform(Waveform::Triangle);
        assert!(matches!(
            synth.kind(),
            SynthKind::Poly {
                waveform: Waveform::Triangle,
                ..
            }
        ));
    }
}
