//! One sounding note: a source shaped by an envelope and scaled by velocity.

use super::envelope::{Envelope, EnvelopeShape};
use super::noise::{Noise, NoiseColor};
use super::oscillator::{Oscillator, Waveform};

/// Pitched or unpitched signal feeding a voice.
#[derive(Debug, Clone)]
pub enum Source {
    Oscillator(Oscillator),
    Noise(Noise),
}

#[derive(Debug, Clone)]
pub struct Voice {
    source: Source,
    envelope: Envelope,
    velocity: f64,
    /// Absolute sample at which the gate closes.
    gate_off_at: Option<u64>,
    sounding: bool,
}

impl Voice {
    pub fn oscillator(waveform: Waveform, shape: EnvelopeShape, sample_rate: f64) -> Self {
        Voice::from_source(Source::Oscillator(Oscillator::new(waveform, sample_rate)), shape, sample_rate)
    }

    pub fn noise(color: NoiseColor, seed: u64, shape: EnvelopeShape, sample_rate: f64) -> Self {
        Voice::from_source(Source::Noise(Noise::new(color, seed)), shape, sample_rate)
    }

    fn from_source(source: Source, shape: EnvelopeShape, sample_rate: f64) -> Self {
        Voice {
            source,
            envelope: Envelope::new(shape, sample_rate),
            velocity: 1.0,
            gate_off_at: None,
            sounding: false,
        }
    }

    pub fn oscillator_ref(&self) -> Option<&Oscillator> {
        match &self.source {
            Source::Oscillator(osc) => Some(osc),
            Source::Noise(_) => None,
        }
    }

    pub fn oscillator_mut(&mut self) -> Option<&mut Oscillator> {
        match &mut self.source {
            Source::Oscillator(osc) => Some(osc),
            Source::Noise(_) => None,
        }
    }

    pub fn set_velocity(&mut self, velocity: f64) {
        self.velocity = velocity.clamp(0.0, 1.0);
    }

    /// Close the gate at absolute sample `at`; `None` holds it open.
    pub fn release_at(&mut self, at: Option<u64>) {
        self.gate_off_at = at;
    }

    fn open_gate(&mut self, velocity: f64) {
        self.set_velocity(velocity);
        self.gate_off_at = None;
        self.sounding = true;
        self.envelope.gate_on();
    }

    /// Start a note from the top of the cycle. Noise ignores `frequency`.
    pub fn note_on(&mut self, frequency: f64, velocity: f64) {
        if let Some(osc) = self.oscillator_mut() {
            osc.set_frequency(frequency);
            osc.reset();
        }
        self.open_gate(velocity);
    }

    /// Slide a held note to `frequency`; a released voice is regated.
    pub fn glide(&mut self, frequency: f64, seconds: f64, velocity: f64) {
        if let Some(osc) = self.oscillator_mut() {
            osc.glide_to(frequency, seconds);
        }
        if self.envelope.is_gated() {
            self.set_velocity(velocity);
            self.gate_off_at = None;
        } else {
            self.open_gate(velocity);
        }
    }

    pub fn note_off(&mut self) {
        self.gate_off_at = None;
        self.envelope.gate_off();
    }

    #[inline]
    pub fn next_sample(&mut self, now: u64) -> f64 {
        if !self.sounding {
            return 0.0;
        }
        if self.gate_off_at.is_some_and(|at| at <= now) {
            self.note_off();
        }
        let raw = match &mut self.source {
            Source::Oscillator(osc) => osc.next_sample(),
            Source::Noise(noise) => noise.next_sample(),
        };
        let amplitude = self.envelope.next_sample() * self.velocity;
        self.sounding = !self.envelope.is_finished();
        raw * amplitude
    }

    /// Current envelope level, used to pick a voice to steal.
    pub fn level(&self) -> f64 {
        self.envelope.level()
    }

    pub fn is_finished(&self) -> bool {
        !self.sounding
    }

    pub fn is_gated(&self) -> bool {
        self.envelope.is_gated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44_100.0;

    fn blip() -> EnvelopeShape {
        EnvelopeShape::new(0.001, 0.001, 0.5, 0.01)
    }

    fn peak(voice: &mut Voice, range: std::ops::Range<u64>) -> f64 {
        range.map(|t| voice.next_sample(t).abs()).fold(0.0, f64::max)
    }

    #[test]
    fn fresh_voice_is_silent() {
        let mut voice = Voice::oscillator(Waveform::Sine, blip(), SR);
        assert!(voice.is_finished());
        assert_eq!(peak(&mut voice, 0..100), 0.0);
    }

    #[test]
    fn note_on_sounds_within_bounds() {
        let mut voice = Voice::oscillator(Waveform::Square, EnvelopeShape::default(), SR);
        voice.note_on(880.0, 1.0);
        let loudest = peak(&mut voice, 0..44_100);
        assert!(loudest > 0.1 && loudest <= 1.5, "peak {loudest}");
    }

    #[test]
    fn velocity_scales_output() {
        let mut loud = Voice::oscillator(Waveform::Triangle, blip(), SR);
        let mut soft = Voice::oscillator(Waveform::Triangle, blip(), SR);
        loud.note_on(220.0, 1.0);
        soft.note_on(220.0, 0.25);
        assert!(peak(&mut soft, 0..2_000) < peak(&mut loud, 0..2_000) * 0.3);
    }

    #[test]
    fn timed_release_finishes_the_note() {
        let mut voice = Voice::oscillator(Waveform::Sawtooth, blip(), SR);
        voice.note_on(220.0, 1.0);
        voice.release_at(Some(500));
        peak(&mut voice, 0..500);
        assert!(voice.is_gated());
        peak(&mut voice, 500..3_000);
        assert!(voice.is_finished());
        assert_eq!(voice.next_sample(3_000), 0.0);
    }

    #[test]
    fn glide_keeps_the_gate_open() {
        let mut voice = Voice::oscillator(Waveform::Sine, blip(), 1_000.0);
        voice.note_on(110.0, 1.0);
        peak(&mut voice, 0..10);
        voice.glide(220.0, 0.1, 0.8);
        peak(&mut voice, 10..200);
        assert!(voice.is_gated());
        let osc = voice.oscillator_ref().unwrap();
        assert!((osc.frequency() - 220.0).abs() < 1e-9);
    }

    #[test]
    fn noise_voice_has_no_oscillator() {
        let mut voice = Voice::noise(NoiseColor::White, 3, blip(), SR);
        assert!(voice.oscillator_ref().is_none());
        voice.note_on(0.0, 1.0);
        let energy: f64 = (0..1_000).map(|t| voice.next_sample(t).powi(2)).sum();
        assert!(energy > 1.0);
    }
}
