//! Note names and pitch conversion.

/// Semitone offsets of the natural letters from C.
const LETTERS: [(char, i32); 7] = [
    ('C', 0),
    ('D', 2),
    ('E', 4),
    ('F', 5),
    ('G', 7),
    ('A', 9),
    ('B', 11),
];

/// MIDI number of a scientific pitch name such as `A4`, `F#3` or `Bb2`.
pub fn note_to_midi(name: &str) -> Option<i32> {
    let letter = name.chars().next()?;
    let (_, natural) = LETTERS.iter().find(|(l, _)| *l == letter)?;
    let rest = &name[letter.len_utf8()..];
    let (accidental, octave) = if let Some(o) = rest.strip_prefix('#') {
        (1, o)
    } else if let Some(o) = rest.strip_prefix('b') {
        (-1, o)
    } else {
        (0, rest)
    };
    let octave = octave.parse::<i32>().ok()?;
    Some(12 * (octave + 1) + natural + accidental)
}

/// `tuning_pitch * 2^((midi - 69) / 12)`, where `tuning_pitch` is A4.
pub fn midi_to_frequency(midi: i32, tuning_pitch: f64) -> f64 {
    tuning_pitch * 2.0_f64.powf((midi as f64 - 69.0) / 12.0)
}

/// Frequency of a note name at A4 = 440 Hz.
pub fn note_to_frequency(note: &str) -> Option<f64> {
    note_to_midi(note).map(|midi| midi_to_frequency(midi, 440.0))
}

/// Lowest note of a set, by pitch.
pub fn lowest_note<'a>(notes: &[&'a str]) -> Option<&'a str> {
    notes
        .iter()
        .filter_map(|&n| note_to_midi(n).map(|m| (m, n)))
        .min_by_key(|&(m, _)| m)
        .map(|(_, n)| n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn concert_a_is_440() {
        assert_abs_diff_eq!(note_to_frequency("A4").unwrap(), 440.0, epsilon = 0.01);
    }

    #[test]
    fn middle_c() {
        assert_eq!(note_to_midi("C4"), Some(60));
        assert_abs_diff_eq!(note_to_frequency("C4").unwrap(), 261.63, epsilon = 0.01);
    }

    #[test]
    fn accidentals_are_enharmonic() {
        assert_eq!(note_to_midi("F#4"), note_to_midi("Gb4"));
        assert_eq!(note_to_midi("Cb4"), Some(59));
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "H4", "C", "C#", "4C", "Cx4"] {
            assert_eq!(note_to_midi(bad), None, "{bad:?} should not parse");
        }
    }

    #[test]
    fn negative_octaves_parse() {
        assert_eq!(note_to_midi("C-1"), Some(0));
        assert_eq!(note_to_midi("A-1"), Some(9));
    }

    #[test]
    fn lowest_note_by_pitch() {
        assert_eq!(lowest_note(&["G2", "C2", "E3"]), Some("C2"));
        assert_eq!(lowest_note(&[]), None);
    }

    #[test]
    fn tuning_432() {
        assert_abs_diff_eq!(midi_to_frequency(69, 432.0), 432.0, epsilon = 1e-9);
        assert_abs_diff_eq!(midi_to_frequency(81, 440.0), 880.0, epsilon = 1e-9);
    }
}
