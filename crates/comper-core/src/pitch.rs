//! Pitch classes, chord qualities, and the chord-to-pitch mapping

use serde::{Deserialize, Serialize};

/// Fixed reference octave: pitch class C maps to middle C (MIDI 60).
/// Callers needing other registers apply a constant offset, e.g. bass
/// doubling is the lowest chord pitch minus 12.
pub const REFERENCE_OCTAVE_BASE: u8 = 60;

/// Melody grid row to MIDI pitch, row 0 at the top.
/// Descending by semitone from C5 (72) down to Db4 (61).
pub const MELODY_ROW_PITCHES: [u8; 12] = [72, 71, 70, 69, 68, 67, 66, 65, 64, 63, 62, 61];

/// The twelve pitch classes, spelled the way the timeline editor spells keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    Db,
    D,
    Eb,
    E,
    F,
    Gb,
    G,
    Ab,
    A,
    Bb,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        Self::C,
        Self::Db,
        Self::D,
        Self::Eb,
        Self::E,
        Self::F,
        Self::Gb,
        Self::G,
        Self::Ab,
        Self::A,
        Self::Bb,
        Self::B,
    ];

    /// Semitone offset from C (0-11)
    pub fn semitone(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::C => "C",
            Self::Db => "Db",
            Self::D => "D",
            Self::Eb => "Eb",
            Self::E => "E",
            Self::F => "F",
            Self::Gb => "Gb",
            Self::G => "G",
            Self::Ab => "Ab",
            Self::A => "A",
            Self::Bb => "Bb",
            Self::B => "B",
        }
    }
}

/// Chord quality tags the harmonic timeline uses.
///
/// Extended qualities collapse onto the four-note voicing of their family:
/// a Major 9 block sounds the Major 7 set, a Dominant 13 the Dominant 7 set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordQuality {
    Major7,
    Major9,
    Minor7,
    Minor9,
    Minor6,
    Dominant7,
    Dominant9,
    Dominant13,
    HalfDiminished7,
}

impl ChordQuality {
    /// Chord intervals from the root (semitones, ascending)
    pub fn intervals(&self) -> &'static [u8; 4] {
        match self {
            Self::Major7 | Self::Major9 => &[0, 4, 7, 11],
            Self::Minor7 | Self::Minor9 => &[0, 3, 7, 10],
            Self::Minor6 => &[0, 3, 7, 9],
            Self::Dominant7 | Self::Dominant9 | Self::Dominant13 => &[0, 4, 7, 10],
            Self::HalfDiminished7 => &[0, 3, 6, 10],
        }
    }

    /// Parse an editor quality tag such as "Minor 7" or "Dominant 13".
    ///
    /// Unrecognized tags fall back to `Major7`. This is the documented
    /// default voicing, not an error; a timeline with an exotic tag still
    /// plays.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "major 7" | "maj7" => Self::Major7,
            "major 9" | "maj9" => Self::Major9,
            "minor 7" | "min7" | "m7" => Self::Minor7,
            "minor 9" | "min9" | "m9" => Self::Minor9,
            "minor 6" | "min6" | "m6" => Self::Minor6,
            "dominant 7" | "dom7" | "7" => Self::Dominant7,
            "dominant 9" | "dom9" | "9" => Self::Dominant9,
            "dominant 13" | "dom13" | "13" => Self::Dominant13,
            "half-diminished 7" | "half diminished 7" | "m7b5" => Self::HalfDiminished7,
            _ => Self::Major7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Major7 => "Maj7",
            Self::Major9 => "Maj9",
            Self::Minor7 => "Min7",
            Self::Minor9 => "Min9",
            Self::Minor6 => "Min6",
            Self::Dominant7 => "Dom7",
            Self::Dominant9 => "Dom9",
            Self::Dominant13 => "Dom13",
            Self::HalfDiminished7 => "m7b5",
        }
    }
}

/// Map a chord symbol to its ordered four-note MIDI pitch set at the
/// reference octave. Pure and deterministic.
pub fn chord_pitches(root: PitchClass, quality: ChordQuality) -> Vec<u8> {
    quality
        .intervals()
        .iter()
        .map(|&interval| REFERENCE_OCTAVE_BASE + root.semitone() + interval)
        .collect()
}
