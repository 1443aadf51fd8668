//! Compiling a timeline snapshot into a time-ordered trigger schedule

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::pitch::{chord_pitches, MELODY_ROW_PITCHES};
use crate::timeline::{HarmonicBlock, MelodyMark};

/// Melody notes hold for slightly under one beat
pub const MELODY_NOTE_BEATS: f64 = 0.9;

/// A single scheduled trigger, immutable once compiled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Ordered MIDI pitch set to sound together
    pub pitches: Vec<u8>,
    /// Time from the schedule origin
    pub offset_secs: f64,
    pub duration_secs: f64,
}

/// A finite, time-ordered event list covering one loop pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    /// Events sorted by offset; chords precede melody notes at equal offsets
    pub events: Vec<TriggerEvent>,
    /// Length of the harmonic timeline in seconds at the compile-time tempo.
    /// Zero disables looping (single pass).
    pub loop_length_secs: f64,
}

impl Schedule {
    /// Compile chord blocks and melody marks into one schedule at `bpm`.
    ///
    /// Offsets are fixed here using the initial tempo; a later tempo ramp
    /// does not re-time the schedule. Melody marks past the harmonic
    /// timeline keep their literal offset, which may exceed
    /// `loop_length_secs`; the transport wraps them into the loop when
    /// arming.
    pub fn compile(blocks: &[HarmonicBlock], marks: &[MelodyMark], bpm: f64) -> Self {
        let secs_per_beat = 60.0 / bpm;

        let mut events: Vec<TriggerEvent> = blocks
            .iter()
            .map(|block| TriggerEvent {
                pitches: chord_pitches(block.root, block.quality),
                offset_secs: block.start_beat * secs_per_beat,
                duration_secs: block.duration_beats * secs_per_beat,
            })
            .collect();

        // Set semantics for the grid: duplicate marks are a no-op
        let mut seen: HashSet<(u8, u8)> = HashSet::with_capacity(marks.len());
        for mark in marks {
            if !seen.insert((mark.row, mark.column)) {
                continue;
            }
            let Some(&pitch) = MELODY_ROW_PITCHES.get(mark.row as usize) else {
                continue;
            };
            events.push(TriggerEvent {
                pitches: vec![pitch],
                offset_secs: mark.column as f64 * secs_per_beat,
                duration_secs: MELODY_NOTE_BEATS * secs_per_beat,
            });
        }

        // Stable sort keeps chords ahead of melody notes at equal offsets
        events.sort_by(|a, b| a.offset_secs.total_cmp(&b.offset_secs));

        let loop_length_secs = blocks
            .iter()
            .map(|block| block.duration_beats)
            .sum::<f64>()
            * secs_per_beat;

        Self {
            events,
            loop_length_secs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the transport should loop this schedule
    pub fn looping(&self) -> bool {
        self.loop_length_secs > 0.0
    }
}
