//! Harmonic timeline blocks and melody grid marks

use serde::{Deserialize, Serialize};

use crate::pitch::{ChordQuality, PitchClass};

/// One chord block on the harmonic timeline.
///
/// Blocks are kept ordered by `start_beat` by the editing subsystem; the
/// scheduler only ever reads a snapshot and does not defend against
/// overlapping blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonicBlock {
    pub root: PitchClass,
    pub quality: ChordQuality,
    /// Position in beats from the timeline origin
    pub start_beat: f64,
    /// Length in beats
    pub duration_beats: f64,
}

impl HarmonicBlock {
    pub fn new(root: PitchClass, quality: ChordQuality, start_beat: f64, duration_beats: f64) -> Self {
        Self {
            root,
            quality,
            start_beat,
            duration_beats,
        }
    }

    /// End position in beats
    pub fn end_beat(&self) -> f64 {
        self.start_beat + self.duration_beats
    }
}

/// One toggled cell on the 12x16 melody grid.
///
/// Marks form a sparse set; a duplicate (row, column) pair is a logical
/// no-op and the compiler drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MelodyMark {
    /// Semitone row, 0-11, row 0 at the top of the grid
    pub row: u8,
    /// Beat column, 0-15
    pub column: u8,
}

impl MelodyMark {
    pub fn new(row: u8, column: u8) -> Self {
        Self { row, column }
    }
}
