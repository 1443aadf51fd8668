//! comper-core: Domain types for the comper playback scheduler

mod error;
pub mod pitch;
mod schedule;
mod tempo;
mod timeline;
mod transport;

pub use error::{ComperError, Result};
pub use pitch::{chord_pitches, ChordQuality, PitchClass, MELODY_ROW_PITCHES};
pub use schedule::{Schedule, TriggerEvent, MELODY_NOTE_BEATS};
pub use tempo::{TempoRamp, TempoSmoother, SMOOTHING_TAU_SECS};
pub use timeline::{HarmonicBlock, MelodyMark};
pub use transport::{ClockState, TransportClock, VoiceSink};
