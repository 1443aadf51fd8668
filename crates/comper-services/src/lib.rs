//! comper-services: Audio output and the playback engine

pub mod audio_io;
pub mod engine;
pub mod synth;

pub use audio_io::{AudioOutputError, OutputStream};
pub use engine::{EngineError, EngineState, PlaybackEngine};
pub use synth::SynthSink;
