//! Playback engine tying the transport clock to the audio device

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use comper_core::{
    ClockState, ComperError, HarmonicBlock, MelodyMark, Schedule, TempoRamp, TempoSmoother,
    TransportClock,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::audio_io::{AudioOutputError, OutputStream};
use crate::synth::SynthSink;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The underlying sound resource failed to initialize; the clock stays
    /// Stopped and a retry is safe
    #[error("voice sink unavailable: {0}")]
    VoiceSink(#[from] AudioOutputError),
    #[error(transparent)]
    Transport(#[from] ComperError),
}

/// State shared between the control API and the audio callback.
///
/// Control calls and the callback serialize through these mutexes; the
/// callback is the only writer of the frame counter, which is the clock's
/// time base.
pub struct EngineState {
    clock: Mutex<TransportClock>,
    synth: Mutex<SynthSink>,
    smoother: Mutex<TempoSmoother>,
    /// Frames rendered since the stream started
    frames: AtomicU64,
    sample_rate: AtomicU64,
}

impl EngineState {
    fn new(ramp: TempoRamp) -> Self {
        Self {
            clock: Mutex::new(TransportClock::new(ramp)),
            synth: Mutex::new(SynthSink::new(44_100)),
            smoother: Mutex::new(TempoSmoother::new(ramp.bpm_at(0.0))),
            frames: AtomicU64::new(0),
            sample_rate: AtomicU64::new(44_100),
        }
    }
}

/// Explicitly owned playback engine.
///
/// One instance per application, injected where playback is needed and
/// disposed when done; there is no process-wide singleton. The output
/// stream opens lazily on the first `play`, so construction never touches
/// the audio device.
pub struct PlaybackEngine {
    state: Arc<EngineState>,
    stream: Option<OutputStream>,
    ramp: TempoRamp,
}

impl PlaybackEngine {
    pub fn new(ramp: TempoRamp) -> Self {
        Self {
            state: Arc::new(EngineState::new(ramp)),
            stream: None,
            ramp,
        }
    }

    /// Shared state for callers that poll from their own refresh loop
    pub fn state(&self) -> Arc<EngineState> {
        self.state.clone()
    }

    /// Compile the editor snapshot and start (or restart) playback.
    ///
    /// The snapshot is frozen here; later edits are not observed until the
    /// next `play`. A failed device open leaves the system silent with the
    /// clock Stopped.
    pub fn play(
        &mut self,
        blocks: &[HarmonicBlock],
        marks: &[MelodyMark],
        bpm: f64,
    ) -> Result<(), EngineError> {
        if self.clock_state() == ClockState::Disposed {
            return Err(ComperError::ClockDisposed.into());
        }

        let schedule = Schedule::compile(blocks, marks, bpm);
        let events = schedule.len();
        let loop_secs = schedule.loop_length_secs;

        self.ensure_stream()?;
        let now_secs = self.now_secs();

        if let (Ok(mut clock), Ok(mut synth)) =
            (self.state.clock.lock(), self.state.synth.lock())
        {
            clock.play(schedule, now_secs, &mut *synth)?;
            if let Ok(mut smoother) = self.state.smoother.lock() {
                *smoother = TempoSmoother::new(clock.current_bpm());
            }
        }

        info!(bpm, events, loop_secs, "Playback started");
        Ok(())
    }

    /// Stop playback and release all sounding voices
    pub fn stop(&mut self) {
        if let (Ok(mut clock), Ok(mut synth)) =
            (self.state.clock.lock(), self.state.synth.lock())
        {
            clock.stop(&mut *synth);
        }
        info!("Playback stopped");
    }

    /// Tear down the engine; a disposed engine cannot play again
    pub fn dispose(&mut self) {
        if let (Ok(mut clock), Ok(mut synth)) =
            (self.state.clock.lock(), self.state.synth.lock())
        {
            clock.dispose(&mut *synth);
        }
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        info!("Engine disposed");
    }

    pub fn is_playing(&self) -> bool {
        self.state
            .clock
            .lock()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }

    /// Loop-relative playhead, driven by the same clock that fires events
    pub fn playhead_secs(&self) -> f64 {
        self.state
            .clock
            .lock()
            .map(|c| c.playhead_secs())
            .unwrap_or(0.0)
    }

    /// Instantaneous ramp tempo as of the last audio callback
    pub fn current_bpm(&self) -> f64 {
        self.state
            .clock
            .lock()
            .map(|c| c.current_bpm())
            .unwrap_or(self.ramp.start_bpm)
    }

    /// Smoothed tempo readout, one decimal
    pub fn display_bpm(&self) -> String {
        self.state
            .smoother
            .lock()
            .map(|s| s.display())
            .unwrap_or_else(|_| format!("{:.1}", self.ramp.start_bpm))
    }

    /// Backend error raised since the last poll, if any
    pub fn take_stream_error(&self) -> Option<String> {
        self.stream.as_ref().and_then(|s| s.take_error())
    }

    fn clock_state(&self) -> ClockState {
        self.state
            .clock
            .lock()
            .map(|c| c.state())
            .unwrap_or(ClockState::Stopped)
    }

    fn now_secs(&self) -> f64 {
        let frames = self.state.frames.load(Ordering::SeqCst);
        let rate = self.state.sample_rate.load(Ordering::SeqCst).max(1);
        frames as f64 / rate as f64
    }

    fn ensure_stream(&mut self) -> Result<(), EngineError> {
        if let Some(stream) = &self.stream {
            if let Some(err) = stream.take_error() {
                warn!(error = %err, "Restarting output stream after backend error");
                self.stream = None;
            }
        }
        if self.stream.is_some() {
            return Ok(());
        }

        let state = self.state.clone();
        let stream = OutputStream::start(move |buffer, sample_rate, channels| {
            Self::render(&state, buffer, sample_rate, channels);
        })?;

        self.state
            .sample_rate
            .store(stream.sample_rate() as u64, Ordering::SeqCst);
        if let Ok(mut synth) = self.state.synth.lock() {
            synth.set_sample_rate(stream.sample_rate());
        }
        self.stream = Some(stream);
        Ok(())
    }

    /// Audio-thread entry: advance the clock, smooth the tempo, render voices
    fn render(state: &EngineState, buffer: &mut [f32], sample_rate: u32, channels: u16) {
        let channels = channels as usize;
        let num_frames = buffer.len() / channels;
        let dt = num_frames as f64 / sample_rate as f64;

        let start_frames = state.frames.fetch_add(num_frames as u64, Ordering::SeqCst);
        let now_secs = (start_frames + num_frames as u64) as f64 / sample_rate as f64;

        let (Ok(mut clock), Ok(mut synth)) = (state.clock.lock(), state.synth.lock()) else {
            buffer.fill(0.0);
            return;
        };

        clock.tick(now_secs, &mut *synth);

        if clock.is_running() {
            if let Ok(mut smoother) = state.smoother.lock() {
                smoother.update(clock.current_bpm(), dt);
            }
        }

        let mut mono = vec![0.0f32; num_frames];
        synth.render(&mut mono);

        for (frame, sample) in buffer.chunks_mut(channels).zip(&mono) {
            frame.fill(*sample);
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if self.clock_state() != ClockState::Disposed {
            self.dispose();
        }
    }
}
