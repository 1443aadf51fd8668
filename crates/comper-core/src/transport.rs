//! Transport clock: arms a compiled schedule and fires trigger events

use crate::error::{ComperError, Result};
use crate::schedule::Schedule;
use crate::tempo::TempoRamp;

/// Voice capability the clock dispatches into.
///
/// Realized by the host application (oscillators, samples, MIDI out); the
/// clock only decides what pitch content sounds when.
pub trait VoiceSink {
    /// Sound a pitch set for `duration_secs`. `at_secs` is the dispatch
    /// time on the clock's own timeline; it may trail the current tick by
    /// up to one tick interval of jitter.
    fn trigger(&mut self, pitches: &[u8], duration_secs: f64, at_secs: f64);

    /// Release every currently sounding voice at once.
    fn release_all(&mut self);
}

/// Transport lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    #[default]
    Stopped,
    Running,
    /// Terminal; a disposed clock cannot be restarted
    Disposed,
}

/// An event armed for dispatch, loop-relative
#[derive(Debug, Clone)]
struct ArmedEvent {
    pitches: Vec<u8>,
    offset_secs: f64,
    duration_secs: f64,
}

/// Tick-driven playback clock.
///
/// All state is mutated through `&mut self` from a single execution
/// context: the tick driver and the control calls must never run
/// concurrently. None of the operations block; sound production is owned
/// by the [`VoiceSink`].
#[derive(Debug)]
pub struct TransportClock {
    state: ClockState,
    ramp: TempoRamp,
    armed: Vec<ArmedEvent>,
    loop_length_secs: f64,
    /// Tick time at which the current `play` started
    origin_secs: f64,
    /// Loop-relative playhead, updated each tick
    position_secs: f64,
    current_bpm: f64,
    /// Next undispatched event within the current pass
    next: usize,
    /// Completed loop passes since `play`
    pass: u64,
}

impl TransportClock {
    pub fn new(ramp: TempoRamp) -> Self {
        Self {
            state: ClockState::Stopped,
            current_bpm: ramp.bpm_at(0.0),
            ramp,
            armed: Vec::new(),
            loop_length_secs: 0.0,
            origin_secs: 0.0,
            position_secs: 0.0,
            next: 0,
            pass: 0,
        }
    }

    /// Arm `schedule` and start running at `now_secs`.
    ///
    /// A clock that is already running is implicitly stopped first, so a
    /// second `play` replaces the active schedule instead of layering a
    /// duplicate on top of it. Fails once the clock has been disposed.
    pub fn play(
        &mut self,
        schedule: Schedule,
        now_secs: f64,
        sink: &mut dyn VoiceSink,
    ) -> Result<()> {
        match self.state {
            ClockState::Disposed => return Err(ComperError::ClockDisposed),
            ClockState::Running => self.cancel(sink),
            ClockState::Stopped => {}
        }

        let loop_length_secs = schedule.loop_length_secs;
        self.loop_length_secs = loop_length_secs;
        self.armed = schedule
            .events
            .into_iter()
            .map(|event| {
                // Melody marks past the harmonic timeline carry literal
                // offsets; wrap them into the loop here so every dispatch
                // lands inside one pass.
                let offset_secs = if loop_length_secs > 0.0 {
                    event.offset_secs % loop_length_secs
                } else {
                    event.offset_secs
                };
                ArmedEvent {
                    pitches: event.pitches,
                    offset_secs,
                    duration_secs: event.duration_secs,
                }
            })
            .collect();
        // Restore monotonic dispatch order after wrapping; the sort is
        // stable, so chords stay ahead of melody notes at equal offsets
        self.armed
            .sort_by(|a, b| a.offset_secs.total_cmp(&b.offset_secs));

        self.origin_secs = now_secs;
        self.position_secs = 0.0;
        self.current_bpm = self.ramp.bpm_at(0.0);
        self.next = 0;
        self.pass = 0;
        self.state = ClockState::Running;
        Ok(())
    }

    /// Advance the clock to `now_secs`, firing every due event in schedule
    /// order. Coalesces into one batch when the tick interval is coarser
    /// than the event spacing; each event fires at most once per pass.
    pub fn tick(&mut self, now_secs: f64, sink: &mut dyn VoiceSink) {
        if self.state != ClockState::Running {
            return;
        }

        let elapsed = (now_secs - self.origin_secs).max(0.0);
        self.current_bpm = self.ramp.bpm_at(elapsed);
        self.position_secs = if self.loop_length_secs > 0.0 {
            elapsed % self.loop_length_secs
        } else {
            elapsed
        };

        while self.next < self.armed.len() {
            let due = self.origin_secs
                + self.pass as f64 * self.loop_length_secs
                + self.armed[self.next].offset_secs;
            if due > now_secs {
                break;
            }
            let event = &self.armed[self.next];
            sink.trigger(&event.pitches, event.duration_secs, due);
            self.next += 1;
            if self.next == self.armed.len() && self.loop_length_secs > 0.0 {
                // Cross the loop boundary: pass k+1 never starts before
                // every pass k event has fired
                self.next = 0;
                self.pass += 1;
            }
        }
    }

    /// Stop playback, discarding all pending dispatches and releasing
    /// every sounding voice. Idempotent; the sole cancellation primitive.
    pub fn stop(&mut self, sink: &mut dyn VoiceSink) {
        if self.state != ClockState::Running {
            return;
        }
        self.cancel(sink);
    }

    /// Release voices and retire the clock permanently.
    pub fn dispose(&mut self, sink: &mut dyn VoiceSink) {
        if self.state == ClockState::Running {
            sink.release_all();
        }
        self.armed.clear();
        self.state = ClockState::Disposed;
    }

    fn cancel(&mut self, sink: &mut dyn VoiceSink) {
        sink.release_all();
        self.armed.clear();
        self.next = 0;
        self.pass = 0;
        self.position_secs = 0.0;
        self.state = ClockState::Stopped;
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// Instantaneous tempo from the ramp, as of the last tick
    pub fn current_bpm(&self) -> f64 {
        self.current_bpm
    }

    /// Loop-relative playhead in seconds, driven by the same clock that
    /// fires the audio events.
    ///
    /// The playhead advances in real seconds; it does not stretch with the
    /// tempo ramp.
    pub fn playhead_secs(&self) -> f64 {
        self.position_secs
    }

    pub fn ramp(&self) -> &TempoRamp {
        &self.ramp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::{ChordQuality, PitchClass};
    use crate::timeline::{HarmonicBlock, MelodyMark};

    #[derive(Default)]
    struct RecordingSink {
        triggers: Vec<(Vec<u8>, f64, f64)>,
        releases: usize,
    }

    impl VoiceSink for RecordingSink {
        fn trigger(&mut self, pitches: &[u8], duration_secs: f64, at_secs: f64) {
            self.triggers.push((pitches.to_vec(), duration_secs, at_secs));
        }

        fn release_all(&mut self) {
            self.releases += 1;
        }
    }

    fn schedule_with_loop() -> Schedule {
        // Four 4-beat chords at 120 BPM: loop of 8 s, chords at 0/2/4/6
        let blocks = vec![
            HarmonicBlock::new(PitchClass::C, ChordQuality::Major7, 0.0, 4.0),
            HarmonicBlock::new(PitchClass::A, ChordQuality::Minor7, 4.0, 4.0),
            HarmonicBlock::new(PitchClass::D, ChordQuality::Minor7, 8.0, 4.0),
            HarmonicBlock::new(PitchClass::G, ChordQuality::Dominant7, 12.0, 4.0),
        ];
        Schedule::compile(&blocks, &[], 120.0)
    }

    #[test]
    fn test_events_fire_once_in_order() {
        let mut clock = TransportClock::new(TempoRamp::constant(120.0));
        let mut sink = RecordingSink::default();
        clock.play(schedule_with_loop(), 10.0, &mut sink).unwrap();

        clock.tick(10.0, &mut sink);
        assert_eq!(sink.triggers.len(), 1);
        assert_eq!(sink.triggers[0].2, 10.0);

        // Coarse tick coalesces the next two events into one ordered batch
        clock.tick(14.5, &mut sink);
        assert_eq!(sink.triggers.len(), 3);
        assert_eq!(sink.triggers[1].2, 12.0);
        assert_eq!(sink.triggers[2].2, 14.0);
    }

    #[test]
    fn test_looping_refires_each_pass() {
        let blocks = vec![HarmonicBlock::new(PitchClass::C, ChordQuality::Major7, 0.0, 16.0)];
        let marks = vec![MelodyMark::new(0, 12)]; // offset 6 s at 120 BPM
        let schedule = Schedule::compile(&blocks, &marks, 120.0);
        assert_eq!(schedule.loop_length_secs, 8.0);

        let mut clock = TransportClock::new(TempoRamp::constant(120.0));
        let mut sink = RecordingSink::default();
        clock.play(schedule, 0.0, &mut sink).unwrap();

        for t in [6.0, 14.0, 22.0] {
            clock.tick(t, &mut sink);
            let melody_fires: Vec<f64> = sink
                .triggers
                .iter()
                .filter(|(p, _, _)| p.len() == 1)
                .map(|&(_, _, at)| at)
                .collect();
            assert_eq!(*melody_fires.last().unwrap(), t);
        }
    }

    #[test]
    fn test_stop_discards_pending_dispatches() {
        let mut clock = TransportClock::new(TempoRamp::constant(120.0));
        let mut sink = RecordingSink::default();
        clock.play(schedule_with_loop(), 0.0, &mut sink).unwrap();

        clock.tick(0.0, &mut sink);
        assert_eq!(sink.triggers.len(), 1);

        clock.stop(&mut sink);
        assert_eq!(sink.releases, 1);
        assert!(!clock.is_running());
        assert_eq!(clock.playhead_secs(), 0.0);

        // Armed dispatch times have long passed, yet nothing fires
        clock.tick(100.0, &mut sink);
        assert_eq!(sink.triggers.len(), 1);

        // Idempotent
        clock.stop(&mut sink);
        assert_eq!(sink.releases, 1);
    }

    #[test]
    fn test_replay_replaces_active_schedule() {
        let mut clock = TransportClock::new(TempoRamp::constant(120.0));
        let mut sink = RecordingSink::default();
        clock.play(schedule_with_loop(), 0.0, &mut sink).unwrap();
        clock.tick(2.5, &mut sink);
        assert_eq!(sink.triggers.len(), 2);

        // Second play without an intervening stop: exactly one active
        // schedule afterwards, starting over from its own origin
        clock.play(schedule_with_loop(), 100.0, &mut sink).unwrap();
        assert_eq!(sink.releases, 1);

        clock.tick(102.5, &mut sink);
        assert_eq!(sink.triggers.len(), 4);
        assert_eq!(sink.triggers[2].2, 100.0);
        assert_eq!(sink.triggers[3].2, 102.0);
    }

    #[test]
    fn test_play_after_dispose_is_an_error() {
        let mut clock = TransportClock::new(TempoRamp::constant(120.0));
        let mut sink = RecordingSink::default();
        clock.dispose(&mut sink);

        let result = clock.play(schedule_with_loop(), 0.0, &mut sink);
        assert!(matches!(result, Err(ComperError::ClockDisposed)));
        assert_eq!(clock.state(), ClockState::Disposed);
    }

    #[test]
    fn test_dispose_while_running_releases_voices() {
        let mut clock = TransportClock::new(TempoRamp::constant(120.0));
        let mut sink = RecordingSink::default();
        clock.play(schedule_with_loop(), 0.0, &mut sink).unwrap();
        clock.dispose(&mut sink);
        assert_eq!(sink.releases, 1);
        assert_eq!(clock.state(), ClockState::Disposed);
    }

    #[test]
    fn test_empty_timeline_plays_single_pass() {
        let marks = vec![MelodyMark::new(0, 2), MelodyMark::new(4, 5)];
        let schedule = Schedule::compile(&[], &marks, 120.0);
        assert!(!schedule.looping());

        let mut clock = TransportClock::new(TempoRamp::constant(120.0));
        let mut sink = RecordingSink::default();
        clock.play(schedule, 0.0, &mut sink).unwrap();

        clock.tick(60.0, &mut sink);
        assert_eq!(sink.triggers.len(), 2);

        // No loop: nothing more fires, but the clock keeps running
        clock.tick(120.0, &mut sink);
        assert_eq!(sink.triggers.len(), 2);
        assert!(clock.is_running());
    }

    #[test]
    fn test_out_of_range_melody_wraps_into_loop() {
        // One 4-beat chord at 120 BPM: loop of 2 s. Mark at column 5
        // compiles to offset 2.5 s and wraps to 0.5 s when armed.
        let blocks = vec![HarmonicBlock::new(PitchClass::C, ChordQuality::Major7, 0.0, 4.0)];
        let marks = vec![MelodyMark::new(0, 5)];
        let schedule = Schedule::compile(&blocks, &marks, 120.0);

        let mut clock = TransportClock::new(TempoRamp::constant(120.0));
        let mut sink = RecordingSink::default();
        clock.play(schedule, 0.0, &mut sink).unwrap();

        clock.tick(1.0, &mut sink);
        let melody: Vec<f64> = sink
            .triggers
            .iter()
            .filter(|(p, _, _)| p.len() == 1)
            .map(|&(_, _, at)| at)
            .collect();
        assert_eq!(melody, vec![0.5]);
    }

    #[test]
    fn test_current_bpm_follows_ramp_from_playback_start() {
        let mut clock = TransportClock::new(TempoRamp::new(65.0, 140.0, 100.0));
        let mut sink = RecordingSink::default();
        assert_eq!(clock.current_bpm(), 65.0);

        // Origin at 50 s of tick time: ramp still starts from zero elapsed
        clock.play(Schedule::compile(&[], &[], 120.0), 50.0, &mut sink).unwrap();
        clock.tick(50.0, &mut sink);
        assert_eq!(clock.current_bpm(), 65.0);
        clock.tick(100.0, &mut sink);
        assert_eq!(clock.current_bpm(), 102.5);
        clock.tick(200.0, &mut sink);
        assert_eq!(clock.current_bpm(), 140.0);
    }

    #[test]
    fn test_playhead_wraps_at_loop_boundary() {
        let mut clock = TransportClock::new(TempoRamp::constant(120.0));
        let mut sink = RecordingSink::default();
        clock.play(schedule_with_loop(), 0.0, &mut sink).unwrap();

        clock.tick(3.0, &mut sink);
        assert_eq!(clock.playhead_secs(), 3.0);
        clock.tick(11.0, &mut sink);
        assert_eq!(clock.playhead_secs(), 3.0);
    }
}
