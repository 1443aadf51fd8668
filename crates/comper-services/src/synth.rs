//! Polyphonic comping synth realizing the voice sink

use comper_core::VoiceSink;
use fundsp::hacker::*;

/// Hard cap on simultaneous notes; the oldest voice is stolen past this
const MAX_VOICES: usize = 64;

/// ADSR settings in seconds (sustain is a level, not a time)
#[derive(Debug, Clone, Copy)]
struct Envelope {
    attack: f64,
    decay: f64,
    sustain: f64,
    release: f64,
}

/// Chord voice patch: bright triangle with a quick bite
const CHORD_ENV: Envelope = Envelope {
    attack: 0.005,
    decay: 0.1,
    sustain: 0.3,
    release: 0.5,
};

/// Bass voice patch: round sine, slower to speak and to let go
const BASS_ENV: Envelope = Envelope {
    attack: 0.01,
    decay: 0.15,
    sustain: 0.2,
    release: 0.6,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waveform {
    Triangle,
    Sine,
}

/// One sounding note
#[derive(Debug, Clone)]
struct Voice {
    waveform: Waveform,
    env: Envelope,
    freq_hz: f64,
    phase: f64,
    age_secs: f64,
    /// The gate drops at this age; the release tail runs after it
    gate_secs: f64,
}

impl Voice {
    fn new(pitch: u8, waveform: Waveform, env: Envelope, gate_secs: f64) -> Self {
        Self {
            waveform,
            env,
            freq_hz: midi_to_hz(pitch),
            phase: 0.0,
            age_secs: 0.0,
            gate_secs,
        }
    }

    /// Envelope level while the gate is held
    fn held_level(&self, t: f64) -> f64 {
        if t < self.env.attack {
            t / self.env.attack
        } else if t < self.env.attack + self.env.decay {
            1.0 - (1.0 - self.env.sustain) * ((t - self.env.attack) / self.env.decay)
        } else {
            self.env.sustain
        }
    }

    fn amplitude(&self) -> f64 {
        if self.age_secs < self.gate_secs {
            self.held_level(self.age_secs)
        } else {
            let at_gate = self.held_level(self.gate_secs);
            at_gate * (-(self.age_secs - self.gate_secs) / self.env.release).exp()
        }
    }

    fn done(&self) -> bool {
        self.age_secs >= self.gate_secs && self.amplitude() < 1e-4
    }

    fn tick(&mut self, dt: f64) -> f32 {
        self.age_secs += dt;
        self.phase = (self.phase + self.freq_hz * dt).fract();

        let osc = match self.waveform {
            Waveform::Sine => (self.phase * std::f64::consts::TAU).sin(),
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
        };

        (osc * self.amplitude()) as f32
    }
}

fn midi_to_hz(pitch: u8) -> f64 {
    440.0 * 2.0f64.powf((pitch as f64 - 69.0) / 12.0)
}

/// Voice sink backed by simple subtractive voices: one triangle per chord
/// pitch, plus a sine doubling the lowest pitch an octave down.
pub struct SynthSink {
    sample_rate: f64,
    voices: Vec<Voice>,
    /// Gentle master low-pass keeps the stacked triangles from sounding brittle
    tone: An<FixedSvf<f64, LowpassMode<f64>>>,
    gain: f32,
}

impl SynthSink {
    pub fn new(sample_rate: u32) -> Self {
        let mut tone = lowpass_hz(4800.0, 0.707);
        tone.set_sample_rate(sample_rate as f64);
        Self {
            sample_rate: sample_rate as f64,
            voices: Vec::new(),
            tone,
            gain: 0.15,
        }
    }

    /// Reconfigure for the device rate; drops nothing that is sounding
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f64;
        self.tone.set_sample_rate(sample_rate as f64);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    fn spawn(&mut self, pitch: u8, waveform: Waveform, env: Envelope, gate_secs: f64) {
        if self.voices.len() >= MAX_VOICES {
            // Steal the oldest voice
            self.voices.remove(0);
        }
        self.voices.push(Voice::new(pitch, waveform, env, gate_secs));
    }

    /// Render a mono buffer of finished voices mixed through the tone filter
    pub fn render(&mut self, out: &mut [f32]) {
        let dt = 1.0 / self.sample_rate;
        for sample in out.iter_mut() {
            let mut mix = 0.0f32;
            for voice in self.voices.iter_mut() {
                mix += voice.tick(dt);
            }
            let input = Frame::from([mix * self.gain]);
            let output = self.tone.tick(&input);
            *sample = output[0];
        }
        self.voices.retain(|v| !v.done());
    }
}

impl VoiceSink for SynthSink {
    fn trigger(&mut self, pitches: &[u8], duration_secs: f64, _at_secs: f64) {
        if pitches.is_empty() {
            return;
        }
        for &pitch in pitches {
            self.spawn(pitch, Waveform::Triangle, CHORD_ENV, duration_secs);
        }
        if pitches.len() > 1 {
            // Bass doubling: lowest chord pitch, one octave down
            let lowest = pitches.iter().copied().min().unwrap_or(pitches[0]);
            self.spawn(lowest.saturating_sub(12), Waveform::Sine, BASS_ENV, duration_secs);
        }
    }

    fn release_all(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.gate_secs = voice.gate_secs.min(voice.age_secs);
        }
    }
}
