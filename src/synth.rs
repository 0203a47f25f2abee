//! Synthesizers that turn note events back into audio.
//!
//! All synths are monophonic and keep their oscillator phase across frames so
//! consecutive frames of the same note join without discontinuities. Output
//! samples stay within -1...1 before the volume is applied.

use std::fmt;
use std::str::FromStr;

use log::warn;

use crate::math::{advance_phase, lerp, sine_sample};
use crate::note::NoteEvent;

/// The available synthesizers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SynthKind {
    Square,
    Sine,
    SineAmped,
}

impl SynthKind {
    pub fn description(&self) -> &'static str {
        match self {
            SynthKind::Square => "simple square wave synth",
            SynthKind::Sine => "simple sine wave synth",
            SynthKind::SineAmped => "sine wave synth with variable amplitude",
        }
    }

    pub fn all() -> &'static [SynthKind] {
        &[SynthKind::Square, SynthKind::Sine, SynthKind::SineAmped]
    }
}

impl fmt::Display for SynthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthKind::Square => write!(f, "square"),
            SynthKind::Sine => write!(f, "sine"),
            SynthKind::SineAmped => write!(f, "sine_amped"),
        }
    }
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("unknown synth '{0}'")]
pub struct ParseSynthError(String);

impl FromStr for SynthKind {
    type Err = ParseSynthError;

    fn from_str(s: &str) -> Result<SynthKind, ParseSynthError> {
        match s {
            "square" => Ok(SynthKind::Square),
            "sine" => Ok(SynthKind::Sine),
            "sine_amped" => Ok(SynthKind::SineAmped),
            _ => Err(ParseSynthError(s.to_string())),
        }
    }
}

/// Generate audio for the note events of one frame.
pub trait Synth {
    /// Write `buffer.len()` mono samples for the frame's events, scaled by
    /// `volume` in 0...1.
    fn synthesize(&mut self, events: &[NoteEvent], buffer: &mut [f32], volume: f64);

    /// Forget the loudest amplitude seen, on synths that track it.
    fn reset_max_amp(&mut self) {}
}

/// Construct a synth by kind.
pub fn create(kind: SynthKind, sample_rate: f64) -> Box<dyn Synth> {
    match kind {
        SynthKind::Square => Box::new(Square::new(sample_rate)),
        SynthKind::Sine => Box::new(Sine::new(sample_rate)),
        SynthKind::SineAmped => Box::new(SineAmped::new(sample_rate)),
    }
}

// Monophonic synths play the loudest event when handed more than one.
fn relevant_event<'a>(events: &'a [NoteEvent]) -> &'a NoteEvent {
    let mut loudest = &events[0];
    if events.len() > 1 {
        warn!("polyphony not yet supported; playing loudest note instead");
        for event in &events[1..] {
            if event.note.amp > loudest.note.amp {
                loudest = event;
            }
        }
    }
    loudest
}

fn check_event_bounds(event: &NoteEvent, n_samples: usize) {
    assert!(
        event.offset + event.length <= n_samples,
        "note event extends past the synth buffer"
    );
}

/// Plain sine synth.
pub struct Sine {
    sample_rate: f64,
    last_phase: f64,
    prev_frame_freq: f64,
    prev_frame_silent: bool,
}

impl Sine {
    pub fn new(sample_rate: f64) -> Sine {
        Sine {
            sample_rate,
            last_phase: 0.0,
            prev_frame_freq: 0.0,
            prev_frame_silent: true,
        }
    }

    // On note-off, continue the previous wave to its next zero crossing so
    // the tone never ends mid-swing.
    fn finish_wave(&self, buffer: &mut [f32], volume: f64) {
        let positive_half = self.last_phase <= 0.5;
        for (i, out) in buffer.iter_mut().enumerate() {
            let next = sine_sample(self.prev_frame_freq, self.sample_rate, self.last_phase, i);
            if (positive_half && next < 0.0) || (!positive_half && next > 0.0) {
                break;
            }
            *out = (volume * next as f64) as f32;
        }
    }
}

impl Synth for Sine {
    fn synthesize(&mut self, events: &[NoteEvent], buffer: &mut [f32], volume: f64) {
        if events.is_empty() {
            buffer.fill(0.0);
            if !self.prev_frame_silent {
                self.finish_wave(buffer, volume);
            }
            self.prev_frame_silent = true;
            self.last_phase = 0.0;
            return;
        }

        let event = relevant_event(events);
        check_event_bounds(event, buffer.len());
        self.prev_frame_freq = event.note.freq;

        // A tone out of silence starts at phase zero.
        if self.prev_frame_silent {
            self.last_phase = 0.0;
        }
        self.prev_frame_silent = false;

        let freq = event.note.freq;
        buffer[..event.offset].fill(0.0);
        for i in event.offset..event.offset + event.length {
            buffer[i] = (volume * sine_sample(freq, self.sample_rate, self.last_phase, i) as f64) as f32;
        }
        buffer[event.offset + event.length..].fill(0.0);

        self.last_phase = advance_phase(self.last_phase, freq, self.sample_rate, buffer.len());
    }
}

/// Naive square wave synth.
pub struct Square {
    sample_rate: f64,
    last_phase: f64,
}

impl Square {
    pub fn new(sample_rate: f64) -> Square {
        Square {
            sample_rate,
            last_phase: 0.0,
        }
    }
}

impl Synth for Square {
    fn synthesize(&mut self, events: &[NoteEvent], buffer: &mut [f32], volume: f64) {
        if events.is_empty() {
            buffer.fill(0.0);
            return;
        }

        let event = relevant_event(events);
        check_event_bounds(event, buffer.len());

        let freq = event.note.freq;
        buffer[..event.offset].fill(0.0);
        for i in event.offset..event.offset + event.length {
            let level = if sine_sample(freq, self.sample_rate, self.last_phase, i) >= 0.0 {
                1.0
            } else {
                -1.0
            };
            buffer[i] = (volume * level) as f32;
        }
        buffer[event.offset + event.length..].fill(0.0);

        self.last_phase = advance_phase(self.last_phase, freq, self.sample_rate, buffer.len());
    }
}

/// Sine synth that follows the detected amplitude.
///
/// The target level is the event amplitude relative to the loudest amplitude
/// seen so far; it is approached linearly over the event so frame-to-frame
/// level steps do not click.
pub struct SineAmped {
    sample_rate: f64,
    last_phase: f64,
    prev_frame_freq: f64,
    prev_frame_amp: f64,
    prev_frame_silent: bool,
    max_amp: f64,
}

impl SineAmped {
    pub fn new(sample_rate: f64) -> SineAmped {
        SineAmped {
            sample_rate,
            last_phase: 0.0,
            prev_frame_freq: 0.0,
            prev_frame_amp: 0.0,
            prev_frame_silent: true,
            max_amp: 0.0,
        }
    }

    fn finish_wave(&self, buffer: &mut [f32], volume: f64) {
        let positive_half = self.last_phase <= 0.5;
        let mut finished = false;
        for (i, out) in buffer.iter_mut().enumerate() {
            let next = sine_sample(self.prev_frame_freq, self.sample_rate, self.last_phase, i);
            if (positive_half && next < 0.0) || (!positive_half && next > 0.0) {
                finished = true;
                break;
            }
            *out = (volume * next as f64 * self.prev_frame_amp) as f32;
        }
        if !finished {
            warn!("failed to force the end of the previous wave to zero within a frame");
        }
    }
}

impl Synth for SineAmped {
    fn synthesize(&mut self, events: &[NoteEvent], buffer: &mut [f32], volume: f64) {
        if events.is_empty() {
            buffer.fill(0.0);
            if !self.prev_frame_silent {
                self.finish_wave(buffer, volume);
            }
            self.prev_frame_silent = true;
            self.prev_frame_amp = 0.0;
            self.last_phase = 0.0;
            return;
        }

        let event = relevant_event(events);
        check_event_bounds(event, buffer.len());
        let note = &event.note;

        if note.amp > self.max_amp {
            self.max_amp = note.amp;
        }

        if self.prev_frame_silent {
            self.last_phase = 0.0;
        }
        self.prev_frame_silent = false;

        // Target level relative to the loudest note seen.
        let amp_mod = note.amp / self.max_amp;

        buffer[..event.offset].fill(0.0);
        for i in event.offset..event.offset + event.length {
            let t = (i - event.offset) as f64 / event.length as f64;
            let amp = lerp(self.prev_frame_amp, amp_mod, t);
            buffer[i] =
                (volume * amp * sine_sample(note.freq, self.sample_rate, self.last_phase, i) as f64)
                    as f32;
        }
        buffer[event.offset + event.length..].fill(0.0);

        self.last_phase = advance_phase(self.last_phase, note.freq, self.sample_rate, buffer.len());
        self.prev_frame_freq = note.freq;
        self.prev_frame_amp = amp_mod;
    }

    fn reset_max_amp(&mut self) {
        self.max_amp = 0.0;
    }
}
