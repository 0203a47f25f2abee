//! Sample sources: unified providers of fixed-size sample frames.
//!
//! Every source fills the caller's frame buffer and reports how many of the
//! samples are new; the rest is carried over from the previous frame
//! according to the overlap policy. Overlap only works when the frame size is
//! the same on every call.

use log::{info, warn};

use crate::config;
use crate::math::{advance_phase, sine_sample};
use crate::note::Note;

/// Lower bound of the wave generator frequency in Hz.
const MIN_FREQ: f64 = 1.0;

/// How the start of each frame is reused from the previous frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OverlapPolicy {
    /// Every sample of every frame is new.
    None,
    /// A fixed fraction of the frame is carried over.
    Fixed { ratio: f64 },
    /// Carry over as much as possible without blocking: the new sample count
    /// is however many samples are available, clamped into
    /// `[frame * min_new_ratio, frame * max_new_ratio]`. Only sources that
    /// can report available input support this.
    NonBlocking { min_new_ratio: f64, max_new_ratio: f64 },
}

impl OverlapPolicy {
    /// The policy selected in the build configuration.
    pub fn from_config() -> OverlapPolicy {
        if config::DO_OVERLAP {
            OverlapPolicy::Fixed {
                ratio: config::OVERLAP_RATIO,
            }
        } else if config::DO_OVERLAP_NONBLOCK {
            OverlapPolicy::NonBlocking {
                min_new_ratio: config::MIN_NEW_RATIO,
                max_new_ratio: config::MAX_NEW_RATIO,
            }
        } else {
            OverlapPolicy::None
        }
    }
}

/// Overlap state shared by all sources.
///
/// `begin_frame` pastes the carried-over samples to the start of the frame
/// and returns where the new samples begin; `end_frame` stores the tail of
/// the finished frame for the next call. The stored copy is taken before the
/// estimator windows the buffer, so the carried samples are pristine.
pub(crate) struct Overlap {
    policy: OverlapPolicy,
    buffer: Vec<f32>,
}

fn fixed_overlap_samples(frame_size: usize, ratio: f64) -> usize {
    // Clamp so at least one sample is overlapped or kept between frames.
    ((frame_size as f64 * ratio) as usize).clamp(1, frame_size - 1)
}

impl Overlap {
    pub fn new(policy: OverlapPolicy, frame_size: usize) -> Overlap {
        let size = match policy {
            OverlapPolicy::None => 0,
            OverlapPolicy::Fixed { ratio } => fixed_overlap_samples(frame_size, ratio),
            OverlapPolicy::NonBlocking { min_new_ratio, .. } => {
                let min_new = ((frame_size as f64 * min_new_ratio) as usize).max(1);
                frame_size - min_new
            }
        };
        Overlap {
            policy,
            buffer: vec![0.0; size],
        }
    }

    /// Paste the overlap into `frame` and return the index where new samples
    /// start. `available` is the count of samples ready without blocking, for
    /// the non-blocking policy.
    pub fn begin_frame(&self, frame: &mut [f32], available: Option<usize>) -> usize {
        let n = frame.len();
        match self.policy {
            OverlapPolicy::None => 0,
            OverlapPolicy::Fixed { .. } => {
                let n_overlap = self.buffer.len();
                assert!(
                    n_overlap < n,
                    "frame shrank below the overlap buffer; the frame size may never change"
                );
                frame[..n_overlap].copy_from_slice(&self.buffer);
                n_overlap
            }
            OverlapPolicy::NonBlocking {
                min_new_ratio,
                max_new_ratio,
            } => {
                let min_new = ((n as f64 * min_new_ratio) as usize).max(1);
                let max_new = ((n as f64 * max_new_ratio) as usize).min(n);
                let new = available
                    .unwrap_or(n)
                    .clamp(min_new, max_new)
                    .clamp(1, n);
                let n_overlap = n - new;
                let tail = self.buffer.len() - n_overlap;
                frame[..n_overlap].copy_from_slice(&self.buffer[tail..]);
                n_overlap
            }
        }
    }

    /// Store the tail of the finished frame for the next call.
    pub fn end_frame(&mut self, frame: &[f32]) {
        if self.buffer.is_empty() {
            return;
        }
        let tail = frame.len() - self.buffer.len();
        self.buffer.copy_from_slice(&frame[tail..]);
    }

    /// Overwrite the carried samples, for sources that can seek.
    pub fn set_buffer(&mut self, samples: &[f32]) {
        assert_eq!(samples.len(), self.buffer.len());
        self.buffer.copy_from_slice(samples);
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
    }
}

/// A provider of fixed-size sample frames.
pub trait SampleSource {
    /// Short human-readable name of the source.
    fn name(&self) -> &'static str;

    /// Whether getting samples may block the calling thread, which implies
    /// the source should be the rate limiter of the program loop.
    fn is_blocking(&self) -> bool {
        false
    }

    /// Samples ready without blocking, for sources that can tell.
    fn available_samples(&self) -> Option<usize> {
        None
    }

    /// Total new samples delivered so far.
    fn played_samples(&self) -> u64;

    /// Playback position in seconds.
    fn played_time(&self) -> f64;

    /// Shift the generated pitch up, on sources that generate one.
    fn pitch_up(&mut self) {}

    /// Shift the generated pitch down, on sources that generate one.
    fn pitch_down(&mut self) {}

    /// Fill `frame` with samples to analyze and return how many of them are
    /// new; the first `frame.len() - new` samples were carried over from the
    /// previous frame. Advances `played_samples` by the returned count.
    fn get_frame(&mut self, frame: &mut [f32]) -> usize;
}

/// Generates a continuous sine wave, phase-accurate across frames.
pub struct WaveGenerator {
    sample_rate: f64,
    freq: f64,
    last_phase: f64,
    played: u64,
    overlap: Overlap,
}

impl WaveGenerator {
    pub fn new(sample_rate: f64, frame_size: usize, freq: f64, policy: OverlapPolicy) -> WaveGenerator {
        WaveGenerator {
            sample_rate,
            freq,
            last_phase: 0.0,
            played: 0,
            overlap: Overlap::new(policy, frame_size),
        }
    }

    pub fn freq(&self) -> f64 {
        self.freq
    }
}

impl SampleSource for WaveGenerator {
    fn name(&self) -> &'static str {
        "wave generator"
    }

    fn played_samples(&self) -> u64 {
        self.played
    }

    fn played_time(&self) -> f64 {
        self.played as f64 / self.sample_rate
    }

    fn pitch_up(&mut self) {
        self.freq += config::D_FREQ;
        info!("playing sine wave of {} Hz", self.freq);
    }

    fn pitch_down(&mut self) {
        self.freq -= config::D_FREQ;
        if self.freq < MIN_FREQ {
            warn!("can't set frequency below {} Hz", MIN_FREQ);
            self.freq = MIN_FREQ;
        }
        info!("playing sine wave of {} Hz", self.freq);
    }

    fn get_frame(&mut self, frame: &mut [f32]) -> usize {
        let start = self.overlap.begin_frame(frame, None);
        let new = frame.len() - start;

        for i in 0..new {
            frame[start + i] = sine_sample(self.freq, self.sample_rate, self.last_phase, i);
        }
        self.last_phase = advance_phase(self.last_phase, self.freq, self.sample_rate, new);
        self.played += new as u64;

        self.overlap.end_frame(frame);
        new
    }
}

/// Generates the sine of a tuned note, shifted in semitone steps.
pub struct NoteGenerator {
    sample_rate: f64,
    note: Note,
    last_phase: f64,
    played: u64,
    overlap: Overlap,
}

impl NoteGenerator {
    pub fn new(sample_rate: f64, frame_size: usize, note: Note, policy: OverlapPolicy) -> NoteGenerator {
        NoteGenerator {
            sample_rate,
            note,
            last_phase: 0.0,
            played: 0,
            overlap: Overlap::new(policy, frame_size),
        }
    }

    pub fn note(&self) -> &Note {
        &self.note
    }
}

impl SampleSource for NoteGenerator {
    fn name(&self) -> &'static str {
        "note generator"
    }

    fn played_samples(&self) -> u64 {
        self.played
    }

    fn played_time(&self) -> f64 {
        self.played as f64 / self.sample_rate
    }

    fn pitch_up(&mut self) {
        self.note = Note::from_midi(self.note.midi_number + 1);
        info!("playing note {}  ({} Hz)", self.note, self.note.freq);
    }

    fn pitch_down(&mut self) {
        self.note = Note::from_midi(self.note.midi_number - 1);
        info!("playing note {}  ({} Hz)", self.note, self.note.freq);
    }

    fn get_frame(&mut self, frame: &mut [f32]) -> usize {
        let start = self.overlap.begin_frame(frame, None);
        let new = frame.len() - start;

        for i in 0..new {
            frame[start + i] = sine_sample(self.note.freq, self.sample_rate, self.last_phase, i);
        }
        self.last_phase = advance_phase(self.last_phase, self.note.freq, self.sample_rate, new);
        self.played += new as u64;

        self.overlap.end_frame(frame);
        new
    }
}

/// Diagnostic source where sample `i` of the stream equals `i + 1`.
///
/// Reports a simulated input queue so the non-blocking overlap path can be
/// exercised without an audio device.
pub struct Increment {
    sample_rate: f64,
    played: u64,
    queued: usize,
    overlap: Overlap,
}

impl Increment {
    pub fn new(sample_rate: f64, frame_size: usize, policy: OverlapPolicy) -> Increment {
        Increment {
            sample_rate,
            played: 0,
            queued: 1,
            overlap: Overlap::new(policy, frame_size),
        }
    }
}

impl SampleSource for Increment {
    fn name(&self) -> &'static str {
        "increment (debug)"
    }

    fn is_blocking(&self) -> bool {
        true
    }

    fn available_samples(&self) -> Option<usize> {
        Some(self.queued)
    }

    fn played_samples(&self) -> u64 {
        self.played
    }

    fn played_time(&self) -> f64 {
        self.played as f64 / self.sample_rate
    }

    fn get_frame(&mut self, frame: &mut [f32]) -> usize {
        let start = self.overlap.begin_frame(frame, self.available_samples());
        let new = frame.len() - start;

        for i in 0..new {
            frame[start + i] = (self.played + i as u64 + 1) as f32;
        }
        self.played += new as u64;
        self.queued += 1;

        self.overlap.end_frame(frame);
        new
    }
}
