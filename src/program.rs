//! The program loop.
//!
//! One thread owns the estimator, the sample source, the synth and every
//! buffer. Each cycle acquires a frame, estimates, renormalizes the events
//! for overlap, feeds the sinks and synchronizes against the audio output so
//! analysis never outruns playback.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::audio::{AudioError, AudioOutput};
use crate::cli::{Channel, Config};
use crate::config;
use crate::estimator::{Estimator, EstimatorSnapshot};
use crate::midi::MidiOut;
use crate::note::{Note, NoteEvents};
use crate::quit::poll_quit;
use crate::results::ResultsFile;
use crate::source::{OverlapPolicy, SampleSource};
use crate::synth::Synth;

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("results file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("received too many samples from the sample source")]
    TooManySamples,
    #[error("{0}")]
    Config(String),
}

/// A graphics or TUI front-end. The program loop drives it; it reads the
/// estimator snapshot and never touches estimator internals.
pub trait Visualizer {
    /// Drain UI events. May set the quit flag or shift the source pitch.
    fn handle_events(&mut self, source: &mut dyn SampleSource);

    /// Present the latest estimate.
    fn render(&mut self, note: Option<&Note>, snapshot: &EstimatorSnapshot);
}

/// Renormalize frame-relative events to the new-sample span of the frame.
///
/// The estimator is overlap-oblivious: it labels events relative to the full
/// frame of `frame_samples`. When only `new_samples` of those are new, events
/// entirely inside the carried-over region were already emitted last frame
/// and are dropped; events straddling the boundary are clipped; events in the
/// new region are shifted.
pub fn adjust_events(events: &mut NoteEvents, frame_samples: usize, new_samples: usize) {
    let old_samples = frame_samples - new_samples;
    events.retain_mut(|event| {
        if event.offset + event.length <= old_samples {
            false
        } else if event.offset < old_samples {
            let offset_before_new = old_samples - event.offset;
            event.length -= offset_before_new;
            event.offset = 0;
            true
        } else {
            event.offset -= old_samples;
            true
        }
    });
}

/// Scale events and the effective new-sample count by the slowdown factor,
/// spreading one analysis frame over `factor` times the real-time interval.
pub fn slowdown(events: &mut NoteEvents, new_samples: &mut usize, factor: f64) {
    for event in events.iter_mut() {
        event.offset = (event.offset as f64 * factor).round() as usize;
        event.length = (event.length as f64 * factor).round() as usize;
    }
    *new_samples = (*new_samples as f64 * factor).round() as usize;
}

/// Per-frame wall-clock measurements.
struct Performance {
    frame_start: Instant,
    points: Vec<(&'static str, Instant)>,
}

impl Performance {
    fn new() -> Performance {
        Performance {
            frame_start: Instant::now(),
            points: Vec::new(),
        }
    }

    fn start_frame(&mut self) {
        self.frame_start = Instant::now();
        self.points.clear();
    }

    fn push_time_point(&mut self, label: &'static str) {
        self.points.push((label, Instant::now()));
    }
}

impl fmt::Display for Performance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prev = self.frame_start;
        for (label, at) in &self.points {
            write!(f, "{}: {:.3} ms  ", label, (*at - prev).as_secs_f64() * 1000.0)?;
            prev = *at;
        }
        write!(
            f,
            "| frame total {:.3} ms",
            (prev - self.frame_start).as_secs_f64() * 1000.0
        )
    }
}

pub struct Program {
    sample_rate: u32,
    playback: bool,
    stereo_split: Option<Channel>,
    synth_volume: f64,
    slowdown_factor: Option<f64>,
    sync_with_audio: bool,
    overlap_policy: OverlapPolicy,

    estimator: Box<dyn Estimator>,
    source: Box<dyn SampleSource>,
    input_buffer: Vec<f32>,

    synth: Option<Box<dyn Synth>>,
    synth_buffer: Vec<f32>,
    playback_buffer: Vec<f32>,
    split_block: Vec<f32>,

    output: Option<AudioOutput>,
    results: Option<ResultsFile>,
    midi: Option<MidiOut>,
    visualizer: Option<Box<dyn Visualizer>>,

    perf: Performance,
    perf_out: Option<Option<BufWriter<File>>>,
    last_sync: Option<Instant>,
}

impl Program {
    /// Wire the loop together. The estimator dictates the frame size; the
    /// source must have been constructed for that size.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        mut estimator: Box<dyn Estimator>,
        source: Box<dyn SampleSource>,
        synth: Option<Box<dyn Synth>>,
        output: Option<AudioOutput>,
        results: Option<ResultsFile>,
        midi: Option<MidiOut>,
        visualizer: Option<Box<dyn Visualizer>>,
    ) -> Result<Program, ProgramError> {
        let frame_size = estimator.frame_size();
        let overlap_policy = OverlapPolicy::from_config();

        let mut sync_with_audio = config.sync_with_audio;
        if source.is_blocking() {
            if config.slowdown.is_some() {
                return Err(ProgramError::Config(
                    "can't slow down with a blocking sample source; the source itself sets the pace"
                        .to_string(),
                ));
            }
            if sync_with_audio {
                warn!("audio sync is redundant with a blocking sample source; disabling it");
                sync_with_audio = false;
            }
        } else if matches!(overlap_policy, OverlapPolicy::NonBlocking { .. }) {
            return Err(ProgramError::Config(
                "non-blocking overlap needs a sample source that reports available input"
                    .to_string(),
            ));
        }

        if visualizer.is_some() {
            estimator.record_snapshot(true);
        }

        let perf_out = match &config.perf_output {
            None => None,
            Some(None) => Some(None),
            Some(Some(path)) => Some(Some(BufWriter::new(File::create(path)?))),
        };

        Ok(Program {
            sample_rate: config::SAMPLE_RATE,
            playback: config.playback,
            stereo_split: config.stereo_split,
            synth_volume: config.synth.map(|(_, volume)| volume).unwrap_or(1.0),
            slowdown_factor: config.slowdown,
            sync_with_audio,
            overlap_policy,
            estimator,
            source,
            input_buffer: vec![0.0; frame_size],
            synth,
            synth_buffer: vec![0.0; frame_size],
            playback_buffer: vec![0.0; frame_size],
            split_block: vec![0.0; config::SAMPLES_PER_BUFFER as usize * 2],
            output,
            results,
            midi,
            visualizer,
            perf: Performance::new(),
            perf_out,
            last_sync: None,
        })
    }

    /// Run until the quit flag is set. On exit a final silence record
    /// terminates the last note in every sink.
    pub fn run(&mut self) -> Result<(), ProgramError> {
        let frame_size = self.estimator.frame_size();

        if let Some(results) = &mut self.results {
            results.write_header(self.sample_rate, frame_size, &self.overlap_policy);
        }

        let loop_start = Instant::now();
        let mut processed_samples: u64 = 0;
        let mut events = NoteEvents::new();

        while !poll_quit() {
            self.perf.start_frame();

            if let Some(visualizer) = &mut self.visualizer {
                visualizer.handle_events(self.source.as_mut());
            }
            if poll_quit() {
                break;
            }

            let new_samples = self.source.get_frame(&mut self.input_buffer);
            processed_samples += new_samples as u64;
            self.perf.push_time_point("got samples");

            // Monitor the raw input before the estimator consumes the frame.
            if self.playback {
                self.playback_audio(new_samples)?;
            }

            events.clear();
            self.estimator.perform(&self.input_buffer, &mut events);
            self.perf.push_time_point("pitch estimated");

            // With overlap, only events over the new samples matter; the rest
            // was already reported last frame.
            if new_samples < frame_size {
                adjust_events(&mut events, frame_size, new_samples);
            } else if new_samples > frame_size {
                return Err(ProgramError::TooManySamples);
            }

            if let Some(results) = &mut self.results {
                let start_sample = self.source.played_samples() - new_samples as u64;
                results.write_events(&events, start_sample, self.sample_rate);
            }
            if let Some(midi) = &mut self.midi {
                midi.send(&events);
            }

            let mut out_samples = new_samples;
            if let Some(factor) = self.slowdown_factor {
                slowdown(&mut events, &mut out_samples, factor);
            }

            if self.synth.is_some() {
                self.synthesize_audio(&events, out_samples)?;
                self.perf.push_time_point("synthesized audio");
            }

            if self.stereo_split.is_some() {
                self.play_split_audio(out_samples)?;
            }

            if let Some(visualizer) = &mut self.visualizer {
                let note = events.first().map(|event| &event.note);
                visualizer.render(note, self.estimator.snapshot());
                self.perf.push_time_point("frame rendered");
            }

            match &mut self.perf_out {
                None => {}
                Some(None) => println!("{}", self.perf),
                Some(Some(file)) => writeln!(file, "{}", self.perf)?,
            }

            // Always synchronize when playing audio out, so the loop never
            // runs faster than the audio is played.
            self.sync_with_audio(out_samples);
        }

        let loop_time = loop_start.elapsed().as_secs_f64();
        info!("pitch estimation time: {:.3} s", loop_time);
        if !self.sync_with_audio
            && self.output.is_none()
            && !self.source.is_blocking()
            && loop_time > 0.0
        {
            let processed_time = processed_samples as f64 / self.sample_rate as f64;
            info!("processed samples time: {:.3} s", processed_time);
            info!(
                "estimator was at least {:.2} times real-time",
                processed_time / loop_time
            );
        }

        // A silence record explicitly stops the last note.
        if let Some(results) = &mut self.results {
            results.write_events(&[], self.source.played_samples(), self.sample_rate);
        }
        if let Some(results) = self.results.take() {
            results.close()?;
        }
        if let Some(midi) = &mut self.midi {
            midi.send(&[]);
        }

        Ok(())
    }

    fn warn_underrun(&self) {
        if config::PRINT_AUDIO_UNDERRUNS {
            if let Some(output) = &self.output {
                if output.queued_samples() == 0 {
                    warn!("audio underrun; no audio left to play");
                }
            }
        }
    }

    // Enqueue (or stash, in stereo-split mode) the new samples of the frame.
    fn playback_audio(&mut self, new_samples: usize) -> Result<(), ProgramError> {
        self.warn_underrun();

        let frame_size = self.input_buffer.len();
        let tail = &self.input_buffer[frame_size - new_samples..];

        if self.stereo_split.is_some() {
            if new_samples > self.playback_buffer.len() {
                debug!("growing the playback buffer to fit the slowed frame");
                self.playback_buffer.resize(new_samples, 0.0);
            }
            self.playback_buffer[..new_samples].copy_from_slice(tail);
        } else if let Some(output) = &mut self.output {
            output.queue(tail)?;
        }
        Ok(())
    }

    fn synthesize_audio(&mut self, events: &NoteEvents, out_samples: usize) -> Result<(), ProgramError> {
        self.warn_underrun();

        if out_samples > self.synth_buffer.len() {
            // Slowdown stretches frames beyond the input buffer size.
            debug!("growing the synth buffer to fit the slowed frame");
            self.synth_buffer.resize(out_samples, 0.0);
        }

        let synth = self.synth.as_mut().expect("called only with a synth");
        synth.synthesize(events, &mut self.synth_buffer[..out_samples], self.synth_volume);

        if self.stereo_split.is_none() {
            if let Some(output) = &mut self.output {
                output.queue(&self.synth_buffer[..out_samples])?;
            }
        }
        Ok(())
    }

    // Interleave the monitored input and the synth over the stereo channels
    // in device-buffer-sized blocks.
    fn play_split_audio(&mut self, out_samples: usize) -> Result<(), ProgramError> {
        let Some(output) = &mut self.output else {
            return Ok(());
        };
        if out_samples > self.playback_buffer.len() {
            self.playback_buffer.resize(out_samples, 0.0);
        }

        let input_left = self.stereo_split == Some(Channel::Left);
        let block_frames = config::SAMPLES_PER_BUFFER as usize;
        let mut played = 0;
        while played < out_samples {
            let block = (out_samples - played).min(block_frames);
            for i in 0..block {
                let monitored = self.playback_buffer[played + i];
                let synthesized = self.synth_buffer[played + i];
                let (left, right) = if input_left {
                    (monitored, synthesized)
                } else {
                    (synthesized, monitored)
                };
                self.split_block[i * 2] = left;
                self.split_block[i * 2 + 1] = right;
            }
            output.queue(&self.split_block[..block * 2])?;
            played += block;
        }
        Ok(())
    }

    // The timing floor of the loop.
    fn sync_with_audio(&mut self, new_samples: usize) {
        let frame_size = self.estimator.frame_size();

        if let Some(output) = &mut self.output {
            // The output queue should never fill faster than it plays; with a
            // recording device racing it, clear the backlog instead of
            // drifting further behind.
            let channels = output.channels();
            if self.source.is_blocking()
                && output.queued_samples() > (frame_size as f64 * 1.9) as usize * channels
            {
                warn!("audio overrun (too much audio to play); clearing buffer...");
                output.clear();
            }

            // Wait until at most one frame is left queued.
            while output.queued_samples() >= frame_size * channels && !poll_quit() {
                std::thread::sleep(Duration::from_millis(1));
            }
        } else if self.sync_with_audio {
            // No playback; enforce a virtual sample rate instead.
            let Some(last) = self.last_sync else {
                // The first frame has no previous call to measure from.
                self.last_sync = Some(Instant::now());
                return;
            };
            let frame_time = new_samples as f64 / self.sample_rate as f64;
            while last.elapsed().as_secs_f64() < frame_time && !poll_quit() {
                std::thread::sleep(Duration::from_micros(500));
            }
            self.last_sync = Some(Instant::now());
        }
        // Otherwise a blocking input device paces the loop by itself.
    }
}
