//! Digistring is a real-time monophonic pitch estimation engine for
//! instrument audio.
//!
//! A continuous stream of PCM samples is analyzed in overlapping windows in
//! the frequency domain, producing a stream of note events suitable for
//! synthesis, MIDI output or structured logging. The crate is organized
//! around the [`estimator::Estimator`] and [`source::SampleSource`] traits;
//! the [`program::Program`] loop wires them to the audio device, the synth
//! and the output sinks.

pub mod audio;
#[cfg(feature = "files")]
pub mod audio_file;
pub mod audio_in;
pub mod basic_fourier;
pub mod cache;
pub mod cli;
pub mod config;
pub mod estimator;
pub mod experiments;
pub mod highres;
pub mod math;
pub mod midi;
pub mod note;
pub mod program;
pub mod quit;
pub mod results;
pub mod source;
pub mod spectrum;
pub mod synth;
pub mod tuned;
pub mod window;
