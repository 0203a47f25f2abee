//! Launch-time constants of the transcription engine.

use crate::estimator::EstimatorKind;
use crate::note::{midi_number, NoteName};

/// Sampling rate of input (and output if playback is enabled) in Hz.
pub const SAMPLE_RATE: u32 = 96000;
// pub const SAMPLE_RATE: u32 = 192000;
// pub const SAMPLE_RATE: u32 = 48000;

/// Device buffer size requested from the audio backend, in frames.
pub const SAMPLES_PER_BUFFER: u32 = 64;

/// When processing takes longer than playing the samples back, underruns occur.
pub const PRINT_AUDIO_UNDERRUNS: bool = false;

/// Estimation algorithm constructed by the program loop.
pub const ESTIMATOR: EstimatorKind = EstimatorKind::HighRes;

/// Notes outside this range are considered misdetections.
pub const LOWEST_NOTE: i32 = midi_number(NoteName::E, 2);
pub const HIGHEST_NOTE: i32 = midi_number(NoteName::E, 6);

/// Number of samples in a Fourier frame.
pub const FRAME_SIZE: usize = 1024 * 16;

/// Number of frames of zeros appended to the Fourier frame.
/// The padded transform length is `FRAME_SIZE * (1 + ZERO_PAD_FACTOR)`.
pub const ZERO_PAD_FACTOR: usize = 4;

/// Threshold of total spectrum power before peaks are searched at all.
pub const POWER_THRESHOLD: f64 = 15.0;

/// Threshold of peak height before a peak is significant.
pub const PEAK_THRESHOLD: f64 = 15.0;

/// Error in cents a detected overtone may have compared to the theoretical overtone.
pub const OVERTONE_ERROR: f64 = 10.0;

/// Dolph-Chebyshev side lobe attenuation in dB. Values below 45 dB leave the
/// window undefined.
pub const DEFAULT_ATTENUATION: f64 = 50.0;

/// Width of the Gaussian envelope kernel with respect to the padded transform size.
pub const KERNEL_WIDTH_FACTOR: f64 = 0.000478;

/// Higher values of sigma make values close to the kernel center weigh more.
pub const SIGMA: f64 = 1.2;

/// Minimum height of the envelope at peaks.
pub const ENVELOPE_MIN: f64 = 0.25;

/// Minimum difference in height from the last valley for a peak to count.
pub const MIN_PEAK_DY: f64 = 1.0;

/// Minimum height of a peak relative to the highest peak.
pub const SIGNAL_TO_NOISE_FILTER: f64 = 0.05;

/// Drop notes outside of [`LOWEST_NOTE`, `HIGHEST_NOTE`].
pub const LOW_HIGH_FILTER: bool = true;

/// Drop frames whose power jumps over the previous frame by more than
/// [`TRANSIENT_FILTER_POWER`].
pub const TRANSIENT_FILTER: bool = false;
pub const TRANSIENT_FILTER_POWER: f64 = 0.3;

/* Overlapping read buffers */
// Overlap only works when the same number of samples is requested from the
// sample source every call.

/// Keep a fixed ratio of the previous frame at the start of every new frame.
pub const DO_OVERLAP: bool = false;

/// Ratio of old to new buffer content, where higher numbers reuse more old buffer.
pub const OVERLAP_RATIO: f64 = 0.95;

/// Instead of a fixed ratio, read as many samples as are available without
/// blocking, bounded by the ratios below.
pub const DO_OVERLAP_NONBLOCK: bool = false;

/// Smallest fraction of a frame that must be new samples under non-blocking overlap.
pub const MIN_NEW_RATIO: f64 = 0.875;

/// Largest fraction of a frame that may be new samples under non-blocking overlap.
pub const MAX_NEW_RATIO: f64 = 1.0;

/// Frequency step of the wave generator per pitch shift, in Hz.
pub const D_FREQ: f64 = 5.0;

/* Results file */
pub const DEFAULT_OUTPUT_FILENAME: &str = "output.json";
pub const WRITE_SILENCE: bool = true;

/* Graphics front-end limits, enforced on the CLI resolution arguments. */
pub const MIN_RES_W: u32 = 800;
pub const MIN_RES_H: u32 = 600;

/// Cache directory relative to the resource directory.
pub const CACHE_DIR_FROM_RSC_DIR: &str = "../cache";

/// First whitespace-delimited token of the `verify` file in the resource directory.
pub const RSC_VERIFY_TOKEN: &str = "4c3f666590eeb398f4606555d3756350";
