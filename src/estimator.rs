//! The estimator interface and shared note selection functions.

use std::fmt;

use crate::math::cent_diff;
use crate::note::{Note, NoteEvents};
use crate::spectrum::Spectrum;

/// The available estimation algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimatorKind {
    HighRes,
    Tuned,
    BasicFourier,
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatorKind::HighRes => write!(f, "highres"),
            EstimatorKind::Tuned => write!(f, "tuned"),
            EstimatorKind::BasicFourier => write!(f, "basic fourier"),
        }
    }
}

/// Immutable view of the last analysis, for read-only consumption by a
/// graphics front-end. Estimators only fill it when recording is enabled.
#[derive(Clone, Debug, Default)]
pub struct EstimatorSnapshot {
    pub spectrum: Spectrum,
    pub envelope: Spectrum,
    /// Frequencies of the picked peaks, ascending.
    pub peak_frequencies: Vec<f64>,
    /// Copy of the raw input frame before windowing.
    pub waveform: Vec<f32>,
    /// Loudest component of the last frame.
    pub max_norm: f64,
}

/// A pitch estimation algorithm.
///
/// An estimator owns all of its buffers and transform plans; they are
/// allocated once at construction and reused every frame. Each `perform` call
/// receives exactly `frame_size()` samples and pushes zero or one event for a
/// monophonic source.
pub trait Estimator {
    fn kind(&self) -> EstimatorKind;

    /// Number of samples the sample source must deliver per call.
    fn frame_size(&self) -> usize;

    /// Analyze one frame. Events are labeled relative to the full frame;
    /// the program loop renormalizes them for overlap.
    fn perform(&mut self, frame: &[f32], events: &mut NoteEvents);

    /// Data of the last `perform` call, valid until the next one.
    fn snapshot(&self) -> &EstimatorSnapshot;

    /// Enable or disable snapshot recording. Disabled by default.
    fn record_snapshot(&mut self, enable: bool);
}

/// Select the candidate with the most overtone support: for each candidate,
/// count the higher candidates within `overtone_error` cents of one of its
/// harmonics, and take the maximum, ties broken by lowest index. A selection
/// with non-positive amplitude is rejected as noise.
pub fn likeliest_note(candidates: &[Note], overtone_error: f64) -> Option<Note> {
    match candidates.len() {
        0 => return None,
        1 => {
            return if candidates[0].amp > 0.0 {
                Some(candidates[0])
            } else {
                None
            }
        }
        _ => {}
    }

    let mut n_harmonics = vec![0usize; candidates.len()];
    for i in 0..candidates.len() {
        for j in i + 1..candidates.len() {
            let detected = candidates[j].freq;
            let theoretical = candidates[i].freq * (detected / candidates[i].freq).round();
            let cent_error = cent_diff(detected, theoretical);
            if cent_error > -overtone_error && cent_error < overtone_error {
                n_harmonics[i] += 1;
            }
        }
    }

    let mut max_idx = 0;
    for i in 1..candidates.len() {
        if n_harmonics[i] > n_harmonics[max_idx] {
            max_idx = i;
        }
    }

    if candidates[max_idx].amp <= 0.0 {
        return None;
    }
    Some(candidates[max_idx])
}

/// Select the candidate with the largest amplitude.
pub fn loudest_peak(candidates: &[Note]) -> Option<Note> {
    candidates
        .iter()
        .copied()
        .max_by(|a, b| a.amp.partial_cmp(&b.amp).unwrap())
}

/// Select the candidate with the lowest frequency.
pub fn lowest_peak(candidates: &[Note]) -> Option<Note> {
    candidates
        .iter()
        .copied()
        .min_by(|a, b| a.freq.partial_cmp(&b.freq).unwrap())
}

/// Select the candidate whose harmonics carry the most summed amplitude.
pub fn most_overtone_power(candidates: &[Note], overtone_error: f64) -> Option<Note> {
    match candidates.len() {
        0 => return None,
        1 => {
            return if candidates[0].amp > 0.0 {
                Some(candidates[0])
            } else {
                None
            }
        }
        _ => {}
    }

    let mut overtone_power = vec![0.0f64; candidates.len()];
    for i in 0..candidates.len() {
        for j in i + 1..candidates.len() {
            let detected = candidates[j].freq;
            let theoretical = candidates[i].freq * (detected / candidates[i].freq).round();
            let cent_error = cent_diff(detected, theoretical);
            if cent_error > -overtone_error && cent_error < overtone_error {
                overtone_power[i] += candidates[j].amp;
            }
        }
    }

    let mut max_idx = 0;
    for i in 1..candidates.len() {
        if overtone_power[i] > overtone_power[max_idx] {
            max_idx = i;
        }
    }

    if candidates[max_idx].amp <= 0.0 {
        return None;
    }
    Some(candidates[max_idx])
}
