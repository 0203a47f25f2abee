//! The tuned pitch estimator.
//!
//! Twelve parallel short transforms, one per pitch class of the lowest
//! octave, each sized to a whole period of its note. The estimate is the note
//! whose channel collects the most power. Coarse, but cheap and quantized to
//! the scale by construction.

use std::sync::Arc;

use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::config;
use crate::estimator::{Estimator, EstimatorKind, EstimatorSnapshot};
use crate::note::{Note, NoteEvent, NoteEvents};
use crate::spectrum;
use crate::window;

/// Samples in a whole period of `note` at `sample_rate`.
#[inline]
fn fourier_size(note: &Note, sample_rate: f64) -> usize {
    (sample_rate / note.freq).round() as usize
}

pub struct Tuned {
    sample_rate: f64,
    /// Transform lengths per pitch class; index 0 is the lowest note and
    /// doubles as the input frame size.
    lengths: [usize; 12],
    ffts: Vec<Arc<dyn RealToComplex<f32>>>,
    ins: Vec<Vec<f32>>,
    outs: Vec<Vec<Complex<f32>>>,
    scratch: Vec<Complex<f32>>,
    windows: Vec<Vec<f64>>,
    norms: Vec<f64>,
    snapshot: EstimatorSnapshot,
    record_snapshot: bool,
}

impl Tuned {
    pub fn new(sample_rate: f64) -> Tuned {
        let mut lengths = [0usize; 12];
        for (i, length) in lengths.iter_mut().enumerate() {
            let note = Note::from_midi(config::LOWEST_NOTE + i as i32);
            *length = fourier_size(&note, sample_rate);
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let ffts: Vec<_> = lengths
            .iter()
            .map(|&len| planner.plan_fft_forward(len))
            .collect();
        let ins: Vec<_> = ffts.iter().map(|fft| fft.make_input_vec()).collect();
        let outs: Vec<_> = ffts.iter().map(|fft| fft.make_output_vec()).collect();
        let scratch_len = ffts
            .iter()
            .map(|fft| fft.get_scratch_len())
            .max()
            .unwrap_or(0);
        let windows: Vec<_> = lengths
            .iter()
            .map(|&len| window::blackman_nuttall(len))
            .collect();

        Tuned {
            sample_rate,
            lengths,
            ffts,
            ins,
            outs,
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            windows,
            norms: vec![0.0; lengths[0] / 2 + 1],
            snapshot: EstimatorSnapshot::default(),
            record_snapshot: false,
        }
    }
}

impl Estimator for Tuned {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Tuned
    }

    fn frame_size(&self) -> usize {
        self.lengths[0]
    }

    fn perform(&mut self, frame: &[f32], events: &mut NoteEvents) {
        assert_eq!(frame.len(), self.lengths[0]);

        if self.record_snapshot {
            self.snapshot.waveform.clear();
            self.snapshot.waveform.extend_from_slice(frame);
            self.snapshot.spectrum.clear();
        }

        // Each channel transforms the windowed tail of the frame at its own
        // length.
        for i in 0..12 {
            let len = self.lengths[i];
            let tail = &frame[self.lengths[0] - len..];
            for (j, sample) in self.ins[i].iter_mut().enumerate() {
                *sample = (tail[j] as f64 * self.windows[i][j]) as f32;
            }
            self.ffts[i]
                .process_with_scratch(&mut self.ins[i], &mut self.outs[i], &mut self.scratch)
                .expect("transform buffers are sized at construction");
        }

        let mut max_norm = 0.0;
        let mut max_power = -1.0;
        let mut max_power_channel = 0;
        for i in 0..12 {
            let n_norms = self.lengths[i] / 2 + 1;
            let (channel_max, power) =
                spectrum::norms_with_power(&self.outs[i], &mut self.norms[..n_norms]);

            if power > max_power {
                max_power = power;
                max_power_channel = i;
            }
            if channel_max > max_norm {
                max_norm = channel_max;
            }

            if self.record_snapshot {
                let bin_size = self.sample_rate / self.lengths[i] as f64;
                for j in 1..n_norms {
                    self.snapshot
                        .spectrum
                        .add(j as f64 * bin_size, self.norms[j], bin_size);
                }
            }
        }

        if self.record_snapshot {
            self.snapshot.max_norm = max_norm;
            self.snapshot.spectrum.add(0.0, 0.0, 0.0);
            self.snapshot.spectrum.sort();
        }

        let note = Note::from_midi(config::LOWEST_NOTE + max_power_channel as i32);
        events.push(NoteEvent::new(note, self.lengths[0], 0));
    }

    fn snapshot(&self) -> &EstimatorSnapshot {
        &self.snapshot
    }

    fn record_snapshot(&mut self, enable: bool) {
        self.record_snapshot = enable;
    }
}
