//! A baseline estimator: plain transform, loudest peak, nearest note.

use std::sync::Arc;

use log::warn;
use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::config;
use crate::estimator::{Estimator, EstimatorKind, EstimatorSnapshot};
use crate::note::{Note, NoteEvent, NoteEvents};
use crate::spectrum;
use crate::window;

pub struct BasicFourier {
    sample_rate: f64,
    frame_size: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f64>,
    norms: Vec<f64>,
    peaks: Vec<usize>,
    snapshot: EstimatorSnapshot,
    record_snapshot: bool,
}

impl BasicFourier {
    pub fn new(sample_rate: f64) -> BasicFourier {
        let frame_size = config::FRAME_SIZE;

        let window =
            match window::dolph_chebyshev(frame_size, config::DEFAULT_ATTENUATION, true) {
                Ok(window) => window,
                Err(e) => {
                    warn!("failed to get Dolph Chebyshev window; using Blackman Nuttall window instead ({})", e);
                    window::blackman_nuttall(frame_size)
                }
            };

        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(frame_size);
        let input = fft.make_input_vec();
        let output = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        BasicFourier {
            sample_rate,
            frame_size,
            fft,
            input,
            output,
            scratch,
            window,
            norms: vec![0.0; frame_size / 2 + 1],
            peaks: Vec::new(),
            snapshot: EstimatorSnapshot::default(),
            record_snapshot: false,
        }
    }

    /// Loudest peak, quantized to the nearest tuned note.
    fn loudest_quantized(&self) -> Option<Note> {
        let bin_size = self.sample_rate / self.frame_size as f64;
        let loudest = self
            .peaks
            .iter()
            .copied()
            .max_by(|&a, &b| self.norms[a].partial_cmp(&self.norms[b]).unwrap())?;
        let tuned = Note::from_freq(loudest as f64 * bin_size);
        let mut note = Note::from_midi(tuned.midi_number);
        note.amp = self.norms[loudest];
        Some(note)
    }
}

impl Estimator for BasicFourier {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::BasicFourier
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn perform(&mut self, frame: &[f32], events: &mut NoteEvents) {
        assert_eq!(frame.len(), self.frame_size);

        if self.record_snapshot {
            // Save the raw waveform before the window is applied.
            self.snapshot.waveform.clear();
            self.snapshot.waveform.extend_from_slice(frame);
        }

        for i in 0..self.frame_size {
            self.input[i] = (frame[i] as f64 * self.window[i]) as f32;
        }

        self.fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
            .expect("transform buffers are sized at construction");

        let (max_norm, _power) = spectrum::norms_with_power(&self.output, &mut self.norms);

        self.peaks.clear();
        spectrum::all_max_peaks(&self.norms, &mut self.peaks, config::PEAK_THRESHOLD);

        if let Some(note) = self.loudest_quantized() {
            events.push(NoteEvent::new(note, self.frame_size, 0));
        }

        if self.record_snapshot {
            let bin_size = self.sample_rate / self.frame_size as f64;
            self.snapshot.max_norm = max_norm;
            self.snapshot.spectrum.clear();
            for i in 1..self.norms.len() {
                self.snapshot
                    .spectrum
                    .add(i as f64 * bin_size, self.norms[i], bin_size);
            }
            self.snapshot.peak_frequencies.clear();
            for &peak in &self.peaks {
                self.snapshot.peak_frequencies.push(peak as f64 * bin_size);
            }
        }
    }

    fn snapshot(&self) -> &EstimatorSnapshot {
        &self.snapshot
    }

    fn record_snapshot(&mut self, enable: bool) {
        self.record_snapshot = enable;
    }
}
