//! The high resolution pitch estimator.
//!
//! A windowed, zero-padded real-to-complex transform followed by
//! envelope-based peak picking, log-space parabolic peak interpolation and
//! harmonic-consistency note selection.

use std::sync::Arc;

use log::warn;
use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::config;
use crate::estimator::{likeliest_note, Estimator, EstimatorKind, EstimatorSnapshot};
use crate::note::{NoteEvent, NoteEvents, Note};
use crate::spectrum;
use crate::spectrum::GaussianEnvelope;
use crate::window;

pub struct HighRes {
    sample_rate: f64,
    frame_size: usize,
    padded_size: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    /// Transform input; the first `frame_size` samples are the analysis
    /// window, the tail stays zero.
    padded: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f64>,
    norms: Vec<f64>,
    envelope_buf: Vec<f64>,
    envelope: GaussianEnvelope,
    peaks: Vec<usize>,
    candidates: Vec<Note>,
    prev_power: f64,
    snapshot: EstimatorSnapshot,
    record_snapshot: bool,
}

impl HighRes {
    /// Estimator at the configured frame size and attenuation, reading the
    /// window through the coefficient cache.
    pub fn new(sample_rate: f64) -> HighRes {
        HighRes::with_window_options(sample_rate, config::DEFAULT_ATTENUATION, true)
    }

    /// Estimator with an explicit Dolph-Chebyshev attenuation and cache
    /// choice. When the window cannot be produced, Blackman-Nuttall is used
    /// as a permanent fallback for the lifetime of the estimator.
    pub fn with_window_options(sample_rate: f64, attenuation_db: f64, use_cache: bool) -> HighRes {
        let frame_size = config::FRAME_SIZE;
        let padded_size = frame_size * (1 + config::ZERO_PAD_FACTOR);

        let window = match window::dolph_chebyshev(frame_size, attenuation_db, use_cache) {
            Ok(window) => window,
            Err(e) => {
                warn!("failed to get Dolph Chebyshev window; using Blackman Nuttall window instead ({})", e);
                window::blackman_nuttall(frame_size)
            }
        };

        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(padded_size);
        let padded = fft.make_input_vec();
        let output = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        let n_norms = padded_size / 2 + 1;

        HighRes {
            sample_rate,
            frame_size,
            padded_size,
            fft,
            padded,
            output,
            scratch,
            window,
            norms: vec![0.0; n_norms],
            envelope_buf: vec![0.0; n_norms],
            envelope: GaussianEnvelope::new(padded_size, config::KERNEL_WIDTH_FACTOR, config::SIGMA),
            peaks: Vec::new(),
            candidates: Vec::new(),
            prev_power: 0.0,
            snapshot: EstimatorSnapshot::default(),
            record_snapshot: false,
        }
    }

    /// Width of one interpolated bin in Hz.
    #[inline]
    fn bin_size(&self) -> f64 {
        self.sample_rate / self.padded_size as f64
    }

    fn interpolate_peaks(&mut self) {
        self.candidates.clear();
        let last_bin = self.padded_size / 2;
        for &peak in &self.peaks {
            // The interpolation needs both neighbors.
            if peak == 0 || peak == last_bin {
                warn!("peak on first or last bin");
                continue;
            }
            assert!(peak < last_bin, "peak found outside bins");

            let (p, amp) = spectrum::interpolate_max_log(
                self.norms[peak],
                self.norms[peak - 1],
                self.norms[peak + 1],
            );
            let freq = self.bin_size() * (peak as f64 + p);
            self.candidates.push(Note::from_freq_amp(freq, amp));
        }
    }

    fn fill_snapshot(&mut self, max_norm: f64) {
        let bin_size = self.bin_size();
        self.snapshot.max_norm = max_norm;

        self.snapshot.spectrum.clear();
        self.snapshot.envelope.clear();
        // Skip the DC offset in the spectrum; the envelope keeps it with a
        // zero-width bin.
        self.snapshot.envelope.add(0.0, self.envelope_buf[0], 0.0);
        for i in 1..self.norms.len() {
            let freq = i as f64 * bin_size;
            self.snapshot.spectrum.add(freq, self.norms[i], bin_size);
            self.snapshot.envelope.add(freq, self.envelope_buf[i], 0.0);
        }
        self.snapshot.spectrum.sort();
        self.snapshot.envelope.sort();

        self.snapshot.peak_frequencies.clear();
        for &peak in &self.peaks {
            self.snapshot.peak_frequencies.push(peak as f64 * bin_size);
        }
        self.snapshot
            .peak_frequencies
            .sort_by(|a, b| a.partial_cmp(b).unwrap());
    }
}

impl Estimator for HighRes {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::HighRes
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn perform(&mut self, frame: &[f32], events: &mut NoteEvents) {
        assert_eq!(frame.len(), self.frame_size);

        if self.record_snapshot {
            self.snapshot.waveform.clear();
            self.snapshot.waveform.extend_from_slice(frame);
        }

        // Apply the window function to minimize spectral leakage. The
        // transform scrambles its input, so the zero tail is refreshed too.
        for i in 0..self.frame_size {
            self.padded[i] = (frame[i] as f64 * self.window[i]) as f32;
        }
        self.padded[self.frame_size..].fill(0.0);

        self.fft
            .process_with_scratch(&mut self.padded, &mut self.output, &mut self.scratch)
            .expect("transform buffers are sized at construction");

        let (max_norm, power) = spectrum::norms_with_power(&self.output, &mut self.norms);

        self.envelope.apply(&self.norms, &mut self.envelope_buf);

        // Find peaks rising above the envelope, gated against the noise floor.
        self.peaks.clear();
        if power > config::POWER_THRESHOLD {
            spectrum::envelope_peaks_snr(
                &self.norms,
                &self.envelope_buf,
                &mut self.peaks,
                config::ENVELOPE_MIN,
                max_norm,
                config::SIGNAL_TO_NOISE_FILTER,
            );
        }

        self.interpolate_peaks();

        // Extract the played note from the candidates.
        if let Some(note) = likeliest_note(&self.candidates, config::OVERTONE_ERROR) {
            let mut add_note = true;
            if config::LOW_HIGH_FILTER
                && (note.midi_number < config::LOWEST_NOTE
                    || note.midi_number > config::HIGHEST_NOTE)
            {
                add_note = false;
            }
            if config::TRANSIENT_FILTER && power > self.prev_power + config::TRANSIENT_FILTER_POWER
            {
                add_note = false;
            }
            if add_note {
                events.push(NoteEvent::new(note, self.frame_size, 0));
            }
        }
        self.prev_power = power;

        if self.record_snapshot {
            self.fill_snapshot(max_norm);
        }
    }

    fn snapshot(&self) -> &EstimatorSnapshot {
        &self.snapshot
    }

    fn record_snapshot(&mut self, enable: bool) {
        self.record_snapshot = enable;
    }
}
