//! Experimental parameter-search harnesses.
//!
//! These are offline tools run through `--experiment`; they print their
//! findings to standard output and exit.

use std::f64::consts::TAU;

use realfft::RealFftPlanner;

use crate::spectrum;
use crate::window;

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("experiment '{0}' not known")]
    Unknown(String),
}

/// Names and descriptions of the available experiments.
pub fn list() -> &'static [(&'static str, &'static str)] {
    &[(
        "qifft",
        "sweep the power-law exponent of parabolic peak interpolation and report the estimation error per exponent",
    )]
}

/// Run an experiment by name.
pub fn run(name: &str) -> Result<(), ExperimentError> {
    match name {
        "qifft" => {
            qifft_exponent_sweep();
            Ok(())
        }
        _ => Err(ExperimentError::Unknown(name.to_string())),
    }
}

/// Measure the frequency estimation error of power-law (XQIFFT) peak
/// interpolation over a range of exponents, on synthetic tones placed between
/// bin centers where interpolation has to do actual work.
fn qifft_exponent_sweep() {
    const SAMPLE_RATE: f64 = 48000.0;
    const FRAME_SIZE: usize = 4096;
    const ZERO_PAD: usize = 4;
    const PADDED: usize = FRAME_SIZE * (1 + ZERO_PAD);

    let fft = RealFftPlanner::<f32>::new().plan_fft_forward(PADDED);
    let window = window::blackman_nuttall(FRAME_SIZE);
    let bin_size = SAMPLE_RATE / PADDED as f64;

    // Tones swept across bin fractions at a few base frequencies.
    let mut tones = Vec::new();
    for &base in &[110.0f64, 440.0, 1760.0] {
        for i in 0..16 {
            tones.push(base + bin_size * (i as f64 / 16.0));
        }
    }

    let exponents: Vec<f64> = (1..=20).map(|i| i as f64 * 0.05).collect();
    let mut cent_errors = vec![0.0f64; exponents.len()];
    let mut log_cent_error = 0.0f64;

    let mut input = fft.make_input_vec();
    let mut output = fft.make_output_vec();
    let mut scratch = fft.make_scratch_vec();
    let mut norms = vec![0.0f64; PADDED / 2 + 1];

    for &freq in &tones {
        for i in 0..FRAME_SIZE {
            let sample = (TAU * i as f64 * freq / SAMPLE_RATE).sin();
            input[i] = (sample * window[i]) as f32;
        }
        input[FRAME_SIZE..].fill(0.0);
        fft.process_with_scratch(&mut input, &mut output, &mut scratch)
            .expect("transform buffers are sized above");
        spectrum::norms(&output, &mut norms);

        let peak = peak_bin(&norms);
        let (a, b, c) = (norms[peak - 1], norms[peak], norms[peak + 1]);

        for (e, &exponent) in exponents.iter().enumerate() {
            let (p, _) = spectrum::interpolate_max_xqifft(b, a, c, exponent);
            let estimate = (peak as f64 + p) * bin_size;
            cent_errors[e] += (1200.0 * (estimate / freq).log2()).abs();
        }

        let (p, _) = spectrum::interpolate_max_log(b, a, c);
        let estimate = (peak as f64 + p) * bin_size;
        log_cent_error += (1200.0 * (estimate / freq).log2()).abs();
    }

    let n = tones.len() as f64;
    println!("XQIFFT exponent sweep over {} tones:", tones.len());
    println!("{:>10}  {:>18}", "exponent", "mean error (cent)");
    let mut best = 0;
    for (e, &exponent) in exponents.iter().enumerate() {
        println!("{:>10.2}  {:>18.6}", exponent, cent_errors[e] / n);
        if cent_errors[e] < cent_errors[best] {
            best = e;
        }
    }
    println!();
    println!(
        "best exponent {:.2} with mean error {:.6} cent",
        exponents[best],
        cent_errors[best] / n
    );
    println!(
        "log-space interpolation for reference: {:.6} cent",
        log_cent_error / n
    );
}

fn peak_bin(norms: &[f64]) -> usize {
    let mut max_idx = 1;
    for i in 2..norms.len() - 1 {
        if norms[i] > norms[max_idx] {
            max_idx = i;
        }
    }
    max_idx
}
