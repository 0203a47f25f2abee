//! Analysis window functions.
//!
//! All windows are generated in f64 for accuracy and normalized so that the
//! cosine-sum family peaks at (or very near) unity, matching their textbook
//! coefficient sets. The Dolph-Chebyshev window is synthesized from its
//! frequency-domain definition and explicitly normalized to unit peak.

use std::f64::consts::{PI, TAU};

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::cache;

/// Failure to produce a window.
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("window cache requested but the cache directory is not initialized")]
    CacheUnavailable,
}

pub fn rectangle(size: usize) -> Vec<f64> {
    vec![1.0; size]
}

// The cosine-sum windows below all share the same skeleton; only the
// coefficient sets differ.
fn cosine_sum(size: usize, coefficients: &[f64]) -> Vec<f64> {
    let n = size as f64;
    (0..size)
        .map(|i| {
            let x = i as f64 * PI;
            coefficients
                .iter()
                .enumerate()
                .map(|(k, a)| {
                    let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
                    sign * a * ((2.0 * k as f64 * x) / n).cos()
                })
                .sum()
        })
        .collect()
}

pub fn hamming(size: usize) -> Vec<f64> {
    let a0 = 25.0 / 46.0;
    cosine_sum(size, &[a0, 1.0 - a0])
}

pub fn hann(size: usize) -> Vec<f64> {
    let n = size as f64;
    (0..size)
        .map(|i| {
            let x = i as f64 * PI;
            (x / n).sin() * (x / n).sin()
        })
        .collect()
}

pub fn blackman(size: usize) -> Vec<f64> {
    cosine_sum(
        size,
        &[7938.0 / 18608.0, 9240.0 / 18608.0, 1430.0 / 18608.0],
    )
}

pub fn nuttall(size: usize) -> Vec<f64> {
    cosine_sum(size, &[0.355768, 0.487396, 0.144232, 0.012604])
}

pub fn blackman_nuttall(size: usize) -> Vec<f64> {
    cosine_sum(size, &[0.3635819, 0.4891775, 0.1365995, 0.0106411])
}

pub fn blackman_harris(size: usize) -> Vec<f64> {
    cosine_sum(size, &[0.35875, 0.48829, 0.14128, 0.01168])
}

pub fn flat_top(size: usize) -> Vec<f64> {
    cosine_sum(
        size,
        &[0.21557895, 0.41663158, 0.277263158, 0.083578947, 0.006947368],
    )
}

pub fn welch(size: usize) -> Vec<f64> {
    let hn = size as f64 / 2.0;
    (0..size)
        .map(|i| {
            let t = (i as f64 - hn) / hn;
            1.0 - t * t
        })
        .collect()
}

/// Chebyshev polynomial of the first kind by the Clenshaw recurrence, which
/// is the stable choice on -1...1.
fn chebyshev_t_clenshaw(n: usize, x: f64) -> f64 {
    let mut b_kplus1 = 0.0;
    let mut b_kplus2 = 0.0;
    let two_x = 2.0 * x;
    for k in (1..=n).rev() {
        let b_k = two_x.mul_add(b_kplus1, -b_kplus2 + if k == n { 1.0 } else { 0.0 });
        b_kplus2 = b_kplus1;
        b_kplus1 = b_k;
    }
    x * b_kplus1 - b_kplus2
}

/// Chebyshev polynomial of the first kind, switching evaluation by domain.
fn chebyshev_t(n: usize, x: f64) -> f64 {
    if x.abs() <= 1.0 {
        chebyshev_t_clenshaw(n, x)
    } else if x >= 1.0 {
        (n as f64 * x.acosh()).cosh()
    } else {
        let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
        sign * (n as f64 * (-x).acosh()).cosh()
    }
}

// Frequency samples of the Chebyshev pattern with the phase that centers the
// window across the n output samples.
fn dolph_chebyshev_spectrum(n: usize, attenuation_db: f64) -> Vec<Complex<f64>> {
    let ripple_ratio = 10f64.powf(attenuation_db / 20.0);
    let beta = (ripple_ratio.acosh() / (n - 1) as f64).cosh();
    let denom = chebyshev_t(n - 1, beta);
    let shift = (n as f64 - 1.0) / 2.0;

    (0..n)
        .map(|k| {
            let theta = (TAU * k as f64) / (2 * n) as f64;
            let weight = chebyshev_t(n - 1, beta * theta.cos()) / denom;
            let angle = -TAU * k as f64 * shift / n as f64;
            Complex::from_polar(weight, angle)
        })
        .collect()
}

/// Compute a Dolph-Chebyshev window of unit peak without touching the cache.
///
/// `attenuation_db` is the side lobe level below the main lobe; the window is
/// undefined below 45 dB and the caller is responsible for a valid value.
pub fn dolph_chebyshev_uncached(size: usize, attenuation_db: f64) -> Vec<f64> {
    assert!(size >= 2, "window too short to suppress side lobes");
    assert!(attenuation_db > 0.0, "attenuation must be positive");

    let mut spectrum = dolph_chebyshev_spectrum(size, attenuation_db);
    FftPlanner::new()
        .plan_fft_inverse(size)
        .process(&mut spectrum);

    let mut window: Vec<f64> = spectrum.iter().map(|c| c.re / size as f64).collect();

    // Enforce symmetry before normalization; the transform leaves the two
    // halves equal only up to rounding.
    for i in 0..size / 2 {
        let avg = 0.5 * (window[i] + window[size - 1 - i]);
        window[i] = avg;
        window[size - 1 - i] = avg;
    }

    let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    for v in window.iter_mut() {
        *v /= max;
    }
    window
}

/// Produce a Dolph-Chebyshev window, optionally through the coefficient cache.
///
/// With `use_cache` set, the window is looked up under
/// `(size, attenuation rounded to 3 decimals)`; on a miss it is computed and
/// written through before returning. Fails with
/// [`WindowError::CacheUnavailable`] when `use_cache` is set but the cache was
/// never initialized.
pub fn dolph_chebyshev(
    size: usize,
    attenuation_db: f64,
    use_cache: bool,
) -> Result<Vec<f64>, WindowError> {
    if !use_cache {
        return Ok(dolph_chebyshev_uncached(size, attenuation_db));
    }

    if !cache::is_initialized() {
        return Err(WindowError::CacheUnavailable);
    }

    if let Some(window) = cache::load_dolph_window(size, attenuation_db) {
        return Ok(window);
    }

    let window = dolph_chebyshev_uncached(size, attenuation_db);
    cache::save_dolph_window(&window, size, attenuation_db);
    Ok(window)
}
