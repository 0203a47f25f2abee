//! Spectrum primitives: norms, envelope, peak picking and peak interpolation.

use num_complex::Complex;

/// One frequency sample of a transform output.
#[derive(Clone, Copy, Debug)]
pub struct Bin {
    pub freq: f64,
    pub amp: f64,
    /// Total width of the bin in Hz, below and above `freq` together.
    pub bin_size: f64,
}

/// An ordered sequence of bins, sorted by frequency.
#[derive(Clone, Debug, Default)]
pub struct Spectrum {
    bins: Vec<Bin>,
}

impl Spectrum {
    pub fn new() -> Spectrum {
        Spectrum { bins: Vec::new() }
    }

    pub fn add(&mut self, freq: f64, amp: f64, bin_size: f64) {
        self.bins.push(Bin {
            freq,
            amp,
            bin_size,
        });
    }

    pub fn clear(&mut self) {
        self.bins.clear();
    }

    /// Sort bins on frequency.
    pub fn sort(&mut self) {
        self.bins
            .sort_by(|a, b| a.freq.partial_cmp(&b.freq).unwrap());
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Amplitude of every frequency component.
pub fn norms(values: &[Complex<f32>], norms: &mut [f64]) {
    for (n, v) in norms.iter_mut().zip(values) {
        *n = ((v.re as f64) * (v.re as f64) + (v.im as f64) * (v.im as f64)).sqrt();
    }
}

/// Amplitude of every frequency component; also returns
/// `(max_norm, total_power)` where power is the sum of all norms.
pub fn norms_with_power(values: &[Complex<f32>], norms: &mut [f64]) -> (f64, f64) {
    let mut max_norm = -1.0;
    let mut power = 0.0;
    for (n, v) in norms.iter_mut().zip(values) {
        *n = ((v.re as f64) * (v.re as f64) + (v.im as f64) * (v.im as f64)).sqrt();
        power += *n;
        if *n > max_norm {
            max_norm = *n;
        }
    }
    (max_norm, power)
}

/// Norms in dB. The offset of one keeps the output positive for display.
pub fn norms_db(values: &[Complex<f32>], norms: &mut [f64]) {
    for (n, v) in norms.iter_mut().zip(values) {
        let norm = ((v.re as f64) * (v.re as f64) + (v.im as f64) * (v.im as f64)).sqrt();
        *n = 20.0 * (1.0 + norm).log10();
    }
}

/// Norms in dB with `(max_norm, total_power)`.
pub fn norms_db_with_power(values: &[Complex<f32>], norms: &mut [f64]) -> (f64, f64) {
    let mut max_norm = -1.0;
    let mut power = 0.0;
    for (n, v) in norms.iter_mut().zip(values) {
        let norm = ((v.re as f64) * (v.re as f64) + (v.im as f64) * (v.im as f64)).sqrt();
        *n = 20.0 * (1.0 + norm).log10();
        power += *n;
        if *n > max_norm {
            max_norm = *n;
        }
    }
    (max_norm, power)
}

/// Precomputed Gaussian kernel for envelope smoothing.
///
/// The envelope is the Gaussian-weighted moving average of the norms and is
/// used as an adaptive peak threshold. At the borders the kernel is clipped
/// to the available range and the weights renormalized.
#[derive(Clone, Debug)]
pub struct GaussianEnvelope {
    kernel: Vec<f64>,
    mid: usize,
}

impl GaussianEnvelope {
    /// Kernel sized for a transform of `transform_size` samples: width
    /// `max(1, round(transform_size * width_factor))` rounded up to odd.
    pub fn new(transform_size: usize, width_factor: f64, sigma: f64) -> GaussianEnvelope {
        let mut width = ((transform_size as f64 * width_factor).round() as usize).max(1);
        if width % 2 == 0 {
            width += 1;
        }
        GaussianEnvelope::with_width(width, sigma)
    }

    /// Kernel of an explicit odd `width`.
    pub fn with_width(width: usize, sigma: f64) -> GaussianEnvelope {
        assert!(width % 2 == 1, "kernel width must be odd");
        let mid = width / 2;
        let kernel = (0..width)
            .map(|j| {
                if mid == 0 {
                    1.0
                } else {
                    let t = (j as f64 - mid as f64) / (mid as f64 * sigma);
                    (-std::f64::consts::PI * t * t).exp()
                }
            })
            .collect();
        GaussianEnvelope { kernel, mid }
    }

    pub fn width(&self) -> usize {
        self.kernel.len()
    }

    /// Smooth `norms` into `envelope`. Both slices must have the same length.
    pub fn apply(&self, norms: &[f64], envelope: &mut [f64]) {
        assert_eq!(norms.len(), envelope.len());
        let mid = self.mid as isize;
        let last = norms.len() as isize - 1;
        for i in 0..norms.len() as isize {
            let mut sum = 0.0;
            let mut weights = 0.0;
            for j in (-mid).max(-i)..=mid.min(last - i) {
                let g = self.kernel[(j + mid) as usize];
                sum += norms[(i + j) as usize] * g;
                weights += g;
            }
            envelope[i as usize] = sum / weights;
        }
    }
}

/// Every strict local maximum higher than `threshold`.
pub fn all_max_peaks(norms: &[f64], peaks: &mut Vec<usize>, threshold: f64) {
    for i in 1..norms.len() - 1 {
        if norms[i - 1] < norms[i] && norms[i] > norms[i + 1] && norms[i] > threshold {
            peaks.push(i);
        }
    }
}

/// Every strict local maximum higher than `threshold` and above the
/// signal-to-noise floor `max_norm * snr`.
pub fn all_max_peaks_snr(
    norms: &[f64],
    peaks: &mut Vec<usize>,
    threshold: f64,
    max_norm: f64,
    snr: f64,
) {
    for i in 1..norms.len() - 1 {
        if norms[i - 1] < norms[i]
            && norms[i] > norms[i + 1]
            && norms[i] > threshold
            && norms[i] > max_norm * snr
        {
            peaks.push(i);
        }
    }
}

/// Local maxima rising above the envelope where the envelope itself is above
/// `envelope_min`. Starts at index 5 to skip DC and near-DC artifacts.
pub fn envelope_peaks(norms: &[f64], envelope: &[f64], peaks: &mut Vec<usize>, envelope_min: f64) {
    for i in 5..norms.len() - 1 {
        if norms[i - 1] < norms[i]
            && norms[i] > norms[i + 1]
            && norms[i] > envelope[i]
            && envelope[i] > envelope_min
        {
            peaks.push(i);
        }
    }
}

/// [`envelope_peaks`] with an additional signal-to-noise gate against the
/// loudest component.
pub fn envelope_peaks_snr(
    norms: &[f64],
    envelope: &[f64],
    peaks: &mut Vec<usize>,
    envelope_min: f64,
    max_norm: f64,
    snr: f64,
) {
    for i in 5..norms.len() - 1 {
        if norms[i - 1] < norms[i]
            && norms[i] > norms[i + 1]
            && norms[i] > envelope[i]
            && envelope[i] > envelope_min
            && norms[i] > max_norm * snr
        {
            peaks.push(i);
        }
    }
}

/// Alternating peak/valley traversal; a peak counts only when it rises more
/// than `min_dy` over the preceding valley.
pub fn min_dy_peaks(norms: &[f64], peaks: &mut Vec<usize>, min_dy: f64) {
    let mut was_peak = false;
    let mut extreme_value_idx = 0;

    for i in 1..norms.len() - 1 {
        if was_peak {
            if norms[i - 1] > norms[i] && norms[i] < norms[i + 1] {
                was_peak = false;
                extreme_value_idx = i;
            }
        } else if norms[i - 1] < norms[i] && norms[i] > norms[i + 1] {
            if (norms[extreme_value_idx] - norms[i]).abs() > min_dy {
                peaks.push(i);
            }
            was_peak = true;
            extreme_value_idx = i;
        }
    }
}

// Fit a parabola through three equidistant points with b the maximum; the
// vertex lands within half a bin of the middle point.
#[inline]
fn parabolic_vertex(a: f64, b: f64, c: f64) -> (f64, f64) {
    let p = 0.5 * ((a - c) / (a - 2.0 * b + c));
    (p, b - 0.25 * (a - c) * p)
}

/// Interpolate a peak on the raw magnitudes. Returns the offset of the true
/// maximum from the middle bin in -0.5...0.5 and the interpolated amplitude.
#[inline]
pub fn interpolate_max(peak: f64, l_neighbor: f64, r_neighbor: f64) -> (f64, f64) {
    parabolic_vertex(l_neighbor, peak, r_neighbor)
}

/// Interpolate a peak on natural-log magnitudes; the returned amplitude is
/// mapped back to the linear domain.
#[inline]
pub fn interpolate_max_log(peak: f64, l_neighbor: f64, r_neighbor: f64) -> (f64, f64) {
    let (p, amp) = parabolic_vertex(l_neighbor.ln(), peak.ln(), r_neighbor.ln());
    (p, amp.exp())
}

/// Interpolate a peak on log2 magnitudes.
#[inline]
pub fn interpolate_max_log2(peak: f64, l_neighbor: f64, r_neighbor: f64) -> (f64, f64) {
    let (p, amp) = parabolic_vertex(l_neighbor.log2(), peak.log2(), r_neighbor.log2());
    (p, amp.exp2())
}

/// Interpolate a peak on log10 magnitudes.
#[inline]
pub fn interpolate_max_log10(peak: f64, l_neighbor: f64, r_neighbor: f64) -> (f64, f64) {
    let (p, amp) = parabolic_vertex(l_neighbor.log10(), peak.log10(), r_neighbor.log10());
    (p, 10f64.powf(amp))
}

/// Interpolate a peak on dB magnitudes.
#[inline]
pub fn interpolate_max_db(peak: f64, l_neighbor: f64, r_neighbor: f64) -> (f64, f64) {
    let (p, amp) = parabolic_vertex(
        20.0 * l_neighbor.log10(),
        20.0 * peak.log10(),
        20.0 * r_neighbor.log10(),
    );
    (p, 10f64.powf(amp / 20.0))
}

/// Interpolate a peak on power-law transformed magnitudes `x^exponent`.
/// Exponents below one flatten the peak the way the log variants do, while
/// staying defined at zero magnitude.
#[inline]
pub fn interpolate_max_xqifft(
    peak: f64,
    l_neighbor: f64,
    r_neighbor: f64,
    exponent: f64,
) -> (f64, f64) {
    let (p, amp) = parabolic_vertex(
        l_neighbor.powf(exponent),
        peak.powf(exponent),
        r_neighbor.powf(exponent),
    );
    (p, amp.powf(1.0 / exponent))
}
