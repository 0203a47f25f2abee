//! Window function tests. The cache is deliberately never initialized in
//! this test binary, so cache-requesting calls must fail cleanly.

use std::f64::consts::TAU;

use digistring::window::{
    blackman, blackman_harris, blackman_nuttall, dolph_chebyshev, dolph_chebyshev_uncached,
    flat_top, hamming, hann, nuttall, rectangle, welch, WindowError,
};

fn assert_symmetric(window: &[f64], tolerance: f64) {
    let n = window.len();
    for i in 0..n / 2 {
        assert!(
            (window[i] - window[n - 1 - i]).abs() <= tolerance,
            "asymmetry at index {}: {} vs {}",
            i,
            window[i],
            window[n - 1 - i]
        );
    }
}

#[test]
fn test_rectangle() {
    assert_eq!(rectangle(16), vec![1.0; 16]);
}

#[test]
fn test_hann_known_values() {
    let w = hann(4);
    assert!((w[0] - 0.0).abs() < 1.0e-12);
    assert!((w[1] - 0.5).abs() < 1.0e-12);
    assert!((w[2] - 1.0).abs() < 1.0e-12);
    assert!((w[3] - 0.5).abs() < 1.0e-12);
}

#[test]
fn test_hamming_endpoints() {
    let w = hamming(64);
    // 2 * 25/46 - 1 at the edges.
    assert!((w[0] - (50.0 / 46.0 - 1.0)).abs() < 1.0e-12);
    assert_symmetric(&w, 1.0e-12);
}

#[test]
fn test_cosine_sum_peaks() {
    // All cosine-sum windows peak at the center sample with the sum of their
    // coefficients, which is unity up to coefficient rounding.
    for w in [
        hamming(256),
        hann(256),
        blackman(256),
        nuttall(256),
        blackman_nuttall(256),
        blackman_harris(256),
        flat_top(256),
        welch(256),
    ] {
        assert_eq!(w.len(), 256);
        let peak = w.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(peak > 0.99 && peak < 1.01, "peak {}", peak);
        assert_symmetric(&w, 1.0e-9);
    }
}

#[test]
fn test_blackman_nuttall_edges() {
    let w = blackman_nuttall(1024);
    // a0 - a1 + a2 - a3
    let expected = 0.3635819 - 0.4891775 + 0.1365995 - 0.0106411;
    assert!((w[0] - expected).abs() < 1.0e-12);
    assert!(w[0] > 0.0);
}

#[test]
fn test_welch_shape() {
    let w = welch(8);
    assert!((w[0] - 0.0).abs() < 1.0e-12);
    assert!((w[4] - 1.0).abs() < 1.0e-12);
}

#[test]
fn test_dolph_chebyshev_shape() {
    let w = dolph_chebyshev_uncached(64, 50.0);
    assert_eq!(w.len(), 64);
    assert_symmetric(&w, 1.0e-9);

    // Unit peak at the center.
    let peak = w.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert!((peak - 1.0).abs() < 1.0e-12);
    assert!((w[31] - 1.0).abs() < 1.0e-9 || (w[32] - 1.0).abs() < 1.0e-9);

    // The edge pedestal is small but not zero.
    assert!(w[0] > 0.0 && w[0] < 0.2, "edge pedestal {}", w[0]);
}

#[test]
fn test_dolph_chebyshev_attenuation() {
    // Evaluate the window's transform directly; side lobes beyond the main
    // lobe must sit at least 45 dB below the peak for a 50 dB design.
    let n = 64;
    let w = dolph_chebyshev_uncached(n, 50.0);

    let magnitude = |f: f64| -> f64 {
        let mut re = 0.0;
        let mut im = 0.0;
        for (k, &wk) in w.iter().enumerate() {
            let angle = -TAU * f * k as f64;
            re += wk * angle.cos();
            im += wk * angle.sin();
        }
        (re * re + im * im).sqrt()
    };

    let peak = magnitude(0.0);
    let mut worst: f64 = 0.0;
    // Scan normalized frequencies outside the main lobe.
    let mut f = 8.0 / n as f64;
    while f <= 0.5 {
        worst = worst.max(magnitude(f));
        f += 1.0 / (8.0 * n as f64);
    }
    let ratio_db = 20.0 * (worst / peak).log10();
    assert!(ratio_db < -45.0, "worst side lobe {} dB", ratio_db);
}

#[test]
fn test_dolph_chebyshev_attenuation_ordering() {
    // More attenuation buys smaller side structure near the edges.
    let w50 = dolph_chebyshev_uncached(128, 50.0);
    let w90 = dolph_chebyshev_uncached(128, 90.0);
    assert!(w90[5] < w50[5] * 2.0);
    let peak90 = w90.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert!((peak90 - 1.0).abs() < 1.0e-12);
}

#[test]
fn test_dolph_cache_unavailable() {
    // Requesting the cache before it is initialized is an error...
    match dolph_chebyshev(64, 50.0, true) {
        Err(WindowError::CacheUnavailable) => {}
        other => panic!("expected CacheUnavailable, got {:?}", other.map(|w| w.len())),
    }
    // ...while bypassing the cache always works.
    let w = dolph_chebyshev(64, 50.0, false).unwrap();
    assert_eq!(w.len(), 64);
}
