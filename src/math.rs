//! Math functions and utilities.

use std::f64::consts::TAU;

/// Linear interpolation between `a` and `b` with `t` in 0...1.
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Distance of `f1` from `f2` in cents (1/100 of a semitone).
#[inline]
pub fn cent_diff(f1: f64, f2: f64) -> f64 {
    1200.0 * (f1 / f2).log2()
}

/// One sample of a unit sine at `freq` Hz, `i` samples past a wave that
/// started `phase` (in 0...1) of a cycle into its period.
#[inline]
pub fn sine_sample(freq: f64, sample_rate: f64, phase: f64, i: usize) -> f32 {
    let offset = phase * (sample_rate / freq);
    (TAU * (i as f64 + offset) * freq / sample_rate).sin() as f32
}

/// Phase (in 0...1) of a sine at `freq` Hz after another `n` samples,
/// starting from `phase`.
#[inline]
pub fn advance_phase(phase: f64, freq: f64, sample_rate: f64, n: usize) -> f64 {
    (phase + freq / (sample_rate / n as f64)) % 1.0
}
