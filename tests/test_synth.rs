//! Synthesizer tests.

use std::f64::consts::TAU;

use digistring::note::{Note, NoteEvent};
use digistring::synth::{create, Sine, SineAmped, Square, Synth, SynthKind};

const FS: f64 = 48000.0;

fn tone_event(freq: f64, amp: f64, length: usize, offset: usize) -> NoteEvent {
    NoteEvent::new(Note::from_freq_amp(freq, amp), length, offset)
}

#[test]
fn test_synth_kind_parsing() {
    assert_eq!("sine".parse::<SynthKind>().unwrap(), SynthKind::Sine);
    assert_eq!("square".parse::<SynthKind>().unwrap(), SynthKind::Square);
    assert_eq!(
        "sine_amped".parse::<SynthKind>().unwrap(),
        SynthKind::SineAmped
    );
    assert!("theremin".parse::<SynthKind>().is_err());
    assert_eq!(SynthKind::SineAmped.to_string(), "sine_amped");
}

#[test]
fn test_sine_starts_at_phase_zero() {
    let mut synth = Sine::new(FS);
    let mut buffer = vec![0.0f32; 256];
    let events = [tone_event(1000.0, 1.0, 256, 0)];
    synth.synthesize(&events, &mut buffer, 1.0);

    for (i, &sample) in buffer.iter().enumerate() {
        let expected = (TAU * i as f64 * 1000.0 / FS).sin();
        assert!(
            (sample as f64 - expected).abs() < 1.0e-4,
            "sample {}: {} vs {}",
            i,
            sample,
            expected
        );
    }
}

#[test]
fn test_sine_phase_continuity_across_frames() {
    let mut synth = Sine::new(FS);
    let n = 256;
    let freq = 1000.0;
    let mut all = Vec::new();
    let mut buffer = vec![0.0f32; n];
    for _ in 0..3 {
        let events = [tone_event(freq, 1.0, n, 0)];
        synth.synthesize(&events, &mut buffer, 1.0);
        all.extend_from_slice(&buffer);
    }

    for (i, &sample) in all.iter().enumerate() {
        let expected = (TAU * i as f64 * freq / FS).sin();
        assert!((sample as f64 - expected).abs() < 1.0e-4);
    }
}

#[test]
fn test_sine_finishes_wave_on_silence() {
    let mut synth = Sine::new(FS);
    let n = 100;
    let freq = 1000.0;
    let mut buffer = vec![0.0f32; n];
    synth.synthesize(&[tone_event(freq, 1.0, n, 0)], &mut buffer, 1.0);

    // Note off: the previous wave continues only to its next zero crossing.
    synth.synthesize(&[], &mut buffer, 1.0);
    let first_zero = buffer
        .iter()
        .position(|&s| s == 0.0)
        .expect("the wave must end within the frame");
    assert!(first_zero < n);
    // Everything after the crossing is silence.
    assert!(buffer[first_zero..].iter().all(|&s| s == 0.0));
    // The finished tail keeps one sign; no new period starts.
    let prefix = &buffer[..first_zero];
    assert!(
        prefix.iter().all(|&s| s >= 0.0) || prefix.iter().all(|&s| s <= 0.0),
        "tail swings through zero"
    );

    // A new tone after silence restarts from phase zero.
    synth.synthesize(&[tone_event(freq, 1.0, n, 0)], &mut buffer, 1.0);
    assert!((buffer[0] as f64).abs() < 1.0e-9);
}

#[test]
fn test_sine_event_bounds_are_silent() {
    let mut synth = Sine::new(FS);
    let mut buffer = vec![1.0f32; 64];
    synth.synthesize(&[tone_event(2000.0, 1.0, 16, 24)], &mut buffer, 1.0);
    assert!(buffer[..24].iter().all(|&s| s == 0.0));
    assert!(buffer[40..].iter().all(|&s| s == 0.0));
    assert!(buffer[24..40].iter().any(|&s| s != 0.0));
}

#[test]
fn test_square_levels() {
    let mut synth = Square::new(FS);
    let mut buffer = vec![0.0f32; 128];
    synth.synthesize(&[tone_event(1000.0, 1.0, 128, 0)], &mut buffer, 0.5);
    for &sample in &buffer {
        assert!(
            sample == 0.5 || sample == -0.5,
            "square sample {}",
            sample
        );
    }

    // Silence zeroes the buffer.
    synth.synthesize(&[], &mut buffer, 0.5);
    assert!(buffer.iter().all(|&s| s == 0.0));
}

#[test]
fn test_sine_amped_ramps_from_silence() {
    let mut synth = SineAmped::new(FS);
    let n = 512;
    let mut buffer = vec![0.0f32; n];
    synth.synthesize(&[tone_event(1000.0, 4.0, n, 0)], &mut buffer, 1.0);

    // The ramp starts at the previous level of zero.
    assert!((buffer[0] as f64).abs() < 1.0e-9);
    // Amplitude never exceeds the volume.
    assert!(buffer.iter().all(|&s| s.abs() <= 1.0 + 1.0e-6));
    // Late in the event the level approaches the full target.
    let late_peak = buffer[n / 2..]
        .iter()
        .map(|s| s.abs())
        .fold(0.0f32, f32::max);
    assert!(late_peak > 0.5, "late peak {}", late_peak);
}

#[test]
fn test_sine_amped_follows_relative_amplitude() {
    let mut synth = SineAmped::new(FS);
    let n = 512;
    let mut buffer = vec![0.0f32; n];

    // Loud note first; it sets the running maximum.
    synth.synthesize(&[tone_event(1000.0, 8.0, n, 0)], &mut buffer, 1.0);

    // A quieter note then targets half the level.
    synth.synthesize(&[tone_event(1000.0, 4.0, n, 0)], &mut buffer, 1.0);
    let peak = buffer[n / 2..].iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    assert!(peak < 0.76, "peak {}", peak);
    assert!(peak > 0.25, "peak {}", peak);

    // After a reset the next note is the loudest again.
    synth.reset_max_amp();
    synth.synthesize(&[tone_event(1000.0, 4.0, n, 0)], &mut buffer, 1.0);
    let peak = buffer[n / 2..].iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    assert!(peak > 0.9, "peak {}", peak);
}

#[test]
fn test_create_factory() {
    let mut buffer = vec![0.0f32; 32];
    for &kind in SynthKind::all() {
        let mut synth = create(kind, FS);
        synth.synthesize(&[], &mut buffer, 1.0);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }
}
