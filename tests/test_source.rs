//! Sample source and overlap policy tests.

use digistring::source::{
    Increment, NoteGenerator, OverlapPolicy, SampleSource, WaveGenerator,
};

const FS: f64 = 48000.0;

#[test]
fn test_increment_no_overlap() {
    let mut source = Increment::new(FS, 8, OverlapPolicy::None);
    let mut frame = [0.0f32; 8];

    let new = source.get_frame(&mut frame);
    assert_eq!(new, 8);
    assert_eq!(frame, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    assert_eq!(source.played_samples(), 8);

    let new = source.get_frame(&mut frame);
    assert_eq!(new, 8);
    assert_eq!(frame, [9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
    assert_eq!(source.played_samples(), 16);
}

#[test]
fn test_increment_fixed_overlap() {
    let mut source = Increment::new(FS, 8, OverlapPolicy::Fixed { ratio: 0.5 });
    let mut frame = [0.0f32; 8];

    // The first frame overlaps with the initial silence.
    let new = source.get_frame(&mut frame);
    assert_eq!(new, 4);
    assert_eq!(frame, [0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);

    let new = source.get_frame(&mut frame);
    assert_eq!(new, 4);
    assert_eq!(frame, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    assert_eq!(source.played_samples(), 8);
}

#[test]
fn test_overlap_continuity_invariant() {
    // The next frame's first n - k samples equal this frame's last n - k.
    let mut source = Increment::new(FS, 16, OverlapPolicy::Fixed { ratio: 0.75 });
    let mut prev = [0.0f32; 16];
    let mut frame = [0.0f32; 16];

    let mut played = 0u64;
    source.get_frame(&mut prev);
    for _ in 0..10 {
        let new = source.get_frame(&mut frame);
        assert!(new > 0 && new <= 16);
        let old = 16 - new;
        assert_eq!(&frame[..old], &prev[16 - old..]);

        // Invariant: played samples strictly increase by the new count.
        let now = source.played_samples();
        assert!(now > played);
        played = now;
        prev.copy_from_slice(&frame);
    }
}

#[test]
fn test_increment_nonblocking_overlap() {
    let mut source = Increment::new(
        FS,
        16,
        OverlapPolicy::NonBlocking {
            min_new_ratio: 0.25,
            max_new_ratio: 0.75,
        },
    );
    let mut frame = [0.0f32; 16];

    // One simulated sample queued: clamped up to the minimum of 4 new.
    let new = source.get_frame(&mut frame);
    assert_eq!(new, 4);
    assert_eq!(&frame[12..], &[1.0, 2.0, 3.0, 4.0]);
    // The pasted part comes from the initial silence.
    assert!(frame[..12].iter().all(|&s| s == 0.0));

    // Queue grows by one per call; still below the minimum.
    let new = source.get_frame(&mut frame);
    assert_eq!(new, 4);
    assert!(frame[..8].iter().all(|&s| s == 0.0));
    // Overlap carried the previous frame's tail.
    assert_eq!(&frame[8..], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
}

#[test]
fn test_nonblocking_bounds() {
    // However the queue develops, the new-sample count stays in band.
    let mut source = Increment::new(
        FS,
        64,
        OverlapPolicy::NonBlocking {
            min_new_ratio: 0.125,
            max_new_ratio: 0.5,
        },
    );
    let mut frame = [0.0f32; 64];
    for _ in 0..50 {
        let new = source.get_frame(&mut frame);
        assert!((8..=32).contains(&new), "new = {}", new);
    }
}

#[test]
fn test_wave_generator_phase_continuity() {
    let freq = 1000.0;
    let mut source = WaveGenerator::new(FS, 64, freq, OverlapPolicy::None);
    let mut all = Vec::new();
    let mut frame = [0.0f32; 64];
    for _ in 0..4 {
        let new = source.get_frame(&mut frame);
        assert_eq!(new, 64);
        all.extend_from_slice(&frame);
    }

    // The concatenation is one continuous sine from phase zero.
    for (i, &sample) in all.iter().enumerate() {
        let expected = (std::f64::consts::TAU * i as f64 * freq / FS).sin();
        assert!(
            (sample as f64 - expected).abs() < 1.0e-4,
            "sample {} is {}, expected {}",
            i,
            sample,
            expected
        );
    }
}

#[test]
fn test_wave_generator_overlap_continuity() {
    let freq = 440.0;
    let mut source = WaveGenerator::new(FS, 128, freq, OverlapPolicy::Fixed { ratio: 0.75 });
    let mut prev = [0.0f32; 128];
    let mut frame = [0.0f32; 128];

    source.get_frame(&mut prev);
    for _ in 0..5 {
        let new = source.get_frame(&mut frame);
        let old = 128 - new;
        assert_eq!(&frame[..old], &prev[128 - old..]);
        prev.copy_from_slice(&frame);
    }
}

#[test]
fn test_wave_generator_pitch_shift() {
    let mut source = WaveGenerator::new(FS, 64, 10.0, OverlapPolicy::None);
    source.pitch_up();
    assert!((source.freq() - 15.0).abs() < 1.0e-12);

    // Shifting down clamps at 1 Hz.
    for _ in 0..10 {
        source.pitch_down();
    }
    assert!((source.freq() - 1.0).abs() < 1.0e-12);
}

#[test]
fn test_note_generator_pitch_shift() {
    let a4 = "A4".parse().unwrap();
    let mut source = NoteGenerator::new(FS, 64, a4, OverlapPolicy::None);
    assert_eq!(source.note().midi_number, 69);
    source.pitch_up();
    assert_eq!(source.note().midi_number, 70);
    source.pitch_down();
    source.pitch_down();
    assert_eq!(source.note().midi_number, 68);
}

#[test]
fn test_blocking_flags() {
    let increment = Increment::new(FS, 8, OverlapPolicy::None);
    assert!(increment.is_blocking());
    assert!(increment.available_samples().is_some());

    let wave = WaveGenerator::new(FS, 8, 100.0, OverlapPolicy::None);
    assert!(!wave.is_blocking());
    assert!(wave.available_samples().is_none());
}
