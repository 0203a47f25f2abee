//! Audio file source tests: overlap, seek and end-of-file behavior.
//!
//! End-of-file raises the process-wide quit flag, so everything runs as one
//! sequential test function.

#![cfg(feature = "files")]

use digistring::audio_file::AudioFile;
use digistring::quit::{poll_quit, reset_quit};
use digistring::source::{OverlapPolicy, SampleSource};

fn counting_samples(n: usize) -> Vec<f32> {
    (1..=n).map(|i| i as f32).collect()
}

#[test]
fn test_audio_file_lifecycle() {
    // Plain sequential reads.
    reset_quit();
    let mut file = AudioFile::from_samples(counting_samples(32), 48000, 8, OverlapPolicy::None);
    let mut frame = [0.0f32; 8];
    let new = file.get_frame(&mut frame);
    assert_eq!(new, 8);
    assert_eq!(frame, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    let new = file.get_frame(&mut frame);
    assert_eq!(new, 8);
    assert_eq!(frame, [9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
    assert!(!poll_quit());

    // Seek with overlap: read one frame, seek forward two samples, and the
    // next frame's carried half is recomputed from file content.
    reset_quit();
    let mut file =
        AudioFile::from_samples(counting_samples(12), 48000, 8, OverlapPolicy::Fixed { ratio: 0.5 });
    let new = file.get_frame(&mut frame);
    assert_eq!(new, 4);
    assert_eq!(frame, [0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);

    file.seek(2);
    let new = file.get_frame(&mut frame);
    assert_eq!(new, 4);
    assert_eq!(&frame[..4], &[3.0, 4.0, 5.0, 6.0]);
    assert_eq!(&frame[4..], &[7.0, 8.0, 9.0, 10.0]);

    // Seeking behind the start clamps to zero and silences the overlap.
    reset_quit();
    let mut file =
        AudioFile::from_samples(counting_samples(12), 48000, 8, OverlapPolicy::Fixed { ratio: 0.5 });
    file.get_frame(&mut frame);
    file.seek(-100);
    assert_eq!(file.played_samples(), 0);
    let new = file.get_frame(&mut frame);
    assert_eq!(new, 4);
    assert_eq!(frame, [0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
    assert!(!poll_quit());

    // Seeking near the start keeps what file content there is, zero-padded
    // in front.
    reset_quit();
    let mut file =
        AudioFile::from_samples(counting_samples(12), 48000, 8, OverlapPolicy::Fixed { ratio: 0.5 });
    file.seek(2);
    let new = file.get_frame(&mut frame);
    assert_eq!(new, 4);
    assert_eq!(frame, [0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    // The final partial frame is padded with silence and raises quit.
    reset_quit();
    let mut file = AudioFile::from_samples(counting_samples(10), 48000, 8, OverlapPolicy::None);
    file.get_frame(&mut frame);
    assert!(!poll_quit());
    let new = file.get_frame(&mut frame);
    assert_eq!(new, 8);
    assert_eq!(frame, [9.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    assert!(poll_quit());

    // Seeking past the end also quits.
    reset_quit();
    let mut file = AudioFile::from_samples(counting_samples(10), 48000, 8, OverlapPolicy::None);
    file.seek(100);
    assert!(poll_quit());

    reset_quit();
}
