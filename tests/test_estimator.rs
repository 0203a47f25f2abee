//! End-to-end estimator tests on synthetic signals.

use digistring::basic_fourier::BasicFourier;
use digistring::config;
use digistring::estimator::{likeliest_note, loudest_peak, lowest_peak, most_overtone_power, Estimator};
use digistring::highres::HighRes;
use digistring::note::{Note, NoteEvents};
use digistring::source::{NoteGenerator, OverlapPolicy, SampleSource, WaveGenerator};
use digistring::tuned::Tuned;

const FS: f64 = 96000.0;

fn perform_frame(
    estimator: &mut dyn Estimator,
    source: &mut dyn SampleSource,
    frame: &mut [f32],
) -> NoteEvents {
    source.get_frame(frame);
    let mut events = NoteEvents::new();
    estimator.perform(frame, &mut events);
    events
}

#[test]
fn test_highres_pure_tone() {
    // A 440 Hz sine from phase zero is identified as A4 within a tenth of a
    // hertz, as exactly one full-frame event.
    let mut estimator = HighRes::with_window_options(FS, 50.0, false);
    let n = estimator.frame_size();
    assert_eq!(n, config::FRAME_SIZE);

    let mut source = WaveGenerator::new(FS, n, 440.0, OverlapPolicy::None);
    let mut frame = vec![0.0f32; n];
    let events = perform_frame(&mut estimator, &mut source, &mut frame);

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.note.midi_number, 69);
    assert!(
        event.note.freq > 439.9 && event.note.freq < 440.1,
        "estimated {} Hz",
        event.note.freq
    );
    assert_eq!(event.offset, 0);
    assert_eq!(event.length, n);
    assert!(event.note.amp > 0.0);
}

#[test]
fn test_highres_spectrum_dimensions() {
    // The padded transform produces exactly M / 2 + 1 bins with spacing
    // FS / M; the snapshot's envelope carries all of them.
    let mut estimator = HighRes::with_window_options(FS, 50.0, false);
    estimator.record_snapshot(true);
    let n = estimator.frame_size();
    let m = n * (1 + config::ZERO_PAD_FACTOR);

    let mut source = WaveGenerator::new(FS, n, 440.0, OverlapPolicy::None);
    let mut frame = vec![0.0f32; n];
    perform_frame(&mut estimator, &mut source, &mut frame);

    let snapshot = estimator.snapshot();
    assert_eq!(snapshot.envelope.len(), m / 2 + 1);
    assert_eq!(snapshot.waveform.len(), n);
    let bins = snapshot.spectrum.bins();
    let bin_size = FS / m as f64;
    assert!((bins[0].bin_size - bin_size).abs() < 1.0e-12);
    assert!((bins[1].freq - bins[0].freq - bin_size).abs() < 1.0e-9);
}

#[test]
fn test_highres_silence() {
    // Zero input produces no events at all.
    let mut estimator = HighRes::with_window_options(FS, 50.0, false);
    let n = estimator.frame_size();
    let frame = vec![0.0f32; n];

    let mut events = NoteEvents::new();
    estimator.perform(&frame, &mut events);
    assert!(events.is_empty());

    // And stays silent on repeat.
    estimator.perform(&frame, &mut events);
    assert!(events.is_empty());
}

#[test]
fn test_highres_overlap_continuity() {
    // With 95% overlap on a generated A4, consecutive frames agree on the
    // note and nearly exactly on the frequency.
    let mut estimator = HighRes::with_window_options(FS, 50.0, false);
    let n = estimator.frame_size();
    let a4 = Note::from_midi(69);
    let mut source = NoteGenerator::new(FS, n, a4, OverlapPolicy::Fixed { ratio: 0.95 });
    let mut frame = vec![0.0f32; n];

    let mut freqs = Vec::new();
    for _ in 0..3 {
        let events = perform_frame(&mut estimator, &mut source, &mut frame);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].note.midi_number, 69);
        freqs.push(events[0].note.freq);
    }
    assert!((freqs[0] - freqs[1]).abs() < 0.5);
    assert!((freqs[1] - freqs[2]).abs() < 0.5);
}

#[test]
fn test_highres_window_fallback() {
    // Asking for the cache without one initialized falls back to
    // Blackman-Nuttall, which still identifies the tone.
    let mut estimator = HighRes::with_window_options(FS, 50.0, true);
    let n = estimator.frame_size();
    let mut source = WaveGenerator::new(FS, n, 440.0, OverlapPolicy::None);
    let mut frame = vec![0.0f32; n];
    let events = perform_frame(&mut estimator, &mut source, &mut frame);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].note.midi_number, 69);
}

#[test]
fn test_likeliest_note_harmonic_series() {
    // Candidates at 100, 200, 301, 400 and 517 Hz: the 100 Hz fundamental
    // collects the most harmonic support and wins.
    let freqs = [100.0, 200.0, 301.0, 400.0, 517.0];
    let amps = [1.0, 0.8, 0.2, 0.7, 0.3];
    let candidates: Vec<Note> = freqs
        .iter()
        .zip(&amps)
        .map(|(&f, &a)| Note::from_freq_amp(f, a))
        .collect();

    let selected = likeliest_note(&candidates, 10.0).expect("a note is selected");
    assert!((selected.freq - 100.0).abs() < 1.0e-9);
}

#[test]
fn test_likeliest_note_edge_cases() {
    assert!(likeliest_note(&[], 10.0).is_none());

    // A single candidate needs positive amplitude.
    let positive = [Note::from_freq_amp(440.0, 1.0)];
    assert!(likeliest_note(&positive, 10.0).is_some());
    let unknown = [Note::from_freq_amp(440.0, -1.0)];
    assert!(likeliest_note(&unknown, 10.0).is_none());
}

#[test]
fn test_alternative_selectors() {
    let candidates = [
        Note::from_freq_amp(100.0, 0.5),
        Note::from_freq_amp(200.0, 2.0),
        Note::from_freq_amp(300.0, 1.0),
    ];

    let loudest = loudest_peak(&candidates).unwrap();
    assert!((loudest.freq - 200.0).abs() < 1.0e-9);

    let lowest = lowest_peak(&candidates).unwrap();
    assert!((lowest.freq - 100.0).abs() < 1.0e-9);

    // 100 Hz owns the 200 and 300 Hz partials, so it has the most overtone
    // power even while being the quietest.
    let overtone = most_overtone_power(&candidates, 10.0).unwrap();
    assert!((overtone.freq - 100.0).abs() < 1.0e-9);
}

#[test]
fn test_basic_fourier_pure_tone() {
    let mut estimator = BasicFourier::new(FS);
    let n = estimator.frame_size();
    let mut source = WaveGenerator::new(FS, n, 440.0, OverlapPolicy::None);
    let mut frame = vec![0.0f32; n];
    let events = perform_frame(&mut estimator, &mut source, &mut frame);

    // The loudest bin quantizes to A4.
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].note.midi_number, 69);
    assert_eq!(events[0].length, n);
    assert_eq!(events[0].offset, 0);

    // Silence produces nothing.
    let silent = vec![0.0f32; n];
    let mut events = NoteEvents::new();
    estimator.perform(&silent, &mut events);
    assert!(events.is_empty());
}

#[test]
fn test_tuned_frame_size_and_output() {
    let mut estimator = Tuned::new(FS);
    // The input buffer covers one period of the lowest note.
    let e2_freq = Note::from_midi(config::LOWEST_NOTE).freq;
    assert_eq!(estimator.frame_size(), (FS / e2_freq).round() as usize);

    // A tuned estimate always lands inside the lowest octave and spans the
    // whole frame.
    let n = estimator.frame_size();
    let frame = vec![0.0f32; n];
    let mut events = NoteEvents::new();
    estimator.perform(&frame, &mut events);
    assert_eq!(events.len(), 1);
    let midi = events[0].note.midi_number;
    assert!((config::LOWEST_NOTE..config::LOWEST_NOTE + 12).contains(&midi));
    assert_eq!(events[0].length, n);
}
