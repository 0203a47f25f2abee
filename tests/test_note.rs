//! Note derivation and text form tests.

use digistring::note::{midi_number, Note, NoteName, A4};

fn close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

#[test]
fn test_a4_reference() {
    let note = Note::from_freq(A4);
    assert_eq!(note.midi_number, 69);
    assert_eq!(note.name, NoteName::A);
    assert_eq!(note.octave, 4);
    assert!(close(note.error, 0.0, 1.0e-9));
}

#[test]
fn test_midi_number_const() {
    assert_eq!(midi_number(NoteName::A, 4), 69);
    assert_eq!(midi_number(NoteName::C, 0), 12);
    assert_eq!(midi_number(NoteName::E, 2), 40);
    assert_eq!(midi_number(NoteName::E, 6), 88);
}

#[test]
fn test_freq_midi_round_trip() {
    // Any frequency maps to a note within 50 cents, and the note's exact
    // frequency maps back to the same MIDI number.
    for i in 0..200 {
        let freq = 30.0 * 1.05f64.powi(i % 80) + i as f64 * 0.13;
        let note = Note::from_freq(freq);
        assert!(note.error > -50.0 - 1.0e-9 && note.error < 50.0 + 1.0e-9);

        let tuned = Note::from_midi(note.midi_number);
        assert_eq!(Note::from_freq(tuned.freq).midi_number, note.midi_number);
        // Round-tripping the frequency stays within the original error.
        assert!(close(
            1200.0 * (freq / tuned.freq).log2(),
            note.error,
            1.0e-6
        ));
    }
}

#[test]
fn test_from_midi_octaves() {
    let e2 = Note::from_midi(40);
    assert_eq!(e2.name, NoteName::E);
    assert_eq!(e2.octave, 2);
    assert!(close(e2.freq, 82.4069, 1.0e-3));

    let c0 = Note::from_midi(12);
    assert_eq!(c0.name, NoteName::C);
    assert_eq!(c0.octave, 0);

    // Below C0 the octave goes negative.
    let b_minus = Note::from_midi(11);
    assert_eq!(b_minus.name, NoteName::B);
    assert_eq!(b_minus.octave, -1);
}

#[test]
fn test_ascii_strings() {
    assert_eq!(Note::from_midi(69).to_string_ascii(), "A4");
    assert_eq!(Note::from_midi(70).to_string_ascii(), "A#4");
    assert_eq!(Note::from_midi(40).to_string_ascii(), "E2");
}

#[test]
fn test_display_subscript() {
    assert_eq!(Note::from_midi(69).to_string(), "A₄");
    assert_eq!(Note::from_midi(11).to_string(), "B-₁");
}

#[test]
fn test_parse_notes() {
    assert_eq!("A4".parse::<Note>().unwrap().midi_number, 69);
    assert_eq!("a4".parse::<Note>().unwrap().midi_number, 69);
    assert_eq!("A#4".parse::<Note>().unwrap().midi_number, 70);
    assert_eq!("Ad4".parse::<Note>().unwrap().midi_number, 70);
    assert_eq!("Bb4".parse::<Note>().unwrap().midi_number, 70);
    assert_eq!("C-1".parse::<Note>().unwrap().midi_number, 0);
    assert_eq!("E2".parse::<Note>().unwrap().midi_number, 40);

    assert!("H4".parse::<Note>().is_err());
    assert!("A".parse::<Note>().is_err());
    assert!("A#x".parse::<Note>().is_err());
    assert!("".parse::<Note>().is_err());
}

#[test]
fn test_parse_wraps_accidentals() {
    // B#4 is C5, Cb5 is B4.
    assert_eq!("B#4".parse::<Note>().unwrap().midi_number, 72);
    assert_eq!("Cb5".parse::<Note>().unwrap().midi_number, 71);
}
