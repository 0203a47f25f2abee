//! Notes, note events and their text forms.

use std::fmt;
use std::str::FromStr;

use crate::math::cent_diff;

/// Concert pitch in Hz. MIDI number 69.
pub const A4: f64 = 440.0;

/// Frequency of C0, the origin of the pitch class and octave derivation.
#[inline]
pub fn c0() -> f64 {
    A4 * (-57.0_f64 / 12.0).exp2()
}

/// The twelve pitch classes. `Cs` denotes C#.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteName {
    C = 0,
    Cs = 1,
    D = 2,
    Ds = 3,
    E = 4,
    F = 5,
    Fs = 6,
    G = 7,
    Gs = 8,
    A = 9,
    As = 10,
    B = 11,
}

const NOTE_NAMES: [NoteName; 12] = [
    NoteName::C,
    NoteName::Cs,
    NoteName::D,
    NoteName::Ds,
    NoteName::E,
    NoteName::F,
    NoteName::Fs,
    NoteName::G,
    NoteName::Gs,
    NoteName::A,
    NoteName::As,
    NoteName::B,
];

const NOTE_STRING: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

impl NoteName {
    /// Pitch class for `index` semitones above C, which must be in 0...11.
    #[inline]
    pub fn from_index(index: usize) -> NoteName {
        NOTE_NAMES[index]
    }
}

/// MIDI number of a pitch class in an octave. A4 maps to 69.
pub const fn midi_number(name: NoteName, octave: i32) -> i32 {
    12 + octave * 12 + name as i32
}

/// A detected or requested pitch.
///
/// The pitch class, octave, cent error and MIDI number are all derived from
/// the frequency on construction; amplitude is carried along for selection
/// and synthesis and is negative when unknown.
#[derive(Clone, Copy, Debug)]
pub struct Note {
    pub freq: f64,
    pub amp: f64,
    pub name: NoteName,
    pub octave: i32,
    /// Distance from the tuned pitch in cents, between -50 and 50.
    pub error: f64,
    pub midi_number: i32,
}

impl Note {
    /// Closest note to `freq` Hz, with unknown amplitude.
    pub fn from_freq(freq: f64) -> Note {
        Note::from_freq_amp(freq, -1.0)
    }

    /// Closest note to `freq` Hz.
    pub fn from_freq_amp(freq: f64, amp: f64) -> Note {
        let d = (12.0 * (freq / c0()).log2()).round() as i32;
        let name = NoteName::from_index(((d % 12 + 12) % 12) as usize);
        let octave = (d as f64 / 12.0).floor() as i32;
        let tuned = c0() * (octave as f64 + name as i32 as f64 / 12.0).exp2();
        Note {
            freq,
            amp,
            name,
            octave,
            error: cent_diff(freq, tuned),
            midi_number: 12 + d,
        }
    }

    /// Exactly tuned note from a pitch class and octave.
    pub fn from_name(name: NoteName, octave: i32) -> Note {
        Note {
            freq: c0() * (octave as f64 + name as i32 as f64 / 12.0).exp2(),
            amp: -1.0,
            name,
            octave,
            error: 0.0,
            midi_number: midi_number(name, octave),
        }
    }

    /// Exactly tuned note from a MIDI number.
    pub fn from_midi(midi: i32) -> Note {
        let d = midi - 12;
        Note {
            freq: c0() * (d as f64 / 12.0).exp2(),
            amp: -1.0,
            name: NoteName::from_index(((d % 12 + 12) % 12) as usize),
            octave: (d as f64 / 12.0).floor() as i32,
            error: 0.0,
            midi_number: midi,
        }
    }

    /// ASCII form like `A#4`, as written to the results file.
    pub fn to_string_ascii(&self) -> String {
        format!("{}{}", NOTE_STRING[self.name as usize], self.octave)
    }
}

// Octave numbers render as Unicode subscripts on terminals.
fn subscript(n: i32) -> String {
    const DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];
    let mut out = String::new();
    if n < 0 {
        out.push('-');
    }
    for c in n.unsigned_abs().to_string().chars() {
        out.push(DIGITS[c.to_digit(10).unwrap() as usize]);
    }
    out
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NOTE_STRING[self.name as usize], subscript(self.octave))
    }
}

/// Error produced when parsing a note from text fails.
#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid note '{0}': expected a name (A-G), optional accidental (#, d or b) and octave")]
pub struct ParseNoteError(String);

impl FromStr for Note {
    type Err = ParseNoteError;

    /// Parse forms like `A4`, `a#3`, `Gb2` or `Dd-1`. The accidentals `#` and
    /// `d` sharpen, `b` flattens.
    fn from_str(s: &str) -> Result<Note, ParseNoteError> {
        let err = || ParseNoteError(s.to_string());
        let mut chars = s.chars();
        let name = chars.next().ok_or_else(err)?;
        let mut semitone = match name.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(err()),
        };
        let rest = chars.as_str();
        let octave_str = match rest.chars().next() {
            Some('#') | Some('d') => {
                semitone += 1;
                &rest[1..]
            }
            Some('b') => {
                semitone -= 1;
                &rest[1..]
            }
            _ => rest,
        };
        let octave: i32 = octave_str.parse().map_err(|_| err())?;
        // Cd and Bb wrap around to the neighboring octave.
        let d = octave * 12 + semitone;
        Ok(Note::from_midi(12 + d))
    }
}

/// Print a table of the first `n_overtones` harmonics of `note` with the
/// closest tuned note and cent error of each.
pub fn print_overtones(note: &Note, n_overtones: usize, print_midi_number: bool) {
    let mut header = vec![
        "n".to_string(),
        "f_harmonic".to_string(),
        "closest note".to_string(),
        "f_closest".to_string(),
        "cent error".to_string(),
    ];
    if print_midi_number {
        header.push("midi number".to_string());
    }

    let mut rows = Vec::new();
    for n in 0..n_overtones {
        let f_harmonic = note.freq * (n + 1) as f64;
        let closest = Note::from_freq(f_harmonic);
        let mut row = vec![
            n.to_string(),
            format!("{:.3}", f_harmonic),
            closest.to_string(),
            format!("{:.3}", A4 * ((closest.midi_number - 69) as f64 / 12.0).exp2()),
            format!("{:.3}", closest.error),
        ];
        if print_midi_number {
            row.push(closest.midi_number.to_string());
        }
        rows.push(row);
    }

    let widths: Vec<usize> = header
        .iter()
        .enumerate()
        .map(|(c, h)| {
            rows.iter()
                .map(|r| r[c].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let print_row = |row: &[String]| {
        let mut line = String::new();
        for (c, cell) in row.iter().enumerate() {
            let pad = widths[c] - cell.chars().count();
            line.push_str(cell);
            for _ in 0..pad + 2 {
                line.push(' ');
            }
        }
        println!("{}", line.trim_end());
    };

    println!("Overtones of {}  ({:.3} Hz)", note, note.freq);
    print_row(&header);
    for row in &rows {
        print_row(row);
    }
}

/// A note held for a span of samples within an analysis frame.
#[derive(Clone, Debug)]
pub struct NoteEvent {
    pub note: Note,
    /// Duration of the event in samples.
    pub length: usize,
    /// Start of the event from the beginning of the frame in samples.
    pub offset: usize,
    /// Estimation confidence; negative when unset.
    pub confidence: f64,
}

impl NoteEvent {
    pub fn new(note: Note, length: usize, offset: usize) -> NoteEvent {
        NoteEvent {
            note,
            length,
            offset,
            confidence: -1.0,
        }
    }

    pub fn with_confidence(note: Note, length: usize, offset: usize, confidence: f64) -> NoteEvent {
        NoteEvent {
            note,
            length,
            offset,
            confidence,
        }
    }
}

/// Events detected in one frame, in no particular order.
pub type NoteEvents = Vec<NoteEvent>;
