//! MIDI output sink.
//!
//! Emits raw 3-byte messages on a virtual port: Note On when a note starts,
//! Note Off when it stops, All Notes Off at shutdown. Velocity is the note
//! amplitude log-scaled against the loudest amplitude heard so far.

use std::collections::BTreeSet;

use log::warn;
use midir::{MidiOutput, MidiOutputConnection};

use crate::note::NoteEvent;

const ALL_NOTES_OFF: [u8; 3] = [0xB0, 123, 0];
const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;
const MAX_VELOCITY: f64 = 127.0;

#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("failed to initialize MIDI output: {0}")]
    Init(String),
    #[error("failed to open MIDI output port: {0}")]
    Connect(String),
}

/// Velocity of a note of amplitude `amp` against the running peak.
pub fn velocity(amp: f64, peak_amp: f64) -> u8 {
    let scaled = (amp.log2() / peak_amp.log2() * MAX_VELOCITY).round();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, MAX_VELOCITY) as u8
}

pub struct MidiOut {
    conn: MidiOutputConnection,
    prev_frame_notes: BTreeSet<i32>,
    loudest_note: f64,
}

impl MidiOut {
    /// Open a MIDI output. On Unix this creates a virtual port other
    /// applications can connect to; elsewhere the first real port is used.
    pub fn new() -> Result<MidiOut, MidiError> {
        let output = MidiOutput::new("digistring").map_err(|e| MidiError::Init(e.to_string()))?;

        #[cfg(unix)]
        let conn = {
            use midir::os::unix::VirtualOutput;
            output
                .create_virtual("digistring out")
                .map_err(|e| MidiError::Connect(e.to_string()))?
        };

        #[cfg(not(unix))]
        let conn = {
            let ports = output.ports();
            let port = ports
                .first()
                .ok_or_else(|| MidiError::Connect("no MIDI output ports".to_string()))?;
            output
                .connect(port, "digistring out")
                .map_err(|e| MidiError::Connect(e.to_string()))?
        };

        Ok(MidiOut {
            conn,
            prev_frame_notes: BTreeSet::new(),
            loudest_note: 0.1,
        })
    }

    pub fn reset_loudest_note(&mut self) {
        self.loudest_note = 0.1;
    }

    /// Emit Note On/Off messages for the difference between this frame's
    /// events and the previous frame's.
    pub fn send(&mut self, events: &[NoteEvent]) {
        let mut frame_notes = BTreeSet::new();
        for event in events {
            frame_notes.insert(event.note.midi_number);

            if event.note.amp > self.loudest_note {
                self.loudest_note = event.note.amp;
            }

            if !self.prev_frame_notes.contains(&event.note.midi_number) {
                let message = [
                    NOTE_ON,
                    event.note.midi_number as u8,
                    velocity(event.note.amp, self.loudest_note),
                ];
                if let Err(e) = self.conn.send(&message) {
                    warn!("failed to send MIDI note on: {}", e);
                }
            }
        }

        for &prev_note in &self.prev_frame_notes {
            if !frame_notes.contains(&prev_note) {
                if let Err(e) = self.conn.send(&[NOTE_OFF, prev_note as u8, 0]) {
                    warn!("failed to send MIDI note off: {}", e);
                }
            }
        }

        self.prev_frame_notes = frame_notes;
    }
}

impl Drop for MidiOut {
    fn drop(&mut self) {
        if let Err(e) = self.conn.send(&ALL_NOTES_OFF) {
            warn!("failed to send MIDI all notes off: {}", e);
        }
    }
}
