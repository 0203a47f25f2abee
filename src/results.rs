//! JSON results sink.
//!
//! One document per run: a header describing the analysis configuration and
//! an array of note events, one object per frame. Silence frames record the
//! frame start with null note fields so downstream tools see note endings.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use log::warn;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{json, Map, Value};

use crate::config;
use crate::note::NoteEvent;
use crate::source::OverlapPolicy;

/// Append `_1`, `_2`, ... to the file stem until the path is unused.
pub fn disambiguate_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = path.extension().and_then(|s| s.to_str());
    for i in 1.. {
        let name = match extension {
            Some(ext) => format!("{}_{}.{}", stem, i, ext),
            None => format!("{}_{}", stem, i),
        };
        let candidate = path.with_file_name(name);
        if !candidate.exists() {
            warn!(
                "output file '{}' already exists; writing to '{}' instead",
                path.display(),
                candidate.display()
            );
            return candidate;
        }
    }
    unreachable!()
}

pub struct ResultsFile {
    path: PathBuf,
    header: Map<String, Value>,
    events: Vec<Value>,
    written: bool,
}

impl ResultsFile {
    /// Open a results file at `path`, disambiguating the name when taken.
    pub fn create(path: &Path) -> io::Result<ResultsFile> {
        let path = disambiguate_path(path);
        // Claim the path now so a failure surfaces at startup, not shutdown.
        File::create(&path)?;
        Ok(ResultsFile {
            path,
            header: Map::new(),
            events: Vec::new(),
            written: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record the analysis configuration of the run.
    pub fn write_header(&mut self, sample_rate: u32, frame_size: usize, policy: &OverlapPolicy) {
        let rate = sample_rate as f64;
        self.header
            .insert("Sample rate (Hz)".to_string(), json!(sample_rate));
        self.header
            .insert("Input buffer size (samples)".to_string(), json!(frame_size));
        self.header.insert(
            "Input buffer time (ms)".to_string(),
            json!(frame_size as f64 * 1000.0 / rate),
        );
        self.header.insert(
            "Fourier bin size (Hz)".to_string(),
            json!(rate / frame_size as f64),
        );

        match *policy {
            OverlapPolicy::None => {}
            OverlapPolicy::Fixed { ratio } => {
                self.header.insert("Overlap ratio".to_string(), json!(ratio));
            }
            OverlapPolicy::NonBlocking {
                min_new_ratio,
                max_new_ratio,
            } => {
                self.header.insert(
                    "Minimum non-blocking overlap ratio".to_string(),
                    json!(1.0 - max_new_ratio),
                );
                self.header.insert(
                    "Maximum non-blocking overlap ratio".to_string(),
                    json!(1.0 - min_new_ratio),
                );
            }
        }
    }

    /// Record the events of one frame. `start_sample` is the stream position
    /// of the first new sample in the frame.
    pub fn write_events(&mut self, events: &[NoteEvent], start_sample: u64, sample_rate: u32) {
        let rate = sample_rate as f64;
        let start_time = start_sample as f64 / rate;

        if events.is_empty() {
            if config::WRITE_SILENCE {
                let mut record = Map::new();
                record.insert("note_start (samples)".to_string(), json!(start_sample));
                record.insert("note_start (seconds)".to_string(), json!(start_time));
                record.insert("note_duration (samples)".to_string(), Value::Null);
                record.insert("note_duration (seconds)".to_string(), Value::Null);
                record.insert("note".to_string(), Value::Null);
                record.insert("frequency".to_string(), Value::Null);
                record.insert("amplitude".to_string(), Value::Null);
                record.insert("error".to_string(), Value::Null);
                record.insert("midi_number".to_string(), Value::Null);
                self.events.push(Value::Object(record));
            }
            return;
        }

        for event in events {
            let mut record = Map::new();
            record.insert(
                "note_start (samples)".to_string(),
                json!(start_sample + event.offset as u64),
            );
            record.insert(
                "note_start (seconds)".to_string(),
                json!(start_time + event.offset as f64 / rate),
            );
            record.insert("note_duration (samples)".to_string(), json!(event.length));
            record.insert(
                "note_duration (seconds)".to_string(),
                json!(event.length as f64 / rate),
            );
            record.insert("note".to_string(), json!(event.note.to_string_ascii()));
            record.insert("frequency".to_string(), json!(event.note.freq));
            record.insert("amplitude".to_string(), json!(event.note.amp));
            record.insert("error".to_string(), json!(event.note.error));
            record.insert("midi_number".to_string(), json!(event.note.midi_number));
            self.events.push(Value::Object(record));
        }
    }

    /// Render the document to a pretty JSON string with 4-space indentation.
    pub fn to_json_string(&self) -> io::Result<String> {
        let mut document = self.header.clone();
        document.insert(
            "note events".to_string(),
            Value::Array(self.events.clone()),
        );

        let mut out = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        Value::Object(document)
            .serialize(&mut serializer)
            .map_err(io::Error::from)?;
        String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Write the document out. Called once at the end of the run.
    pub fn close(mut self) -> io::Result<()> {
        self.write_out()
    }

    fn write_out(&mut self) -> io::Result<()> {
        use std::io::Write;
        let json = self.to_json_string()?;
        let mut file = BufWriter::new(File::create(&self.path)?);
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        self.written = true;
        Ok(())
    }
}

impl Drop for ResultsFile {
    fn drop(&mut self) {
        if !self.written {
            if let Err(e) = self.write_out() {
                warn!("failed to write results file '{}': {}", self.path.display(), e);
            }
        }
    }
}
