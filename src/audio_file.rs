//! WAV file playback source.
//!
//! The file is decoded up front into a mono float buffer; playback then reads
//! frames out of it, seeks by rewriting the overlap buffer from file content,
//! and pads the final partial frame with silence before signaling quit.

use std::fs::File;
use std::path::Path;

use log::info;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::quit::set_quit;
use crate::source::{Overlap, OverlapPolicy, SampleSource};

#[derive(Debug, thiserror::Error)]
pub enum AudioFileError {
    #[error("failed to open file: {0}")]
    Open(#[from] std::io::Error),
    #[error("failed to decode file: {0}")]
    Decode(#[from] symphonia::core::errors::Error),
    #[error("no decodable track in file")]
    NoTrack,
    #[error("internal sample rate ({expected} Hz) mismatches file sample rate ({file} Hz)")]
    SampleRateMismatch { file: u32, expected: u32 },
    #[error("only mono files are supported, this one has {0} channels")]
    NotMono(usize),
}

/// Plays a pre-decoded mono audio file.
pub struct AudioFile {
    sample_rate: f64,
    samples: Vec<f32>,
    played: u64,
    overlap: Overlap,
}

impl AudioFile {
    /// Decode `path` and verify it is mono at `sample_rate`.
    pub fn open(
        path: &Path,
        sample_rate: u32,
        frame_size: usize,
        policy: OverlapPolicy,
    ) -> Result<AudioFile, AudioFileError> {
        let (samples, file_rate) = decode_mono(path)?;
        if file_rate != sample_rate {
            return Err(AudioFileError::SampleRateMismatch {
                file: file_rate,
                expected: sample_rate,
            });
        }

        info!(
            "audio file loaded, {:.3} seconds long",
            samples.len() as f64 / sample_rate as f64
        );
        Ok(AudioFile::from_samples(samples, sample_rate, frame_size, policy))
    }

    /// Playback source over an in-memory sample buffer.
    pub fn from_samples(
        samples: Vec<f32>,
        sample_rate: u32,
        frame_size: usize,
        policy: OverlapPolicy,
    ) -> AudioFile {
        AudioFile {
            sample_rate: sample_rate as f64,
            samples,
            played: 0,
            overlap: Overlap::new(policy, frame_size),
        }
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// Move the playback position by `d_samples`, clamping at the start and
    /// quitting past the end. The overlap buffer is recomputed from file
    /// content so the next frame overlaps correctly.
    pub fn seek(&mut self, d_samples: i64) {
        let position = self.played as i64 + d_samples;

        if position <= 0 {
            self.played = 0;
            self.overlap.clear();
            return;
        }
        let position = position as usize;

        if position > self.samples.len() {
            info!("file ended after seek");
            self.played = position as u64;
            set_quit();
            return;
        }
        self.played = position as u64;

        let overlap_size = self.overlap.buffer_len();
        if overlap_size == 0 {
            return;
        }

        // Rebuild the carried samples from what precedes the new position,
        // padding with silence when the position is closer to the start than
        // one overlap region.
        let mut carried = vec![0.0f32; overlap_size];
        let from_file = overlap_size.min(position);
        carried[overlap_size - from_file..]
            .copy_from_slice(&self.samples[position - from_file..position]);
        self.overlap.set_buffer(&carried);
    }
}

impl SampleSource for AudioFile {
    fn name(&self) -> &'static str {
        "audio file"
    }

    fn played_samples(&self) -> u64 {
        self.played
    }

    fn played_time(&self) -> f64 {
        self.played as f64 / self.sample_rate
    }

    fn get_frame(&mut self, frame: &mut [f32]) -> usize {
        let start = self.overlap.begin_frame(frame, None);
        let new = frame.len() - start;

        // The file end rarely aligns with a frame; read what is left and pad
        // with silence.
        let position = (self.played as usize).min(self.samples.len());
        let from_file = new.min(self.samples.len() - position);
        frame[start..start + from_file]
            .copy_from_slice(&self.samples[position..position + from_file]);
        frame[start + from_file..].fill(0.0);

        self.played += new as u64;

        // Quit once the next frame would contain no file content at all.
        if self.played as usize >= self.samples.len() + start {
            info!("file ended, filling rest of frame with silence...");
            set_quit();
        }

        self.overlap.end_frame(frame);
        new
    }
}

// Decode the first track of a file into a mono f32 buffer.
fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32), AudioFileError> {
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let source = Box::new(File::open(path)?);
    let stream = MediaSourceStream::new(source, Default::default());

    let format_opts = FormatOptions {
        enable_gapless: false,
        ..Default::default()
    };
    let metadata_opts: MetadataOptions = Default::default();

    let probed =
        symphonia::default::get_probe().format(&hint, stream, &format_opts, &metadata_opts)?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioFileError::NoTrack)?;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut rate = 0;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            // The reader signals the end of the stream with an error.
            Err(_) if !samples.is_empty() => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;
        let spec = *decoded.spec();
        if spec.channels.count() != 1 {
            return Err(AudioFileError::NotMono(spec.channels.count()));
        }
        rate = spec.rate;

        let mut converted: AudioBuffer<f32> = AudioBuffer::new(decoded.capacity() as u64, spec);
        converted.render_silence(Some(decoded.frames()));
        match &decoded {
            AudioBufferRef::U8(buf) => buf.convert(&mut converted),
            AudioBufferRef::U16(buf) => buf.convert(&mut converted),
            AudioBufferRef::U24(buf) => buf.convert(&mut converted),
            AudioBufferRef::U32(buf) => buf.convert(&mut converted),
            AudioBufferRef::S8(buf) => buf.convert(&mut converted),
            AudioBufferRef::S16(buf) => buf.convert(&mut converted),
            AudioBufferRef::S24(buf) => buf.convert(&mut converted),
            AudioBufferRef::S32(buf) => buf.convert(&mut converted),
            AudioBufferRef::F32(buf) => buf.convert(&mut converted),
            AudioBufferRef::F64(buf) => buf.convert(&mut converted),
        }
        samples.extend_from_slice(&converted.chan(0)[..decoded.frames()]);
    }

    Ok((samples, rate))
}
