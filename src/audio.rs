//! Audio device plumbing.
//!
//! The OS audio threads interact with the core thread only through SPSC ring
//! buffers: the output callback drains a queue the program loop fills, the
//! input callback fills a queue an [`crate::audio_in::AudioIn`] source
//! drains. Streams run mono f32 at the engine sample rate with a small
//! device buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::warn;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::config;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio backend error: {0}")]
    Backend(String),
    #[error("audio device '{0}' not found")]
    NoDevice(String),
    #[error("failed to queue audio for playback; the output queue is full")]
    QueueFull,
}

fn backend<E: std::fmt::Display>(e: E) -> AudioError {
    AudioError::Backend(e.to_string())
}

/// Print the audio driver and device names to standard output.
pub fn print_devices() -> Result<(), AudioError> {
    let host = cpal::default_host();
    println!("Audio driver: {}", host.id().name());

    println!("Playback devices:");
    for device in host.output_devices().map_err(backend)? {
        println!("  - {}", device.name().map_err(backend)?);
    }

    println!("Recording devices:");
    for device in host.input_devices().map_err(backend)? {
        println!("  - {}", device.name().map_err(backend)?);
    }

    Ok(())
}

fn stream_config(sample_rate: u32, channels: u16) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Fixed(config::SAMPLES_PER_BUFFER),
    }
}

fn find_output_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::NoDevice("default output".to_string())),
        Some(name) => host
            .output_devices()
            .map_err(backend)?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::NoDevice(name.to_string())),
    }
}

fn find_input_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| AudioError::NoDevice("default input".to_string())),
        Some(name) => host
            .input_devices()
            .map_err(backend)?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::NoDevice(name.to_string())),
    }
}

/// An open output stream fed through a ring buffer.
pub struct AudioOutput {
    _stream: cpal::Stream,
    producer: HeapProd<f32>,
    flush: Arc<AtomicBool>,
    channels: usize,
}

impl AudioOutput {
    /// Open the named (or default) output device and start the stream.
    /// `capacity` is the depth of the queue in samples.
    pub fn open(
        device_name: Option<&str>,
        sample_rate: u32,
        channels: u16,
        capacity: usize,
    ) -> Result<AudioOutput, AudioError> {
        let device = find_output_device(device_name)?;
        let (producer, mut consumer) = HeapRb::<f32>::new(capacity).split();
        let flush = Arc::new(AtomicBool::new(false));
        let callback_flush = Arc::clone(&flush);

        let stream = device
            .build_output_stream(
                &stream_config(sample_rate, channels),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if callback_flush.swap(false, Ordering::Relaxed) {
                        consumer.clear();
                    }
                    let n = consumer.pop_slice(data);
                    data[n..].fill(0.0);
                },
                |err| warn!("audio output stream error: {}", err),
                None,
            )
            .map_err(backend)?;
        stream.play().map_err(backend)?;

        Ok(AudioOutput {
            _stream: stream,
            producer,
            flush,
            channels: channels as usize,
        })
    }

    /// Enqueue samples for playback.
    pub fn queue(&mut self, samples: &[f32]) -> Result<(), AudioError> {
        let pushed = self.producer.push_slice(samples);
        if pushed < samples.len() {
            return Err(AudioError::QueueFull);
        }
        Ok(())
    }

    /// Samples currently queued and not yet consumed by the device.
    pub fn queued_samples(&self) -> usize {
        self.producer.occupied_len()
    }

    /// Ask the audio callback to drop everything queued.
    pub fn clear(&mut self) {
        self.flush.store(true, Ordering::Relaxed);
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

/// An open input stream filling a ring buffer.
pub struct AudioInput {
    _stream: cpal::Stream,
}

impl AudioInput {
    /// Open the named (or default) input device, start the stream and return
    /// the consuming end of its sample queue.
    pub fn open(
        device_name: Option<&str>,
        sample_rate: u32,
        capacity: usize,
    ) -> Result<(AudioInput, HeapCons<f32>), AudioError> {
        let device = find_input_device(device_name)?;
        let (mut producer, consumer) = HeapRb::<f32>::new(capacity).split();

        let stream = device
            .build_input_stream(
                &stream_config(sample_rate, 1),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // On input overrun the tail is dropped; the device thread
                    // must never block.
                    let _ = producer.push_slice(data);
                },
                |err| warn!("audio input stream error: {}", err),
                None,
            )
            .map_err(backend)?;
        stream.play().map_err(backend)?;

        Ok((AudioInput { _stream: stream }, consumer))
    }
}
