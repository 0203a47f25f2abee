//! Recording-device sample source.

use std::time::Duration;

use ringbuf::traits::{Consumer, Observer};
use ringbuf::HeapCons;

use crate::quit::poll_quit;
use crate::source::{Overlap, OverlapPolicy, SampleSource};

/// Dequeues samples written by the audio input callback.
///
/// Getting a frame may suspend the calling thread until enough samples have
/// arrived; the wait is a bounded loop that polls the quit flag between
/// dequeue attempts so shutdown is never delayed.
pub struct AudioIn {
    sample_rate: f64,
    consumer: HeapCons<f32>,
    played: u64,
    overlap: Overlap,
}

impl AudioIn {
    pub fn new(
        consumer: HeapCons<f32>,
        sample_rate: u32,
        frame_size: usize,
        policy: OverlapPolicy,
    ) -> AudioIn {
        AudioIn {
            sample_rate: sample_rate as f64,
            consumer,
            played: 0,
            overlap: Overlap::new(policy, frame_size),
        }
    }
}

impl SampleSource for AudioIn {
    fn name(&self) -> &'static str {
        "audio in"
    }

    fn is_blocking(&self) -> bool {
        true
    }

    fn available_samples(&self) -> Option<usize> {
        Some(self.consumer.occupied_len())
    }

    fn played_samples(&self) -> u64 {
        self.played
    }

    fn played_time(&self) -> f64 {
        self.played as f64 / self.sample_rate
    }

    fn get_frame(&mut self, frame: &mut [f32]) -> usize {
        let start = self.overlap.begin_frame(frame, self.available_samples());
        let new = frame.len() - start;

        let mut read = 0;
        while read < new {
            read += self.consumer.pop_slice(&mut frame[start + read..]);
            if read < new {
                if poll_quit() {
                    // Shutting down; deliver silence for the missing tail.
                    frame[start + read..].fill(0.0);
                    break;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }

        self.played += new as u64;
        self.overlap.end_frame(frame);
        new
    }
}
