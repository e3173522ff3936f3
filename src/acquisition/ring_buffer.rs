// src/acquisition/ring_buffer.rs
//! Bounded, lock-protected circular sample buffer
//!
//! The acquisition thread pushes, the caller's thread drains or peeks. The
//! lock is held only while samples are moved or copied, never across I/O.

use crate::config::constants::buffer::MAX_CAPTURE_SAMPLES;
use crate::error::{BoardError, BoardResult};
use crate::hal::types::Sample;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Fixed-capacity FIFO that overwrites its oldest sample when full
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Mutex<VecDeque<Sample>>,
    capacity: usize,
    channel_count: usize,
}

impl SampleBuffer {
    /// Create a buffer for `capacity` samples of `channel_count` channels.
    /// Capacity must be in `1..=MAX_CAPTURE_SAMPLES`.
    pub fn new(capacity: usize, channel_count: usize) -> BoardResult<Self> {
        if capacity == 0 || capacity > MAX_CAPTURE_SAMPLES {
            return Err(BoardError::invalid(format!(
                "buffer capacity {} outside 1..={}",
                capacity, MAX_CAPTURE_SAMPLES
            )));
        }
        Ok(Self {
            // grows on demand up to `capacity`
            samples: Mutex::new(VecDeque::new()),
            capacity,
            channel_count,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Insert without blocking. Returns `true` when the oldest sample was
    /// evicted to make room.
    pub fn push(&self, sample: Sample) -> bool {
        let mut samples = self.samples.lock();
        let evicted = if samples.len() == self.capacity {
            samples.pop_front();
            true
        } else {
            false
        };
        samples.push_back(sample);
        evicted
    }

    /// Number of samples currently stored
    pub fn data_count(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_count() == 0
    }

    /// Remove and return up to `n` oldest samples, oldest first
    pub fn drain(&self, n: usize) -> Vec<Sample> {
        let mut samples = self.samples.lock();
        let take = n.min(samples.len());
        samples.drain(..take).collect()
    }

    /// Copy up to `n` newest samples, oldest first, leaving the buffer intact
    pub fn peek(&self, n: usize) -> Vec<Sample> {
        let samples = self.samples.lock();
        let take = n.min(samples.len());
        samples.range(samples.len() - take..).cloned().collect()
    }
}
