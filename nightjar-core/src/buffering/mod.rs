//! Sample buffering.
//!
//! Two buffers live here:
//!
//! - [`SampleBuffer`]: the unbounded FIFO a `Detector` accumulates input in
//!   between `detect` calls. It is the only detector state that survives from
//!   one call to the next.
//! - The lock-free SPSC ring used by live capture, backed by
//!   `ringbuf::HeapRb<f32>` whose `push_slice` is wait-free and safe to call
//!   from the real-time audio callback.

pub mod chunk;

use std::collections::VecDeque;

use ringbuf::{traits::Split, HeapRb};

use crate::error::{NightjarError, Result};

pub use ringbuf::traits::{Consumer, Producer};

/// Type alias for the producer half, held by the audio callback thread.
pub type AudioProducer = ringbuf::HeapProd<f32>;

/// Type alias for the consumer half, held by the pipeline thread.
pub type AudioConsumer = ringbuf::HeapCons<f32>;

/// Ring capacity: 2^22 = 4 194 304 f32 samples ≈ 87.4 s at 48 kHz.
/// Scoring a detector chunk can take a while; the ring absorbs capture
/// meanwhile.
pub const RING_CAPACITY: usize = 1 << 22;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_audio_ring() -> (AudioProducer, AudioConsumer) {
    HeapRb::<f32>::new(RING_CAPACITY).split()
}

/// Growable FIFO of mono samples.
///
/// Writes append to the tail in arrival order; reads remove from the head.
/// No internal synchronisation: the owning detector serialises access.
#[derive(Debug, Default, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<f32>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `samples` to the tail of the buffer.
    pub fn write(&mut self, samples: &[f32]) {
        self.samples.extend(samples.iter().copied());
    }

    /// Remove and return the first `n` buffered samples.
    ///
    /// # Errors
    /// `NightjarError::InsufficientData` if fewer than `n` samples are buffered.
    /// The buffer is left untouched in that case.
    pub fn read(&mut self, n: usize) -> Result<Vec<f32>> {
        if n > self.samples.len() {
            return Err(NightjarError::InsufficientData {
                requested: n,
                available: self.samples.len(),
            });
        }
        Ok(self.samples.drain(..n).collect())
    }

    /// Remove and return everything currently buffered.
    pub fn read_all(&mut self) -> Vec<f32> {
        self.samples.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
