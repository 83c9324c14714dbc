//! Typed audio chunk handed from the sample buffer to the resampler and windower.

/// A contiguous block of mono samples at a known sample rate, anchored at an
/// absolute position in the input stream.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples, nominally in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Absolute index of the first sample, counted in the *input* sample-rate
    /// domain (unchanged by resampling).
    pub start_index: u64,
    /// Number of input-rate samples this chunk covers. Equals
    /// `samples.len()` until the chunk is resampled.
    pub input_length: usize,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32, start_index: u64) -> Self {
        let input_length = samples.len();
        Self {
            samples,
            sample_rate,
            start_index,
            input_length,
        }
    }

    /// Absolute input-rate index one past the last sample of this chunk.
    pub fn end_index(&self) -> u64 {
        self.start_index + self.input_length as u64
    }
}
