//! Peak → clip boundary arithmetic.
//!
//! A peak is a window index within one chunk. Its clip is computed in the
//! input sample-rate domain:
//!
//! ```text
//! window_offset = peak_index * hop_length                (classifier samples)
//! input_offset  = round_half_even(window_offset / classifier_rate * input_rate)
//! clip_start    = chunk_start + input_offset + clip_start_offset
//! clip_end      = clip_start + clip_length
//! ```
//!
//! A clip is only emitted when `0 <= clip_start` and `clip_end <= chunk_end`.
//! Anything past the end of the current chunk may lie past the end of the
//! stream, which is not known until `complete_detection`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An accepted detection, in input-rate samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub start_index: u64,
    pub length: u64,
    pub threshold: f32,
}

impl Clip {
    /// Absolute index one past the last clip sample.
    pub fn end_index(&self) -> u64 {
        self.start_index + self.length
    }
}

/// Why a peak did not become a clip. Expected near stream and chunk edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoundaryRejection {
    #[error("clip would start at {clip_start}, before the beginning of the stream")]
    BeforeStreamStart { clip_start: i64 },

    #[error("clip would end at {clip_end}, past the end of the current chunk at {chunk_end}")]
    PastChunkEnd { clip_end: i64, chunk_end: i64 },
}

/// Converts peak window indices to validated clips.
#[derive(Debug, Clone)]
pub struct ClipResolver {
    hop_length: u64,
    input_sample_rate: u64,
    classifier_sample_rate: u64,
    /// Signed offset from the detected window start, input samples.
    clip_start_offset: i64,
    /// Clip length, input samples.
    clip_length: u64,
}

impl ClipResolver {
    pub fn new(
        hop_length: usize,
        input_sample_rate: u32,
        classifier_sample_rate: u32,
        clip_start_offset: i64,
        clip_length: u64,
    ) -> Self {
        Self {
            hop_length: hop_length as u64,
            input_sample_rate: u64::from(input_sample_rate),
            classifier_sample_rate: u64::from(classifier_sample_rate),
            clip_start_offset,
            clip_length,
        }
    }

    pub fn clip_length(&self) -> u64 {
        self.clip_length
    }

    /// Input-rate offset of window `peak_index` from the start of its chunk.
    ///
    /// The window start is taken to seconds at the classifier rate, then to
    /// input samples, rounding halves to even.
    pub fn window_input_offset(&self, peak_index: usize) -> u64 {
        let classifier_offset = peak_index as u64 * self.hop_length;
        if self.input_sample_rate == self.classifier_sample_rate {
            return classifier_offset;
        }
        let secs = classifier_offset as f64 / self.classifier_sample_rate as f64;
        (secs * self.input_sample_rate as f64).round_ties_even() as u64
    }

    /// Resolve the clip for `peak_index` in the chunk spanning
    /// `[chunk_start, chunk_start + chunk_length)` input samples.
    pub fn resolve(
        &self,
        peak_index: usize,
        threshold: f32,
        chunk_start: u64,
        chunk_length: usize,
    ) -> Result<Clip, BoundaryRejection> {
        let window_start = (chunk_start + self.window_input_offset(peak_index)) as i64;
        let clip_start = window_start + self.clip_start_offset;
        let clip_end = clip_start + self.clip_length as i64;
        let chunk_end = (chunk_start + chunk_length as u64) as i64;

        if clip_start < 0 {
            return Err(BoundaryRejection::BeforeStreamStart { clip_start });
        }
        if clip_end > chunk_end {
            return Err(BoundaryRejection::PastChunkEnd {
                clip_end,
                chunk_end,
            });
        }

        Ok(Clip {
            start_index: clip_start as u64,
            length: self.clip_length,
            threshold,
        })
    }
}
