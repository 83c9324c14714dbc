//! Streaming clip detection for one audio channel.
//!
//! ## Per-chunk stages
//!
//! ```text
//! 1. SampleBuffer::read(chunk_length)        (input rate)
//! 2. Resampler::resample                     (only if rates differ)
//! 3. windowing::slice → one Scorer batch     (classifier rate)
//! 4. for each threshold, ascending:
//!      find_peaks → ClipResolver::resolve → ClipListener::process_clip
//! 5. chunk_start_index += chunk length
//! ```
//!
//! Chunks are cut from the buffered stream, never from the `detect` call
//! arguments, so the emitted clips do not depend on how the caller fragments
//! its input.
//!
//! ## Lifecycle
//!
//! ```text
//! Detector::new()      → Detecting
//!     detect()*        → Detecting
//!     complete_detection()
//!                      → Completed   (listener.complete_processing() called once)
//! any scoring/resampling failure
//!                      → Failed      (the stream is compromised)
//! ```
//!
//! `detect` and `complete_detection` return `InvalidState` outside
//! `Detecting`.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::audio::resample::{Resampler, RubatoResampler};
use crate::buffering::{chunk::AudioChunk, SampleBuffer};
use crate::detection::clip::ClipResolver;
use crate::detection::listener::ClipListener;
use crate::detection::peaks::find_peaks;
use crate::detection::score_file::DetectionScoreWriter;
use crate::detection::settings::DetectorConfig;
use crate::error::{NightjarError, Result};
use crate::scoring::ScorerHandle;
use crate::windowing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Accepting samples.
    Detecting,
    /// `complete_detection` has run.
    Completed,
    /// A collaborator failed mid-stream.
    Failed,
}

/// Counters describing one detection session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorDiagnostics {
    pub samples_in: u64,
    pub chunks_processed: u64,
    pub windows_scored: u64,
    pub peaks_found: u64,
    pub clips_emitted: u64,
    pub clips_rejected: u64,
}

/// Streaming clip detector for a single channel.
pub struct Detector<L: ClipListener> {
    config: DetectorConfig,
    thresholds: Vec<f32>,
    min_separation_windows: Option<f64>,
    resolver: ClipResolver,
    scorer: ScorerHandle,
    resampler: Box<dyn Resampler>,
    listener: L,
    buffer: SampleBuffer,
    /// Absolute input-rate index of the next chunk's first sample.
    chunk_start_index: u64,
    state: DetectorState,
    score_writer: Option<DetectionScoreWriter>,
    diagnostics: DetectorDiagnostics,
}

impl<L: ClipListener> Detector<L> {
    /// Create a detector. Resampling, when needed, uses [`RubatoResampler`].
    ///
    /// # Errors
    /// `NightjarError::Configuration` if `config` is invalid.
    pub fn new(config: DetectorConfig, scorer: ScorerHandle, listener: L) -> Result<Self> {
        config.validate()?;

        let thresholds = config.sorted_thresholds();
        let min_separation_windows = config.min_separation_windows();
        let resolver = ClipResolver::new(
            config.hop_length,
            config.input_sample_rate,
            config.classifier_sample_rate,
            config.clip_start_offset(),
            config.clip_length(),
        );

        info!(
            input_rate = config.input_sample_rate,
            classifier_rate = config.classifier_sample_rate,
            chunk_length = config.chunk_length,
            record_length = config.record_length,
            hop_length = config.hop_length,
            thresholds = ?thresholds,
            min_separation_windows = ?min_separation_windows,
            clip_length = resolver.clip_length(),
            "detector created"
        );

        Ok(Self {
            config,
            thresholds,
            min_separation_windows,
            resolver,
            scorer,
            resampler: Box::new(RubatoResampler::new()),
            listener,
            buffer: SampleBuffer::new(),
            chunk_start_index: 0,
            state: DetectorState::Detecting,
            score_writer: None,
            diagnostics: DetectorDiagnostics::default(),
        })
    }

    /// Replace the default resampler.
    pub fn with_resampler(mut self, resampler: impl Resampler + 'static) -> Self {
        self.resampler = Box::new(resampler);
        self
    }

    /// Write input and scores of every processed chunk to `writer`.
    pub fn with_score_output(mut self, writer: DetectionScoreWriter) -> Self {
        self.score_writer = Some(writer);
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Thresholds in emission order (deduplicated, ascending).
    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn diagnostics(&self) -> DetectorDiagnostics {
        self.diagnostics
    }

    /// Absolute input-rate index at which the next chunk will start.
    pub fn chunk_start_index(&self) -> u64 {
        self.chunk_start_index
    }

    /// Samples received but not yet processed.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed the next run of input samples.
    ///
    /// Processes as many whole chunks as are buffered. Blocks for the
    /// duration of their scoring.
    ///
    /// # Errors
    /// - `NightjarError::InvalidState` after completion or failure.
    /// - Resampler or scorer errors; the detector is then `Failed`.
    pub fn detect(&mut self, samples: &[f32]) -> Result<()> {
        self.ensure_detecting("detect")?;

        self.diagnostics.samples_in += samples.len() as u64;
        self.buffer.write(samples);

        while self.buffer.len() >= self.config.chunk_length {
            let chunk = self.buffer.read(self.config.chunk_length)?;
            self.process_chunk_or_fail(chunk)?;
        }
        Ok(())
    }

    /// Process any remaining samples as a final chunk and notify the listener.
    ///
    /// # Errors
    /// - `NightjarError::InvalidState` if called twice or after a failure.
    /// - Resampler or scorer errors from the final chunk; the listener's
    ///   completion hook is not called in that case.
    pub fn complete_detection(&mut self) -> Result<()> {
        self.ensure_detecting("complete_detection")?;

        let remainder = self.buffer.read_all();
        if !remainder.is_empty() {
            self.process_chunk_or_fail(remainder)?;
        }

        self.state = DetectorState::Completed;
        self.listener.complete_processing();

        if let Some(writer) = self.score_writer.take() {
            if let Err(e) = writer.finalize() {
                error!(error = %e, "failed to finalize detection score file");
            }
        }

        let d = self.diagnostics;
        info!(
            samples_in = d.samples_in,
            chunks_processed = d.chunks_processed,
            windows_scored = d.windows_scored,
            peaks_found = d.peaks_found,
            clips_emitted = d.clips_emitted,
            clips_rejected = d.clips_rejected,
            "detection complete"
        );
        Ok(())
    }

    fn ensure_detecting(&self, operation: &str) -> Result<()> {
        match self.state {
            DetectorState::Detecting => Ok(()),
            DetectorState::Completed => Err(NightjarError::InvalidState(format!(
                "{operation} called after complete_detection"
            ))),
            DetectorState::Failed => Err(NightjarError::InvalidState(format!(
                "{operation} called after a detection failure"
            ))),
        }
    }

    fn process_chunk_or_fail(&mut self, samples: Vec<f32>) -> Result<()> {
        let chunk_start = self.chunk_start_index;
        self.process_chunk(samples).map_err(|e| {
            error!(chunk_start, error = %e, "chunk processing failed");
            self.state = DetectorState::Failed;
            e
        })
    }

    fn process_chunk(&mut self, samples: Vec<f32>) -> Result<()> {
        let mut chunk = AudioChunk::new(samples, self.config.input_sample_rate, self.chunk_start_index);

        if self.config.classifier_sample_rate != self.config.input_sample_rate {
            chunk.samples = self.resampler.resample(
                &chunk.samples,
                self.config.input_sample_rate,
                self.config.classifier_sample_rate,
            )?;
            chunk.sample_rate = self.config.classifier_sample_rate;
        }

        let windows = windowing::slice(&chunk.samples, self.config.record_length, self.config.hop_length)?;
        let num_windows = windows.len();

        let scores = if num_windows == 0 {
            Vec::new()
        } else {
            let batch: Vec<&[f32]> = windows.collect();
            self.scorer.score(&batch)?
        };

        if scores.len() != num_windows {
            return Err(NightjarError::Scorer(format!(
                "scorer returned {} scores for {num_windows} windows",
                scores.len()
            )));
        }

        debug!(
            chunk_start = chunk.start_index,
            input_samples = chunk.input_length,
            scored_samples = chunk.samples.len(),
            windows = num_windows,
            "chunk scored"
        );

        if let Some(writer) = self.score_writer.as_mut() {
            if let Err(e) = writer.write(&chunk.samples, &scores) {
                error!(error = %e, "detection score output failed, disabling it");
                self.score_writer = None;
            }
        }

        for &threshold in &self.thresholds {
            let peaks = find_peaks(&scores, threshold, self.min_separation_windows);
            self.diagnostics.peaks_found += peaks.len() as u64;

            for peak in peaks {
                match self
                    .resolver
                    .resolve(peak, threshold, chunk.start_index, chunk.input_length)
                {
                    Ok(clip) => {
                        self.diagnostics.clips_emitted += 1;
                        self.listener
                            .process_clip(clip.start_index, clip.length, clip.threshold);
                    }
                    Err(rejection) => {
                        self.diagnostics.clips_rejected += 1;
                        warn!(
                            peak,
                            threshold,
                            chunk_start = chunk.start_index,
                            "rejected clip: {rejection}"
                        );
                    }
                }
            }
        }

        self.diagnostics.chunks_processed += 1;
        self.diagnostics.windows_scored += num_windows as u64;
        self.chunk_start_index = chunk.end_index();
        Ok(())
    }
}

impl<L: ClipListener> std::fmt::Debug for Detector<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("chunk_start_index", &self.chunk_start_index)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
