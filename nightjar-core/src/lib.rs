//! # nightjar-core
//!
//! Streaming detection of short acoustic events (nocturnal flight calls) in
//! long audio recordings or live input.
//!
//! ## Architecture
//!
//! ```text
//! samples ─► Detector::detect ─► SampleBuffer ─► chunk ─► Resampler
//!                                                            │
//!                                              windowing::slice
//!                                                            │
//!                                                  Scorer (one batch)
//!                                                            │
//!                                    find_peaks (per threshold, ascending)
//!                                                            │
//!                                 ClipResolver ─► ClipListener::process_clip
//! ```
//!
//! For live input, `LiveEngine` feeds the detector from the SPSC ring that
//! the cpal callback fills.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod detection;
pub mod engine;
pub mod error;
pub mod events;
pub mod scoring;
pub mod windowing;

// Convenience re-exports for downstream crates
pub use detection::{
    ChannelListener, ClassifierSettings, Clip, ClipCollector, ClipListener, DetectionScoreWriter,
    Detector, DetectorConfig, DetectorDiagnostics, DetectorSettings,
};
pub use engine::{EngineConfig, LiveEngine};
pub use error::{NightjarError, Result};
pub use events::{ClipEvent, DetectionEvent, EngineStatus, EngineStatusEvent};
pub use scoring::{energy::EnergyScorer, Scorer, ScorerHandle};

#[cfg(feature = "onnx")]
pub use scoring::OnnxScorer;
