//! Window scoring abstraction.
//!
//! The `Scorer` trait decouples the detector from any specific classifier
//! (energy heuristic, ONNX network, test doubles). A scorer maps a batch of
//! equal-length windows to one score per window, in order.
//!
//! `&mut self` on `score` lets backends keep session state and scratch
//! buffers. Sharing one loaded model across detectors goes through
//! `ScorerHandle`'s `parking_lot::Mutex`, which serialises scoring calls.

pub mod energy;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxScorer;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// Contract for window classifiers.
pub trait Scorer: Send + 'static {
    /// One-time warm-up: load weights, run a dummy batch. Called once before
    /// the first detector starts. The default does nothing.
    ///
    /// # Errors
    /// Returns an error if model files are missing or corrupt.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Score a batch of windows.
    ///
    /// Every window has the detector's record length. The result must hold
    /// exactly one score per window, in the same order. Scores are nominally
    /// in [0, 1] but need not be bounded.
    fn score(&mut self, windows: &[&[f32]]) -> Result<Vec<f32>>;
}

/// Thread-safe reference-counted handle to any `Scorer` implementor.
///
/// Uses `parking_lot::Mutex` so a panicking scorer does not poison the
/// handle for the other detectors sharing it.
#[derive(Clone)]
pub struct ScorerHandle(pub Arc<Mutex<dyn Scorer>>);

impl ScorerHandle {
    /// Wrap any `Scorer` in a `ScorerHandle`.
    pub fn new<S: Scorer>(scorer: S) -> Self {
        Self(Arc::new(Mutex::new(scorer)))
    }

    pub fn warm_up(&self) -> Result<()> {
        self.0.lock().warm_up()
    }

    pub fn score(&self, windows: &[&[f32]]) -> Result<Vec<f32>> {
        self.0.lock().score(windows)
    }
}

impl std::fmt::Debug for ScorerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScorerHandle").finish_non_exhaustive()
    }
}
