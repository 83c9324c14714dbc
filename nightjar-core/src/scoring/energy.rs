//! Energy-based window scorer.
//!
//! ## Algorithm
//!
//! 1. Compute the RMS of the window.
//! 2. Divide by `reference_level`, the RMS regarded as a certain call.
//! 3. Clamp to [0, 1].
//!
//! Crude, but it needs no model file, which makes it the fallback scorer for
//! the CLI and a realistic scorer for tests.

use super::Scorer;
use crate::error::Result;

/// Scores windows by RMS level relative to a reference.
#[derive(Debug, Clone)]
pub struct EnergyScorer {
    /// RMS level that maps to a score of 1.0.
    /// Typical range: 0.05–0.3 for normalised recordings.
    reference_level: f32,
}

impl EnergyScorer {
    /// Create a new `EnergyScorer`.
    ///
    /// Non-positive or non-finite levels fall back to the default of `0.1`.
    pub fn new(reference_level: f32) -> Self {
        let reference_level = if reference_level.is_finite() && reference_level > 0.0 {
            reference_level
        } else {
            0.1
        };
        Self { reference_level }
    }

    /// Compute the root-mean-square of a sample slice.
    fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }
}

impl Default for EnergyScorer {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl Scorer for EnergyScorer {
    fn score(&mut self, windows: &[&[f32]]) -> Result<Vec<f32>> {
        Ok(windows
            .iter()
            .map(|w| (Self::rms(w) / self.reference_level).clamp(0.0, 1.0))
            .collect())
    }
}
