//! Chunk sample-rate conversion.
//!
//! ## Design
//!
//! Recordings arrive at whatever rate the recorder used (22.05, 44.1, 48 kHz
//! …); classifiers are trained at one fixed rate. A `Detector` converts every
//! chunk it processes through a [`Resampler`] when the two rates differ.
//!
//! Chunks are converted independently. [`RubatoResampler`] therefore resets
//! its filter state per call, flushes the filter tail at the end of the
//! chunk and trims the filter delay, so a chunk of `n` samples always maps to
//! `round(n * to / from)` samples aligned with the input.

use rubato::{FastFixedIn, PolynomialDegree, Resampler as _};
use tracing::info;

use crate::error::{NightjarError, Result};

/// Input frames handed to rubato per process call.
const RESAMPLE_BLOCK: usize = 1024;

/// Converts a block of mono samples between two sample rates.
pub trait Resampler: Send {
    /// Resample `samples` from `from_rate` to `to_rate` Hz.
    ///
    /// # Errors
    /// Implementation-specific; the detector treats any error as fatal for
    /// the current `detect` call.
    fn resample(&mut self, samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>>;
}

/// Number of output samples a chunk of `len` input samples converts to.
pub fn resampled_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    let scaled = len as u128 * u128::from(to_rate);
    let rate = u128::from(from_rate);
    ((scaled + rate / 2) / rate) as usize
}

/// Rubato `FastFixedIn` (cubic) resampler.
#[derive(Default)]
pub struct RubatoResampler {
    /// Cached converter for the last `(from, to)` pair seen.
    cached: Option<(u32, u32, FastFixedIn<f32>)>,
}

impl RubatoResampler {
    pub fn new() -> Self {
        Self::default()
    }

    fn converter(&mut self, from_rate: u32, to_rate: u32) -> Result<&mut FastFixedIn<f32>> {
        let reusable = matches!(self.cached, Some((f, t, _)) if f == from_rate && t == to_rate);
        if !reusable {
            let ratio = f64::from(to_rate) / f64::from(from_rate);
            let resampler = FastFixedIn::<f32>::new(
                ratio,
                1.0, // fixed ratio, no dynamic adjustment
                PolynomialDegree::Cubic,
                RESAMPLE_BLOCK,
                1, // mono
            )
            .map_err(|e| NightjarError::Resampler(format!("resampler init: {e}")))?;

            info!(from_rate, to_rate, "resampling enabled");
            self.cached = Some((from_rate, to_rate, resampler));
        }

        match self.cached.as_mut() {
            Some((_, _, resampler)) => Ok(resampler),
            None => Err(NightjarError::Resampler("resampler unavailable".into())),
        }
    }
}

impl Resampler for RubatoResampler {
    fn resample(&mut self, samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
        if from_rate == 0 || to_rate == 0 {
            return Err(NightjarError::Resampler(format!(
                "cannot resample from {from_rate} Hz to {to_rate} Hz"
            )));
        }
        if from_rate == to_rate || samples.is_empty() {
            return Ok(samples.to_vec());
        }

        let expected = resampled_len(samples.len(), from_rate, to_rate);
        let resampler = self.converter(from_rate, to_rate)?;
        resampler.reset();

        let delay = resampler.output_delay();
        let mut output_buf = vec![vec![0f32; resampler.output_frames_max()]; 1];
        let mut result = Vec::with_capacity(expected + delay + output_buf[0].len());
        let process_err = |e: rubato::ResampleError| NightjarError::Resampler(e.to_string());

        let mut pos = 0;
        while samples.len() - pos >= RESAMPLE_BLOCK {
            let block = &samples[pos..pos + RESAMPLE_BLOCK];
            let (_consumed, produced) = resampler
                .process_into_buffer(&[block], &mut output_buf, None)
                .map_err(process_err)?;
            result.extend_from_slice(&output_buf[0][..produced]);
            pos += RESAMPLE_BLOCK;
        }

        if pos < samples.len() {
            let tail: &[&[f32]] = &[&samples[pos..]];
            let (_consumed, produced) = resampler
                .process_partial_into_buffer(Some(tail), &mut output_buf, None)
                .map_err(process_err)?;
            result.extend_from_slice(&output_buf[0][..produced]);
        }

        // Flush the filter tail with silence until the delayed output is complete.
        while result.len() < expected + delay {
            let (_consumed, produced) = resampler
                .process_partial_into_buffer(None::<&[&[f32]]>, &mut output_buf, None)
                .map_err(process_err)?;
            if produced == 0 {
                break;
            }
            result.extend_from_slice(&output_buf[0][..produced]);
        }

        result.drain(..delay.min(result.len()));
        result.resize(expected, 0.0);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn passthrough_identity() {
        let mut rs = RubatoResampler::new();
        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        let out = rs.resample(&samples, 16_000, 16_000).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn ratio_48k_to_16k_exact_length() {
        let mut rs = RubatoResampler::new();
        let out = rs.resample(&vec![0.0f32; 960], 48_000, 16_000).unwrap();
        assert_eq!(out.len(), 320);
    }

    #[test]
    fn odd_lengths_round_to_nearest() {
        assert_eq!(resampled_len(1_000, 22_050, 24_000), 1_088);
        let mut rs = RubatoResampler::new();
        let out = rs.resample(&vec![0.1f32; 1_000], 22_050, 24_000).unwrap();
        assert_eq!(out.len(), 1_088);
    }

    #[test]
    fn upsampled_sine_keeps_amplitude() {
        let mut rs = RubatoResampler::new();
        let input = sine(440.0, 22_050, 8_000);
        let out = rs.resample(&input, 22_050, 24_000).unwrap();

        let peak_in = input.iter().fold(0f32, |m, s| m.max(s.abs()));
        // Ignore the edges, where the filter sees implicit silence.
        let body = &out[200..out.len() - 200];
        let peak_out = body.iter().fold(0f32, |m, s| m.max(s.abs()));
        assert_abs_diff_eq!(peak_out, peak_in, epsilon = 0.05);
    }

    #[test]
    fn repeated_calls_are_independent() {
        let mut rs = RubatoResampler::new();
        let input = sine(1_000.0, 48_000, 4_800);
        let first = rs.resample(&input, 48_000, 24_000).unwrap();
        let second = rs.resample(&input, 48_000, 24_000).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_rate_is_an_error() {
        let mut rs = RubatoResampler::new();
        assert!(matches!(
            rs.resample(&[0.0; 4], 0, 16_000),
            Err(NightjarError::Resampler(_))
        ));
    }
}
