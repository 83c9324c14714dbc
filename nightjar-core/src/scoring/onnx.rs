//! ONNX window classifier.
//!
//! ## Model I/O
//!
//! | Name     | Shape                  | DType | Direction |
//! |----------|------------------------|-------|-----------|
//! | `input`  | `[batch, record_len]`  | f32   | in        |
//! | `output` | `[batch]`, `[batch,1]` | f32   | out       |
//!
//! Two-class models with a `[batch, 2]` output are also accepted; the second
//! column is taken as the call probability. Input and output names are
//! resolved by common aliases, falling back to the first declared tensor.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use ort::session::builder::SessionBuilder;
use ort::session::SessionInputValue;
use ort::value::Value;
use tracing::{debug, info};

use super::Scorer;
use crate::error::{NightjarError, Result};

/// Windows per inference call.
const BATCH_SIZE: usize = 64;

/// Waveform classifier backed by an ONNX Runtime session.
pub struct OnnxScorer {
    session: ort::session::Session,
    input_name: String,
    output_name: String,
    record_length: usize,
}

impl OnnxScorer {
    /// Load the model at `path`. `record_length` is the window length the
    /// model was trained on; it is used for the warm-up batch.
    pub fn new(path: impl AsRef<Path>, record_length: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(NightjarError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }

        let session = SessionBuilder::new()
            .map_err(|e| NightjarError::OnnxSession(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| NightjarError::OnnxSession(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();
        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();

        let input_name = resolve_name(&input_names, &["input", "waveform", "waveforms", "x"])
            .or_else(|| input_names.first().cloned())
            .ok_or_else(|| NightjarError::OnnxSession("classifier model has no inputs".into()))?;
        let output_name = resolve_name(&output_names, &["output", "score", "scores", "prob"])
            .or_else(|| output_names.first().cloned())
            .ok_or_else(|| NightjarError::OnnxSession("classifier model has no outputs".into()))?;

        info!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            record_length,
            "ONNX classifier loaded"
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            record_length,
        })
    }

    /// Default path for a named classifier model file.
    pub fn default_model_path(clip_type: &str) -> PathBuf {
        default_models_dir().join(format!("{}.onnx", clip_type.to_ascii_lowercase()))
    }

    fn run_batch(&mut self, windows: &[&[f32]]) -> Result<Vec<f32>> {
        let batch = windows.len();
        let width = self.record_length.max(windows.first().map_or(0, |w| w.len()));

        let mut flat = Vec::with_capacity(batch * width);
        for window in windows {
            if window.len() != width {
                return Err(NightjarError::Scorer(format!(
                    "window length {} does not match model width {width}",
                    window.len()
                )));
            }
            flat.extend_from_slice(window);
        }

        let input_arr = Array2::<f32>::from_shape_vec((batch, width), flat)
            .map_err(|e| NightjarError::OnnxSession(e.to_string()))?;
        let input_val = Value::from_array(input_arr)
            .map_err(|e: ort::Error| NightjarError::OnnxSession(e.to_string()))?;
        let input_values: Vec<(String, SessionInputValue<'_>)> =
            vec![(self.input_name.clone(), input_val.into())];

        let outputs = self
            .session
            .run(input_values)
            .map_err(|e| NightjarError::OnnxSession(e.to_string()))?;

        let score_output = outputs
            .get(self.output_name.as_str())
            .unwrap_or(&outputs[0]);
        let (_, data) = score_output
            .try_extract_tensor::<f32>()
            .map_err(|e| NightjarError::OnnxSession(e.to_string()))?;

        scores_from_output(data, batch)
    }
}

impl Scorer for OnnxScorer {
    fn warm_up(&mut self) -> Result<()> {
        let silence = vec![0.0f32; self.record_length];
        let scores = self.run_batch(&[silence.as_slice()])?;
        debug!(?scores, "ONNX classifier warm-up batch scored");
        Ok(())
    }

    fn score(&mut self, windows: &[&[f32]]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(windows.len());
        for batch in windows.chunks(BATCH_SIZE) {
            scores.extend(self.run_batch(batch)?);
        }
        Ok(scores)
    }
}

/// Pick one score per window out of a flat output tensor.
fn scores_from_output(data: &[f32], batch: usize) -> Result<Vec<f32>> {
    if data.len() == batch {
        return Ok(data.to_vec());
    }
    if data.len() == batch * 2 {
        return Ok(data.chunks_exact(2).map(|pair| pair[1]).collect());
    }
    Err(NightjarError::Scorer(format!(
        "classifier produced {} values for {batch} windows",
        data.len()
    )))
}

fn resolve_name(candidates: &[String], preferred: &[&str]) -> Option<String> {
    preferred.iter().find_map(|needle| {
        candidates
            .iter()
            .find(|name| name.eq_ignore_ascii_case(needle))
            .cloned()
    })
}

/// Platform data directory holding classifier models.
pub fn default_models_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(|p| PathBuf::from(p).join("Nightjar").join("models"))
            .unwrap_or_else(|| PathBuf::from("models"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("nightjar")
            .join("models")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_column_output_is_taken_as_is() {
        assert_eq!(scores_from_output(&[0.1, 0.9], 2).unwrap(), vec![0.1, 0.9]);
    }

    #[test]
    fn two_class_output_takes_positive_column() {
        let data = [0.8, 0.2, 0.1, 0.9];
        assert_eq!(scores_from_output(&data, 2).unwrap(), vec![0.2, 0.9]);
    }

    #[test]
    fn mismatched_output_is_scorer_error() {
        assert!(matches!(
            scores_from_output(&[0.1, 0.2, 0.3], 2),
            Err(NightjarError::Scorer(_))
        ));
    }

    #[test]
    fn missing_model_is_reported() {
        let err = OnnxScorer::new("/nonexistent/nightjar/tseep.onnx", 3_600)
            .err()
            .expect("missing model must fail");
        assert!(matches!(err, NightjarError::ModelNotFound { .. }));
    }

    #[test]
    fn resolve_name_is_case_insensitive() {
        let names = vec!["Waveform".to_string(), "other".to_string()];
        assert_eq!(
            resolve_name(&names, &["input", "waveform"]),
            Some("Waveform".to_string())
        );
    }
}
