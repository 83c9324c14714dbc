//! CLI settings (optional JSON file, camelCase, missing fields default).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use nightjar_core::{ClassifierSettings, DetectorSettings};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct CliSettings {
    /// Built-in preset the `detector` section starts from.
    pub preset: String,
    pub detector: Option<DetectorSettings>,
    pub classifier: ClassifierSettings,
    pub preferred_input_device: Option<String>,
    /// ONNX classifier; `None` scores with the energy scorer.
    pub model_path: Option<PathBuf>,
    /// RMS level the energy scorer maps to 1.0.
    pub energy_reference_level: f32,
    /// Scale applied to scores in the detection score file.
    pub score_scale_factor: f32,
    pub score_start_offset_secs: f64,
    pub score_duration_secs: Option<f64>,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            preset: "tseep".into(),
            detector: None,
            classifier: ClassifierSettings::default(),
            preferred_input_device: None,
            model_path: None,
            energy_reference_level: 0.1,
            score_scale_factor: 10_000.0,
            score_start_offset_secs: 0.0,
            score_duration_secs: None,
        }
    }
}

impl CliSettings {
    pub fn normalize(&mut self) {
        self.preset = normalize_preset(&self.preset);
        if let Some(detector) = self.detector.as_mut() {
            detector.hop_percent = detector.hop_percent.clamp(1.0, 100.0);
            detector.input_chunk_secs = detector.input_chunk_secs.clamp(1.0, 86_400.0);
            detector.initial_clip_padding_secs = detector.initial_clip_padding_secs.max(0.0);
            detector.min_separation_secs = detector.min_separation_secs.filter(|s| *s > 0.0);
        }
        self.energy_reference_level = self.energy_reference_level.clamp(1e-4, 1.0);
        self.score_scale_factor = self.score_scale_factor.clamp(1.0, 32_767.0);
        self.score_start_offset_secs = self.score_start_offset_secs.max(0.0);
        self.score_duration_secs = self.score_duration_secs.filter(|d| *d > 0.0);
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    /// Detector settings: the file's `detector` section, else the preset.
    pub fn detector_settings(&self) -> DetectorSettings {
        self.detector
            .clone()
            .or_else(|| DetectorSettings::preset(&self.preset))
            .unwrap_or_default()
    }
}

pub fn normalize_preset(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "thrush" => "thrush".into(),
        _ => "tseep".into(),
    }
}

/// Load settings from `path`, or defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<CliSettings> {
    let mut settings = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading settings file {}", path.display()))?;
            serde_json::from_str::<CliSettings>(&raw)
                .with_context(|| format!("parsing settings file {}", path.display()))?
        }
        None => CliSettings::default(),
    };
    settings.normalize();
    Ok(settings)
}
