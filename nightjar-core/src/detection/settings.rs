//! Detector configuration.
//!
//! Two layers:
//!
//! - [`DetectorConfig`]: what a `Detector` runs on. Lengths are in samples,
//!   durations in seconds, validated once at construction.
//! - [`DetectorSettings`] + [`ClassifierSettings`]: the seconds/percent shape
//!   users edit and presets are written in. `DetectorSettings::to_config`
//!   derives a `DetectorConfig` for a concrete input sample rate.

use serde::{Deserialize, Serialize};

use crate::error::{NightjarError, Result};
use crate::windowing;

/// Sample-domain configuration of one detector instance.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Sample rate of the samples passed to `detect` (Hz).
    pub input_sample_rate: u32,
    /// Sample rate the scorer expects (Hz).
    pub classifier_sample_rate: u32,
    /// Input samples processed together as one chunk.
    pub chunk_length: usize,
    /// Analysis window length, classifier samples.
    pub record_length: usize,
    /// Stride between window starts, classifier samples.
    pub hop_length: usize,
    /// Detection thresholds. Deduplicated and sorted by the detector.
    pub thresholds: Vec<f32>,
    /// Minimum time between two clips of the same threshold.
    pub min_separation_secs: Option<f64>,
    /// Offset of the clip start from the detected window start. Negative
    /// values pad the clip before the window.
    pub clip_start_offset_secs: f64,
    /// Clip duration.
    pub clip_duration_secs: f64,
}

impl DetectorConfig {
    /// Check every parameter. Called by `Detector::new`.
    ///
    /// # Errors
    /// `NightjarError::Configuration` naming the first offending parameter.
    pub fn validate(&self) -> Result<()> {
        if self.input_sample_rate == 0 {
            return Err(config_error("input sample rate must be positive"));
        }
        if self.classifier_sample_rate == 0 {
            return Err(config_error("classifier sample rate must be positive"));
        }
        if self.chunk_length == 0 {
            return Err(config_error("chunk length must be positive"));
        }
        windowing::validate(self.record_length, self.hop_length)?;

        if self.thresholds.is_empty() {
            return Err(config_error("at least one threshold is required"));
        }
        if let Some(t) = self.thresholds.iter().find(|t| !t.is_finite()) {
            return Err(NightjarError::Configuration(format!(
                "threshold {t} is not finite"
            )));
        }
        if let Some(sep) = self.min_separation_secs {
            if !sep.is_finite() || sep < 0.0 {
                return Err(NightjarError::Configuration(format!(
                    "minimum separation {sep} s must be a non-negative duration"
                )));
            }
        }
        if !self.clip_start_offset_secs.is_finite() {
            return Err(config_error("clip start offset must be finite"));
        }
        if !self.clip_duration_secs.is_finite() || self.clip_duration_secs <= 0.0 {
            return Err(config_error("clip duration must be positive"));
        }
        if self.clip_length() == 0 {
            return Err(config_error(
                "clip duration is shorter than one input sample",
            ));
        }
        Ok(())
    }

    /// Thresholds deduplicated and in ascending order.
    pub fn sorted_thresholds(&self) -> Vec<f32> {
        let mut thresholds = self.thresholds.clone();
        thresholds.sort_by(|a, b| a.total_cmp(b));
        thresholds.dedup();
        thresholds
    }

    /// Clip length in input samples.
    pub fn clip_length(&self) -> u64 {
        seconds_to_samples(self.clip_duration_secs, self.input_sample_rate) as u64
    }

    /// Clip start offset in input samples.
    pub fn clip_start_offset(&self) -> i64 {
        (self.clip_start_offset_secs * f64::from(self.input_sample_rate)).round() as i64
    }

    /// Hop duration in seconds.
    pub fn hop_secs(&self) -> f64 {
        self.hop_length as f64 / f64::from(self.classifier_sample_rate)
    }

    /// Minimum separation expressed in windows (hops).
    pub fn min_separation_windows(&self) -> Option<f64> {
        self.min_separation_secs.map(|secs| secs / self.hop_secs())
    }
}

fn config_error(message: &str) -> NightjarError {
    NightjarError::Configuration(message.to_string())
}

/// Duration in seconds to a whole number of samples (rounded).
pub fn seconds_to_samples(secs: f64, sample_rate: u32) -> usize {
    (secs * f64::from(sample_rate)).round().max(0.0) as usize
}

/// Seconds-based detector settings, the form presets and settings files use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct DetectorSettings {
    /// Display name of the call type the settings target.
    pub clip_type: String,
    /// Input processed per chunk, seconds.
    pub input_chunk_secs: f64,
    /// Hop between windows, percent of the classifier waveform duration.
    pub hop_percent: f64,
    /// Primary detection threshold.
    pub threshold: f32,
    /// Additional thresholds, each producing its own clip stream.
    pub extra_thresholds: Vec<f32>,
    /// Minimum time between clips of the same threshold, seconds.
    pub min_separation_secs: Option<f64>,
    /// Padding before the detected window, seconds.
    pub initial_clip_padding_secs: f64,
    /// Clip duration, seconds.
    pub clip_duration_secs: f64,
}

impl DetectorSettings {
    /// MPG Ranch tseep (high-frequency) call detector.
    pub fn tseep() -> Self {
        Self {
            clip_type: "Tseep".into(),
            input_chunk_secs: 3600.0,
            hop_percent: 50.0,
            threshold: 0.9,
            extra_thresholds: Vec::new(),
            min_separation_secs: Some(0.2),
            initial_clip_padding_secs: 0.1,
            clip_duration_secs: 0.4,
        }
    }

    /// MPG Ranch thrush (low-frequency) call detector.
    pub fn thrush() -> Self {
        Self {
            clip_type: "Thrush".into(),
            min_separation_secs: Some(0.3),
            initial_clip_padding_secs: 0.2,
            clip_duration_secs: 0.6,
            ..Self::tseep()
        }
    }

    /// Look up a built-in preset by case-insensitive name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "tseep" => Some(Self::tseep()),
            "thrush" => Some(Self::thrush()),
            _ => None,
        }
    }

    /// Primary threshold plus extras, deduplicated and ascending.
    pub fn thresholds(&self) -> Vec<f32> {
        let mut thresholds = Vec::with_capacity(1 + self.extra_thresholds.len());
        thresholds.push(self.threshold);
        thresholds.extend_from_slice(&self.extra_thresholds);
        thresholds.sort_by(|a, b| a.total_cmp(b));
        thresholds.dedup();
        thresholds
    }

    /// Derive the sample-domain configuration for a stream at `input_sample_rate`.
    ///
    /// # Errors
    /// `NightjarError::Configuration` if the derived configuration is invalid.
    pub fn to_config(
        &self,
        input_sample_rate: u32,
        classifier: &ClassifierSettings,
    ) -> Result<DetectorConfig> {
        let fs = classifier.sample_rate;
        let hop_secs = self.hop_percent / 100.0 * classifier.waveform_duration_secs;
        let config = DetectorConfig {
            input_sample_rate,
            classifier_sample_rate: fs,
            chunk_length: seconds_to_samples(self.input_chunk_secs, input_sample_rate),
            record_length: classifier.record_length(),
            hop_length: seconds_to_samples(hop_secs, fs),
            thresholds: self.thresholds(),
            min_separation_secs: self.min_separation_secs,
            clip_start_offset_secs: -self.initial_clip_padding_secs,
            clip_duration_secs: self.clip_duration_secs,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self::tseep()
    }
}

/// Input geometry the scorer was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct ClassifierSettings {
    /// Waveform sample rate (Hz).
    pub sample_rate: u32,
    /// Scored waveform duration, seconds.
    pub waveform_duration_secs: f64,
}

impl ClassifierSettings {
    /// Window length in classifier samples.
    pub fn record_length(&self) -> usize {
        seconds_to_samples(self.waveform_duration_secs, self.sample_rate)
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            waveform_duration_secs: 0.150,
        }
    }
}
