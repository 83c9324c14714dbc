//! `nightjar`: detect nocturnal flight calls in recordings or live input.
//!
//! Detected clips are printed to stdout as JSON lines; logs go to stderr.

mod args;
mod detect;
mod listen;
mod settings;

use std::path::Path;

use anyhow::{bail, Context};
use nightjar_core::{
    audio::device::list_input_devices, DetectorSettings, EnergyScorer, EngineConfig, ScorerHandle,
};
use tracing::info;

use crate::args::{parse_args, Args, Command, USAGE};
use crate::settings::{load_settings, normalize_preset, CliSettings};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nightjar=info")),
        )
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args) {
        eprintln!("nightjar: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut settings = load_settings(args.settings.as_deref())?;
    if let Some(preset) = &args.preset {
        if DetectorSettings::preset(preset).is_none() {
            bail!("unknown preset: {preset}");
        }
        settings.preset = normalize_preset(preset);
        settings.detector = None;
    }
    if let Some(model) = &args.model {
        settings.model_path = Some(model.clone());
    }
    if let Some(device) = &args.device {
        settings.preferred_input_device = Some(device.clone());
    }
    settings.normalize();

    let mut detector_settings = settings.detector_settings();
    if let Some((&first, rest)) = args.thresholds.split_first() {
        detector_settings.threshold = first;
        detector_settings.extra_thresholds = rest.to_vec();
    }

    match args.command {
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
        Command::Devices => {
            let devices = list_input_devices();
            println!("{}", serde_json::to_string_pretty(&devices)?);
            Ok(())
        }
        Command::Detect { files } => {
            let scorer = build_scorer(&settings, &detector_settings.clip_type)?;
            info!(
                clip_type = %detector_settings.clip_type,
                thresholds = ?detector_settings.thresholds(),
                "starting detection"
            );
            detect::run(&detect::DetectJob {
                files: &files,
                settings: &settings,
                detector_settings: &detector_settings,
                scorer,
                scores: args.scores.as_deref(),
                block_frames: args.block_frames,
            })
        }
        Command::Listen => {
            let scorer = build_scorer(&settings, &detector_settings.clip_type)?;
            let config = EngineConfig {
                detector: detector_settings,
                classifier: settings.classifier.clone(),
                preferred_input_device: settings.preferred_input_device.clone(),
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("building async runtime")?;
            runtime.block_on(listen::run(config, scorer))
        }
    }
}

fn build_scorer(settings: &CliSettings, clip_type: &str) -> anyhow::Result<ScorerHandle> {
    let model_path = settings
        .model_path
        .clone()
        .or_else(|| installed_model(clip_type));
    match model_path.as_deref() {
        Some(path) => onnx_scorer(path, settings),
        None => {
            info!(
                reference_level = settings.energy_reference_level,
                "no model configured, scoring with the energy scorer"
            );
            Ok(ScorerHandle::new(EnergyScorer::new(
                settings.energy_reference_level,
            )))
        }
    }
}

/// Model installed in the default models directory for `clip_type`, if any.
#[cfg(feature = "onnx")]
fn installed_model(clip_type: &str) -> Option<std::path::PathBuf> {
    let path = nightjar_core::OnnxScorer::default_model_path(clip_type);
    path.exists().then_some(path)
}

#[cfg(not(feature = "onnx"))]
fn installed_model(_clip_type: &str) -> Option<std::path::PathBuf> {
    None
}

#[cfg(feature = "onnx")]
fn onnx_scorer(path: &Path, settings: &CliSettings) -> anyhow::Result<ScorerHandle> {
    let scorer = nightjar_core::OnnxScorer::new(path, settings.classifier.record_length())
        .with_context(|| format!("loading model {}", path.display()))?;
    let handle = ScorerHandle::new(scorer);
    handle.warm_up()?;
    Ok(handle)
}

#[cfg(not(feature = "onnx"))]
fn onnx_scorer(path: &Path, _settings: &CliSettings) -> anyhow::Result<ScorerHandle> {
    bail!(
        "cannot load {}: nightjar was built without the onnx feature",
        path.display()
    )
}
