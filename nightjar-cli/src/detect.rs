//! `nightjar detect`: run one detector per channel over WAV files.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use crossbeam_channel::{unbounded, Receiver};
use hound::{SampleFormat, WavReader};
use nightjar_core::{
    ChannelListener, DetectionEvent, DetectionScoreWriter, Detector, DetectorConfig, ScorerHandle,
};
use serde::Serialize;
use tracing::info;

/// One JSON line of `detect` output.
#[derive(Debug, Serialize)]
struct FileEvent<'a> {
    file: &'a str,
    #[serde(flatten)]
    event: &'a DetectionEvent,
}

pub struct DetectJob<'a> {
    pub files: &'a [PathBuf],
    pub settings: &'a crate::settings::CliSettings,
    pub detector_settings: &'a nightjar_core::DetectorSettings,
    pub scorer: ScorerHandle,
    pub scores: Option<&'a Path>,
    pub block_frames: usize,
}

pub fn run(job: &DetectJob<'_>) -> anyhow::Result<()> {
    if job.scores.is_some() && job.files.len() != 1 {
        bail!("--scores takes exactly one input file");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for file in job.files {
        detect_file(job, file, &mut out)
            .with_context(|| format!("detecting in {}", file.display()))?;
    }
    Ok(())
}

fn detect_file(job: &DetectJob<'_>, path: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));
    let config = job
        .detector_settings
        .to_config(spec.sample_rate, &job.settings.classifier)?;

    info!(
        file = %path.display(),
        sample_rate = spec.sample_rate,
        channels,
        frames = reader.duration(),
        "detecting"
    );

    let (tx, rx) = unbounded();
    let mut detectors = Vec::with_capacity(channels);
    for channel in 0..channels {
        let listener = ChannelListener::new(tx.clone(), channel, spec.sample_rate);
        let mut detector = Detector::new(config.clone(), job.scorer.clone(), listener)?;
        if channel == 0 {
            if let Some(scores) = job.scores {
                detector = detector.with_score_output(score_writer(job, &config, scores)?);
            }
        }
        detectors.push(detector);
    }
    drop(tx);

    let file_name = path.display().to_string();
    let block_len = job.block_frames * channels;
    let scale = int_scale(spec.bits_per_sample);
    let mut samples: Box<dyn Iterator<Item = hound::Result<f32>> + '_> = match spec.sample_format
    {
        SampleFormat::Float => Box::new(reader.samples::<f32>()),
        SampleFormat::Int => Box::new(
            reader
                .samples::<i32>()
                .map(move |s| s.map(|v| v as f32 * scale)),
        ),
    };

    let mut block = Vec::with_capacity(block_len);
    loop {
        block.clear();
        for sample in samples.by_ref().take(block_len) {
            block.push(sample?);
        }
        if block.is_empty() {
            break;
        }
        for (channel, detector) in detectors.iter_mut().enumerate() {
            let channel_samples = deinterleave(&block, channels, channel);
            detector.detect(&channel_samples)?;
        }
        print_events(&rx, &file_name, out)?;
    }

    for detector in &mut detectors {
        detector.complete_detection()?;
    }
    print_events(&rx, &file_name, out)?;

    for (channel, detector) in detectors.iter().enumerate() {
        let d = detector.diagnostics();
        info!(
            file = %file_name,
            channel,
            chunks = d.chunks_processed,
            windows = d.windows_scored,
            clips = d.clips_emitted,
            rejected = d.clips_rejected,
            "channel done"
        );
    }
    Ok(())
}

fn score_writer(
    job: &DetectJob<'_>,
    config: &DetectorConfig,
    path: &Path,
) -> anyhow::Result<DetectionScoreWriter> {
    let writer = DetectionScoreWriter::create(
        path,
        config.classifier_sample_rate,
        config.hop_length,
        job.settings.score_scale_factor,
        job.settings.score_start_offset_secs,
        job.settings.score_duration_secs,
    )
    .with_context(|| format!("creating score file {}", path.display()))?;
    Ok(writer)
}

fn print_events(
    rx: &Receiver<DetectionEvent>,
    file: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    for event in rx.try_iter() {
        let line = serde_json::to_string(&FileEvent {
            file,
            event: &event,
        })?;
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

/// Scale that maps a signed integer sample of `bits` bits to [-1, 1).
fn int_scale(bits: u16) -> f32 {
    1.0 / (1u64 << (bits.clamp(1, 32) - 1)) as f32
}

/// Samples of one channel from interleaved frames.
fn deinterleave(interleaved: &[f32], channels: usize, channel: usize) -> Vec<f32> {
    interleaved
        .iter()
        .skip(channel)
        .step_by(channels)
        .copied()
        .collect()
}
