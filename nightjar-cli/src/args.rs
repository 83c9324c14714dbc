//! Command-line parsing.

use std::path::PathBuf;

pub const USAGE: &str = "Usage:
  nightjar detect <file.wav>... [options]
  nightjar listen [--device <name>] [options]
  nightjar devices

Options:
  --preset <tseep|thrush>   detector preset (default: tseep)
  --settings <file.json>    settings file
  --threshold <t>           detection threshold; repeat for extra clip streams
  --model <file.onnx>       ONNX classifier (requires the onnx feature)
  --scores <out.wav>        write detection scores (detect, single file)
  --block-frames <n>        frames read from a file per detect call

Logging is controlled by RUST_LOG (default: nightjar=info).";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Detect { files: Vec<PathBuf> },
    Listen,
    Devices,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub command: Command,
    pub preset: Option<String>,
    pub settings: Option<PathBuf>,
    pub thresholds: Vec<f32>,
    pub model: Option<PathBuf>,
    pub scores: Option<PathBuf>,
    pub block_frames: usize,
    pub device: Option<String>,
}

pub const DEFAULT_BLOCK_FRAMES: usize = 65_536;

pub fn parse_args<I>(args: I) -> Result<Args, String>
where
    I: IntoIterator<Item = String>,
{
    let mut it = args.into_iter();
    let command_name = it.next();

    let mut files = Vec::new();
    let mut parsed = Args {
        command: Command::Help,
        preset: None,
        settings: None,
        thresholds: Vec::new(),
        model: None,
        scores: None,
        block_frames: DEFAULT_BLOCK_FRAMES,
        device: None,
    };

    while let Some(arg) = it.next() {
        let mut value = |name: &str| it.next().ok_or_else(|| format!("missing value for {name}"));
        match arg.as_str() {
            "--preset" => parsed.preset = Some(value("--preset")?),
            "--settings" => parsed.settings = Some(PathBuf::from(value("--settings")?)),
            "--threshold" => {
                let v = value("--threshold")?;
                let t = v
                    .parse::<f32>()
                    .ok()
                    .filter(|t| t.is_finite())
                    .ok_or_else(|| format!("invalid value for --threshold: {v}"))?;
                parsed.thresholds.push(t);
            }
            "--model" => parsed.model = Some(PathBuf::from(value("--model")?)),
            "--scores" => parsed.scores = Some(PathBuf::from(value("--scores")?)),
            "--block-frames" => {
                let v = value("--block-frames")?;
                parsed.block_frames = v
                    .parse::<usize>()
                    .map_err(|_| format!("invalid value for --block-frames: {v}"))?
                    .max(1);
            }
            "--device" => parsed.device = Some(value("--device")?),
            "--help" | "-h" => {
                parsed.command = Command::Help;
                return Ok(parsed);
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown argument: {other}"));
            }
            _ => files.push(PathBuf::from(arg)),
        }
    }

    parsed.command = match command_name.as_deref() {
        None | Some("help") | Some("--help") | Some("-h") => Command::Help,
        Some("detect") => {
            if files.is_empty() {
                return Err("detect needs at least one WAV file".into());
            }
            Command::Detect { files }
        }
        Some("listen") => Command::Listen,
        Some("devices") => Command::Devices,
        Some(other) => return Err(format!("unknown command: {other}")),
    };

    if !matches!(parsed.command, Command::Detect { .. }) && parsed.scores.is_some() {
        return Err("--scores is only supported by detect".into());
    }

    Ok(parsed)
}
