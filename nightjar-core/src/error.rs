use thiserror::Error;

/// All errors produced by nightjar-core.
#[derive(Debug, Error)]
pub enum NightjarError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("sample buffer holds {available} samples but {requested} were requested")]
    InsufficientData { requested: usize, available: usize },

    #[error("invalid detector state: {0}")]
    InvalidState(String),

    #[error("resampler error: {0}")]
    Resampler(String),

    #[error("scorer error: {0}")]
    Scorer(String),

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("ONNX session error: {0}")]
    OnnxSession(String),

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, NightjarError>;
