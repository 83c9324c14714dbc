//! Clip detection: peak picking over window scores and the streaming
//! detector that drives it.

pub mod clip;
pub mod detector;
pub mod listener;
pub mod peaks;
pub mod score_file;
pub mod settings;

pub use clip::{BoundaryRejection, Clip, ClipResolver};
pub use detector::{Detector, DetectorDiagnostics, DetectorState};
pub use listener::{ChannelListener, ClipCollector, ClipListener};
pub use peaks::find_peaks;
pub use score_file::DetectionScoreWriter;
pub use settings::{ClassifierSettings, DetectorConfig, DetectorSettings};
