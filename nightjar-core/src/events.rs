//! Event types emitted by channel-backed listeners and the live engine.
//!
//! All types serialise as camelCase JSON; the CLI prints them one per line.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Detection events
// ---------------------------------------------------------------------------

/// A detected clip, tagged with the audio channel it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipEvent {
    /// Monotonically increasing per-listener sequence number.
    pub seq: u64,
    /// Audio channel index within the recording.
    pub channel: usize,
    /// Clip start, absolute input-rate sample index.
    pub start_index: u64,
    /// Clip length, input-rate samples.
    pub length: u64,
    /// Threshold whose clip stream produced this clip.
    pub threshold: f32,
    /// Clip start in seconds from the start of the stream.
    pub start_secs: f64,
}

/// One item of a detector's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DetectionEvent {
    /// A clip was accepted.
    Clip(ClipEvent),
    /// The detector finished; no further events follow for this channel.
    Complete { channel: usize },
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Broadcast by the live engine when its state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the live detection engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Capturing audio and detecting.
    Listening,
    /// Capture stopped and detection completed; engine may be restarted.
    Stopped,
    /// Capture or scoring failed; restart required.
    Error,
}
