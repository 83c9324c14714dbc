//! Blocking pipeline loop.
//!
//! ## Per iteration
//!
//! ```text
//! 1. Drain up to DRAIN_CHUNK samples from the ring buffer
//! 2. Detector::detect (cuts, scores and resolves whole chunks)
//! ```
//!
//! When `running` goes false the loop drains what capture already pushed,
//! then calls `Detector::complete_detection`. The loop runs in
//! `spawn_blocking`, keeping the Tokio executor free.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::{
    buffering::{AudioConsumer, Consumer},
    detection::{ClipListener, Detector},
    engine::publish_status,
    events::{EngineStatus, EngineStatusEvent},
};

/// Everything the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext<L: ClipListener> {
    pub detector: Detector<L>,
    pub consumer: AudioConsumer,
    pub running: Arc<AtomicBool>,
    pub status: Arc<Mutex<EngineStatus>>,
    pub status_tx: broadcast::Sender<EngineStatusEvent>,
}

/// Samples drained from the ring per iteration (20 ms at 48 kHz).
const DRAIN_CHUNK: usize = 960;

/// Sleep when the ring is empty.
const DEFAULT_SLEEP_EMPTY_MS: u64 = 5;

/// Run until `ctx.running` becomes false or detection fails.
pub fn run<L: ClipListener>(mut ctx: PipelineContext<L>) {
    info!("pipeline started");

    let mut raw = vec![0f32; DRAIN_CHUNK];

    loop {
        let stopping = !ctx.running.load(Ordering::Relaxed);

        let n = ctx.consumer.pop_slice(&mut raw);
        if n == 0 {
            if stopping {
                break;
            }
            std::thread::sleep(Duration::from_millis(empty_sleep_ms()));
            continue;
        }

        if let Err(e) = ctx.detector.detect(&raw[..n]) {
            fail(&ctx, &e.to_string());
            return;
        }
    }

    if let Err(e) = ctx.detector.complete_detection() {
        fail(&ctx, &e.to_string());
        return;
    }

    let d = ctx.detector.diagnostics();
    info!(
        samples_in = d.samples_in,
        chunks_processed = d.chunks_processed,
        clips_emitted = d.clips_emitted,
        clips_rejected = d.clips_rejected,
        "pipeline stopped"
    );
}

fn fail<L: ClipListener>(ctx: &PipelineContext<L>, detail: &str) {
    error!("detection failed: {detail}");
    ctx.running.store(false, Ordering::SeqCst);
    publish_status(
        &ctx.status,
        &ctx.status_tx,
        EngineStatus::Error,
        Some(detail.to_string()),
    );
}

fn empty_sleep_ms() -> u64 {
    static EMPTY_SLEEP_MS: OnceLock<u64> = OnceLock::new();
    *EMPTY_SLEEP_MS.get_or_init(|| {
        std::env::var("NIGHTJAR_PIPELINE_EMPTY_SLEEP_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v.clamp(1, 50))
            .unwrap_or(DEFAULT_SLEEP_EMPTY_MS)
    })
}
