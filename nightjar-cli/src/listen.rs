//! `nightjar listen`: live detection on an input device until Ctrl-C.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver};
use nightjar_core::{
    ChannelListener, DetectionEvent, EngineConfig, EngineStatus, LiveEngine, ScorerHandle,
};
use tracing::{info, warn};

pub async fn run(config: EngineConfig, scorer: ScorerHandle) -> anyhow::Result<()> {
    let engine = Arc::new(LiveEngine::new(config, scorer));
    engine.warm_up()?;

    let mut status_rx = engine.subscribe_status();
    tokio::spawn(async move {
        while let Ok(event) = status_rx.recv().await {
            match (event.status, event.detail) {
                (EngineStatus::Error, detail) => {
                    warn!(detail = detail.as_deref().unwrap_or(""), "engine error");
                }
                (status, _) => info!(?status, "engine status"),
            }
        }
    });

    let (tx, rx) = unbounded();
    engine
        .start(move |sample_rate| ChannelListener::new(tx, 0, sample_rate))
        .context("starting live detection")?;

    let printer = std::thread::spawn(move || write_events(&rx, &mut std::io::stdout()));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for Ctrl-C")?;
            info!("Ctrl-C received, stopping");
            if let Err(e) = engine.stop() {
                warn!("stop: {e}");
            }
        }
        _ = wait_for_error(Arc::clone(&engine)) => {}
    }

    // The final chunk of a long input can take a while to score. The printer
    // returns on `Complete`, or once the pipeline drops its sender.
    info!("waiting for detection to complete");
    match tokio::task::spawn_blocking(move || printer.join()).await {
        Ok(Ok(result)) => result.context("writing events")?,
        _ => anyhow::bail!("event printer exited abnormally"),
    }

    if engine.status() == EngineStatus::Error {
        anyhow::bail!("live detection failed");
    }
    Ok(())
}

/// Resolves once the engine stops running on its own (detection failure).
async fn wait_for_error(engine: Arc<LiveEngine>) {
    while engine.is_running() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// Write events as JSON lines until `Complete` or until every sender is gone.
fn write_events(rx: &Receiver<DetectionEvent>, out: &mut impl Write) -> std::io::Result<()> {
    while let Ok(event) = rx.recv() {
        let line = serde_json::to_string(&event).map_err(std::io::Error::other)?;
        writeln!(out, "{line}")?;
        out.flush()?;
        if matches!(event, DetectionEvent::Complete { .. }) {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use nightjar_core::ClipEvent;

    fn clip(seq: u64) -> DetectionEvent {
        DetectionEvent::Clip(ClipEvent {
            seq,
            channel: 0,
            start_index: 1_000 * seq,
            length: 100,
            threshold: 0.9,
            start_secs: seq as f64 / 24.0,
        })
    }

    #[test]
    fn writes_until_complete() {
        let (tx, rx) = unbounded();
        tx.send(clip(0)).unwrap();
        tx.send(DetectionEvent::Complete { channel: 0 }).unwrap();
        tx.send(clip(1)).unwrap();

        let mut out = Vec::new();
        write_events(&rx, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().last().unwrap().contains("complete"));
    }

    #[test]
    fn waits_for_late_events_until_the_sender_is_dropped() {
        let (tx, rx) = unbounded();
        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            tx.send(clip(0)).unwrap();
            std::thread::sleep(Duration::from_millis(50));
            tx.send(clip(1)).unwrap();
        });

        let mut out = Vec::new();
        write_events(&rx, &mut out).unwrap();
        sender.join().unwrap();

        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }
}
