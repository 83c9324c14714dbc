//! `LiveEngine`: detection on a live input device.
//!
//! ## Lifecycle
//!
//! ```text
//! LiveEngine::new()
//!     └─► warm_up()          → scorer ready
//!         └─► start(make_listener) → device open, detector built, status = Listening
//!             └─► stop()     → running=false, detection completed, status = Stopped
//! ```
//!
//! `start()`/`stop()` in the wrong state return an error rather than
//! panicking.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS, so `AudioCapture` is opened
//! inside the `spawn_blocking` closure and never crosses a thread boundary.
//! The detector is built there too, because its input rate is the rate the
//! device reports. A sync oneshot channel carries the open result back to
//! the `start()` caller.

pub mod pipeline;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    audio::AudioCapture,
    buffering::{create_audio_ring, AudioProducer},
    detection::{ClassifierSettings, ClipListener, Detector, DetectorSettings},
    error::{NightjarError, Result},
    events::{EngineStatus, EngineStatusEvent},
    scoring::ScorerHandle,
};

/// Status events buffered for slow subscribers.
const BROADCAST_CAP: usize = 64;

/// Configuration for `LiveEngine`.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub detector: DetectorSettings,
    pub classifier: ClassifierSettings,
    /// Input device name; `None` uses the system default.
    pub preferred_input_device: Option<String>,
}

/// Live detection engine handle.
///
/// `Send + Sync`; share it as `Arc<LiveEngine>` between the task that stops
/// it and the tasks that watch its status.
pub struct LiveEngine {
    config: EngineConfig,
    scorer: ScorerHandle,
    /// `true` while capture + pipeline are active.
    running: Arc<AtomicBool>,
    status: Arc<Mutex<EngineStatus>>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
}

impl LiveEngine {
    pub fn new(config: EngineConfig, scorer: ScorerHandle) -> Self {
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            config,
            scorer,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            status_tx,
        }
    }

    /// Warm up the scorer. Call once before `start()`.
    pub fn warm_up(&self) -> Result<()> {
        info!("warming up scorer");
        self.scorer.warm_up()?;
        info!("scorer ready");
        Ok(())
    }

    /// Open the input device and start detecting.
    ///
    /// `make_listener` receives the device sample rate, which clip indices
    /// are expressed in.
    ///
    /// Blocks until the device is open and the detector is built, then
    /// returns; detection continues on a blocking worker thread. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    /// - `NightjarError::AlreadyRunning` if already started.
    /// - Device errors, or `NightjarError::Configuration` if the settings do
    ///   not fit the device's sample rate.
    pub fn start<F, L>(&self, make_listener: F) -> Result<()>
    where
        F: FnOnce(u32) -> L + Send + 'static,
        L: ClipListener + Send + 'static,
    {
        self.launch(
            |producer, running, preferred_device| {
                let capture =
                    AudioCapture::open_with_preference(producer, running, preferred_device)?;
                Ok((capture.sample_rate, capture))
            },
            make_listener,
        )
    }

    /// `start()` with the input source supplied by `open_input`.
    ///
    /// `open_input` runs on the worker thread. It starts feeding `producer`
    /// and returns the input sample rate plus a guard that is dropped on that
    /// thread once the pipeline exits.
    fn launch<O, G, F, L>(&self, open_input: O, make_listener: F) -> Result<()>
    where
        O: FnOnce(AudioProducer, Arc<AtomicBool>, Option<&str>) -> Result<(u32, G)>
            + Send
            + 'static,
        F: FnOnce(u32) -> L + Send + 'static,
        L: ClipListener + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(NightjarError::AlreadyRunning);
        }

        let (producer, consumer) = create_audio_ring();

        let config = self.config.clone();
        let scorer = self.scorer.clone();
        let running = Arc::clone(&self.running);
        let status = Arc::clone(&self.status);
        let status_tx = self.status_tx.clone();

        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();

        tokio::task::spawn_blocking(move || {
            let (sample_rate, input) = match open_input(
                producer,
                Arc::clone(&running),
                config.preferred_input_device.as_deref(),
            ) {
                Ok(opened) => opened,
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            let listener = make_listener(sample_rate);
            let detector = match config
                .detector
                .to_config(sample_rate, &config.classifier)
                .and_then(|detector_config| Detector::new(detector_config, scorer, listener))
            {
                Ok(d) => d,
                Err(e) => {
                    running.store(false, Ordering::SeqCst);
                    let _ = open_tx.send(Err(e));
                    return;
                }
            };

            // Listening goes out before the open result: once the pipeline
            // runs it may publish Error, which must stay the latest status.
            publish_status(&status, &status_tx, EngineStatus::Listening, None);
            let _ = open_tx.send(Ok(sample_rate));

            pipeline::run(pipeline::PipelineContext {
                detector,
                consumer,
                running,
                status,
                status_tx,
            });

            // Input drops here, releasing the device on this thread.
            drop(input);
        });

        match open_rx.recv() {
            Ok(Ok(rate)) => {
                info!(sample_rate = rate, "engine started, listening");
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(EngineStatus::Error, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(EngineStatus::Error, Some("pipeline failed to start".into()));
                Err(NightjarError::Other(anyhow::anyhow!(
                    "pipeline task died unexpectedly"
                )))
            }
        }
    }

    /// Stop capture. The pipeline drains, completes detection and exits.
    ///
    /// # Errors
    /// `NightjarError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(NightjarError::NotRunning);
        }
        self.set_status(EngineStatus::Stopped, None);
        info!("engine stop requested");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        publish_status(&self.status, &self.status_tx, new_status, detail);
    }
}

/// Record `new_status` and broadcast it. Having no subscribers is fine.
pub(crate) fn publish_status(
    status: &Mutex<EngineStatus>,
    status_tx: &broadcast::Sender<EngineStatusEvent>,
    new_status: EngineStatus,
    detail: Option<String>,
) {
    *status.lock() = new_status;
    let _ = status_tx.send(EngineStatusEvent {
        status: new_status,
        detail,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::buffering::Producer;
    use crate::detection::ClipCollector;
    use crate::scoring::energy::EnergyScorer;
    use crate::scoring::Scorer;

    struct FailingScorer;

    impl Scorer for FailingScorer {
        fn score(&mut self, _windows: &[&[f32]]) -> Result<Vec<f32>> {
            Err(NightjarError::Scorer("model crashed".into()))
        }
    }

    /// 1 kHz everywhere: record 10, hop 5, chunks of 500 samples.
    fn small_config() -> EngineConfig {
        EngineConfig {
            detector: DetectorSettings {
                input_chunk_secs: 0.5,
                threshold: 0.5,
                min_separation_secs: None,
                initial_clip_padding_secs: 0.0,
                clip_duration_secs: 0.01,
                ..DetectorSettings::default()
            },
            classifier: ClassifierSettings {
                sample_rate: 1_000,
                waveform_duration_secs: 0.01,
            },
            preferred_input_device: None,
        }
    }

    fn engine() -> LiveEngine {
        LiveEngine::new(
            EngineConfig::default(),
            ScorerHandle::new(EnergyScorer::default()),
        )
    }

    #[test]
    fn new_engine_is_idle() {
        let engine = engine();
        assert_eq!(engine.status(), EngineStatus::Idle);
        assert!(!engine.is_running());
        engine.warm_up().unwrap();
    }

    #[test]
    fn stop_without_start_is_not_running() {
        assert!(matches!(engine().stop(), Err(NightjarError::NotRunning)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_start_while_running_is_rejected() {
        let engine = engine();
        engine.running.store(true, Ordering::SeqCst);
        assert!(matches!(
            engine.start(|_rate| ClipCollector::new()),
            Err(NightjarError::AlreadyRunning)
        ));
    }

    #[test]
    fn status_changes_are_broadcast() {
        let engine = engine();
        let mut rx = engine.subscribe_status();
        engine.set_status(EngineStatus::Error, Some("device unplugged".into()));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.status, EngineStatus::Error);
        assert_eq!(event.detail.as_deref(), Some("device unplugged"));
        assert_eq!(engine.status(), EngineStatus::Error);
    }

    async fn next_status(
        rx: &mut broadcast::Receiver<EngineStatusEvent>,
    ) -> EngineStatusEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("status event")
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pipeline_failure_right_after_start_stays_the_latest_status() {
        let engine = LiveEngine::new(small_config(), ScorerHandle::new(FailingScorer));
        let mut status_rx = engine.subscribe_status();

        engine
            .launch(
                |mut producer: AudioProducer, _running, _device| {
                    producer.push_slice(&[0.1f32; 600]);
                    Ok((1_000, producer))
                },
                |_rate| ClipCollector::new(),
            )
            .unwrap();

        assert_eq!(
            next_status(&mut status_rx).await.status,
            EngineStatus::Listening
        );
        let failed = next_status(&mut status_rx).await;
        assert_eq!(failed.status, EngineStatus::Error);
        assert!(failed.detail.unwrap().contains("model crashed"));

        assert_eq!(engine.status(), EngineStatus::Error);
        assert!(!engine.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn input_open_failure_is_reported_by_start() {
        let engine = engine();
        let err = engine
            .launch(
                |_producer, _running, _device| -> Result<(u32, ())> {
                    Err(NightjarError::AudioDevice("no input devices".into()))
                },
                |_rate| ClipCollector::new(),
            )
            .unwrap_err();

        assert!(matches!(err, NightjarError::AudioDevice(_)));
        assert_eq!(engine.status(), EngineStatus::Error);
        assert!(!engine.is_running());
    }
}
