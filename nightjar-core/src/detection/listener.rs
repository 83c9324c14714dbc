//! Clip listeners.
//!
//! `ClipListener` is the push interface a `Detector` notifies. Two
//! implementations ship with the crate:
//!
//! - [`ClipCollector`] keeps clips in memory.
//! - [`ChannelListener`] forwards [`DetectionEvent`]s over a crossbeam
//!   channel so a consumer on another thread can drain them between
//!   `detect` calls instead of being called back re-entrantly.

use crossbeam_channel::Sender;
use tracing::debug;

use crate::detection::clip::Clip;
use crate::events::{ClipEvent, DetectionEvent};

/// Receives detector output.
pub trait ClipListener {
    /// Called once per accepted clip, in emission order.
    fn process_clip(&mut self, start_index: u64, length: u64, threshold: f32);

    /// Called exactly once, after the final chunk has been processed.
    fn complete_processing(&mut self);
}

impl<L: ClipListener + ?Sized> ClipListener for &mut L {
    fn process_clip(&mut self, start_index: u64, length: u64, threshold: f32) {
        (**self).process_clip(start_index, length, threshold);
    }

    fn complete_processing(&mut self) {
        (**self).complete_processing();
    }
}

impl<L: ClipListener + ?Sized> ClipListener for Box<L> {
    fn process_clip(&mut self, start_index: u64, length: u64, threshold: f32) {
        (**self).process_clip(start_index, length, threshold);
    }

    fn complete_processing(&mut self) {
        (**self).complete_processing();
    }
}

/// Records every clip in memory.
#[derive(Debug, Clone, Default)]
pub struct ClipCollector {
    pub clips: Vec<Clip>,
    /// Number of `complete_processing` calls seen.
    pub completions: usize,
}

impl ClipCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clips of a single threshold, in emission order.
    pub fn clips_for(&self, threshold: f32) -> Vec<Clip> {
        self.clips
            .iter()
            .filter(|c| c.threshold == threshold)
            .copied()
            .collect()
    }
}

impl ClipListener for ClipCollector {
    fn process_clip(&mut self, start_index: u64, length: u64, threshold: f32) {
        self.clips.push(Clip {
            start_index,
            length,
            threshold,
        });
    }

    fn complete_processing(&mut self) {
        self.completions += 1;
    }
}

/// Forwards detections as [`DetectionEvent`]s over a crossbeam channel.
///
/// A disconnected receiver is not an error for the detector; events are
/// dropped and the drop is logged at debug level.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: Sender<DetectionEvent>,
    channel: usize,
    input_sample_rate: u32,
    seq: u64,
}

impl ChannelListener {
    pub fn new(tx: Sender<DetectionEvent>, channel: usize, input_sample_rate: u32) -> Self {
        Self {
            tx,
            channel,
            input_sample_rate,
            seq: 0,
        }
    }

    fn send(&self, event: DetectionEvent) {
        if self.tx.send(event).is_err() {
            debug!(channel = self.channel, "detection event receiver dropped");
        }
    }
}

impl ClipListener for ChannelListener {
    fn process_clip(&mut self, start_index: u64, length: u64, threshold: f32) {
        let event = ClipEvent {
            seq: self.seq,
            channel: self.channel,
            start_index,
            length,
            threshold,
            start_secs: start_index as f64 / f64::from(self.input_sample_rate),
        };
        self.seq = self.seq.saturating_add(1);
        self.send(DetectionEvent::Clip(event));
    }

    fn complete_processing(&mut self) {
        self.send(DetectionEvent::Complete {
            channel: self.channel,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_records_clips_and_completion() {
        let mut collector = ClipCollector::new();
        collector.process_clip(10, 5, 0.5);
        collector.process_clip(10, 5, 0.9);
        collector.complete_processing();

        assert_eq!(collector.clips.len(), 2);
        assert_eq!(collector.clips_for(0.9)[0].start_index, 10);
        assert_eq!(collector.completions, 1);
    }

    #[test]
    fn channel_listener_numbers_events_and_converts_time() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut listener = ChannelListener::new(tx, 3, 8_000);
        listener.process_clip(4_000, 800, 0.5);
        listener.process_clip(12_000, 800, 0.5);
        listener.complete_processing();

        let events: Vec<DetectionEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        match &events[1] {
            DetectionEvent::Clip(clip) => {
                assert_eq!(clip.seq, 1);
                assert_eq!(clip.channel, 3);
                assert!((clip.start_secs - 1.5).abs() < 1e-9);
            }
            other => panic!("expected clip event, got {other:?}"),
        }
        assert_eq!(events[2], DetectionEvent::Complete { channel: 3 });
    }

    #[test]
    fn channel_listener_survives_dropped_receiver() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let mut listener = ChannelListener::new(tx, 0, 8_000);
        listener.process_clip(0, 10, 0.5);
        listener.complete_processing();
    }
}
