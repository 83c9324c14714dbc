use std::time::Duration;

use nightjar_core::detection::{ClassifierSettings, ClipCollector, DetectorSettings};
use nightjar_core::{
    ChannelListener, DetectionEvent, Detector, DetectorConfig, EnergyScorer, NightjarError,
    Scorer, ScorerHandle,
};

/// Scores a window by its first sample.
struct FirstSampleScorer;

impl Scorer for FirstSampleScorer {
    fn score(&mut self, windows: &[&[f32]]) -> Result<Vec<f32>, NightjarError> {
        Ok(windows.iter().map(|w| w[0]).collect())
    }
}

/// Deterministic pseudo-random samples in [0, 1).
fn noise(len: usize, seed: u64) -> Vec<f32> {
    let mut x = seed;
    (0..len)
        .map(|_| {
            x = x
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (x >> 40) as f32 / (1u64 << 24) as f32
        })
        .collect()
}

fn noisy_config() -> DetectorConfig {
    DetectorConfig {
        input_sample_rate: 1_000,
        classifier_sample_rate: 1_000,
        chunk_length: 97,
        record_length: 10,
        hop_length: 4,
        thresholds: vec![0.9, 0.6],
        min_separation_secs: Some(0.012),
        clip_start_offset_secs: 0.0,
        clip_duration_secs: 0.008,
    }
}

fn run_fragmented(samples: &[f32], fragment_sizes: &[usize]) -> ClipCollector {
    let mut detector = Detector::new(
        noisy_config(),
        ScorerHandle::new(FirstSampleScorer),
        ClipCollector::new(),
    )
    .unwrap();

    let mut pos = 0;
    let mut sizes = fragment_sizes.iter().cycle();
    while pos < samples.len() {
        let size = *sizes.next().unwrap();
        let end = (pos + size).min(samples.len());
        detector.detect(&samples[pos..end]).unwrap();
        pos = end;
    }
    detector.complete_detection().unwrap();
    detector.into_listener()
}

#[test]
fn clips_do_not_depend_on_call_fragmentation() {
    let samples = noise(2_000, 7);
    let whole = run_fragmented(&samples, &[samples.len()]);
    assert!(!whole.clips.is_empty());

    for sizes in [&[1usize][..], &[7, 13, 250, 3], &[96, 98], &[0, 500, 1]] {
        let fragmented = run_fragmented(&samples, sizes);
        assert_eq!(fragmented.clips, whole.clips, "fragment sizes {sizes:?}");
        assert_eq!(fragmented.completions, 1);
    }
}

#[test]
fn clips_respect_stream_bounds_and_separation() {
    let samples = noise(2_000, 11);
    let collector = run_fragmented(&samples, &[333]);
    let cfg = noisy_config();

    for clip in &collector.clips {
        assert!(clip.end_index() <= samples.len() as u64);
        assert_eq!(clip.length, 8);
    }

    for threshold in [0.6f32, 0.9] {
        let clips = collector.clips_for(threshold);
        for pair in clips.windows(2) {
            assert!(pair[0].start_index < pair[1].start_index);
            let same_chunk = pair[0].start_index / cfg.chunk_length as u64
                == pair[1].start_index / cfg.chunk_length as u64;
            if same_chunk {
                // 0.012 s at 1 kHz is 12 samples, three hops.
                assert!(pair[1].start_index - pair[0].start_index >= 12);
            }
        }
    }
}

#[test]
fn higher_threshold_clips_are_a_subset() {
    let samples = noise(3_000, 3);
    let collector = run_fragmented(&samples, &[1_000]);

    let low = collector.clips_for(0.6);
    let high = collector.clips_for(0.9);
    assert!(!high.is_empty());
    for clip in &high {
        assert!(
            low.iter().any(|c| c.start_index == clip.start_index),
            "clip at {} missing from the lower threshold",
            clip.start_index
        );
    }
}

#[test]
fn clips_of_one_chunk_are_emitted_threshold_by_threshold() {
    let samples = noise(97, 5);
    let collector = run_fragmented(&samples, &[97]);

    let thresholds: Vec<f32> = collector.clips.iter().map(|c| c.threshold).collect();
    let mut sorted = thresholds.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(thresholds, sorted);
}

#[test]
fn energy_scorer_finds_a_tone_burst_with_preset_settings() {
    let rate = 24_000u32;
    let settings = DetectorSettings {
        threshold: 0.25,
        ..DetectorSettings::tseep()
    };
    let config = settings
        .to_config(rate, &ClassifierSettings::default())
        .unwrap();
    assert_eq!(config.record_length, 3_600);
    assert_eq!(config.hop_length, 1_800);

    // 0.15 s, 5 kHz burst starting at 1.0 s in 2 s of silence.
    let mut samples = vec![0.0f32; 2 * rate as usize];
    for (i, s) in samples[24_000..27_600].iter_mut().enumerate() {
        *s = 0.05 * (2.0 * std::f32::consts::PI * 5_000.0 * i as f32 / rate as f32).sin();
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut detector = Detector::new(
        config,
        ScorerHandle::new(EnergyScorer::default()),
        ChannelListener::new(tx, 0, rate),
    )
    .unwrap();
    for block in samples.chunks(4_096) {
        detector.detect(block).unwrap();
    }
    detector.complete_detection().unwrap();

    let events: Vec<DetectionEvent> = rx.try_iter().collect();
    assert_eq!(events.len(), 2, "events: {events:?}");
    match &events[0] {
        DetectionEvent::Clip(clip) => {
            // Window 13 (23 400 .. 27 000) overlaps the burst most; the
            // clip starts 0.1 s earlier and lasts 0.4 s.
            assert_eq!(clip.start_index, 21_000);
            assert_eq!(clip.length, 9_600);
            assert!((clip.start_secs - 0.875).abs() < 1e-9);
        }
        other => panic!("expected a clip, got {other:?}"),
    }
    assert_eq!(events[1], DetectionEvent::Complete { channel: 0 });
    assert!(rx.recv_timeout(Duration::from_millis(10)).is_err());
}
