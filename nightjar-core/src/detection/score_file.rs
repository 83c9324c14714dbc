//! Detection score output for detector debugging.
//!
//! Writes a stereo 16-bit WAV file at the classifier sample rate:
//!
//! | Channel | Content                                                |
//! |---------|--------------------------------------------------------|
//! | 0       | detector input after resampling                        |
//! | 1       | score of the window starting at or before each sample, |
//! |         | multiplied by `scale_factor` and held for one hop       |
//!
//! Opening both channels in an audio editor lines scores up with the
//! audio that produced them. Output can be limited to a time range so that
//! long recordings do not produce huge files.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use crate::detection::settings::seconds_to_samples;
use crate::error::Result;

/// Streams `(samples, scores)` pairs into a stereo WAV file.
pub struct DetectionScoreWriter {
    writer: WavWriter<BufWriter<File>>,
    path: PathBuf,
    scale_factor: f32,
    hop_length: usize,
    /// First absolute classifier-rate sample written.
    start: u64,
    /// One past the last absolute classifier-rate sample written.
    end: Option<u64>,
    /// Absolute classifier-rate position of the next chunk.
    position: u64,
    frames_written: u64,
}

impl DetectionScoreWriter {
    /// Create the output file.
    ///
    /// `start_offset_secs` and `duration_secs` select the part of the stream
    /// that is written; `None` writes through to the end.
    pub fn create(
        path: impl AsRef<Path>,
        sample_rate: u32,
        hop_length: usize,
        scale_factor: f32,
        start_offset_secs: f64,
        duration_secs: Option<f64>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(&path, spec)?;
        let start = seconds_to_samples(start_offset_secs, sample_rate) as u64;
        let end = duration_secs.map(|d| start + seconds_to_samples(d, sample_rate) as u64);

        info!(path = %path.display(), sample_rate, start, ?end, "writing detection scores");

        Ok(Self {
            writer,
            path,
            scale_factor,
            hop_length: hop_length.max(1),
            start,
            end,
            position: 0,
            frames_written: 0,
        })
    }

    /// Append one chunk: its classifier-rate samples and its window scores.
    pub fn write(&mut self, samples: &[f32], scores: &[f32]) -> Result<()> {
        let chunk_start = self.position;
        self.position += samples.len() as u64;

        let from = self.start.max(chunk_start);
        let to = self.end.map_or(self.position, |end| end.min(self.position));
        if from >= to {
            return Ok(());
        }

        for abs in from..to {
            let j = (abs - chunk_start) as usize;
            let score = scores.get(j / self.hop_length).copied().unwrap_or(0.0);
            self.writer.write_sample(to_i16(samples[j] * 32767.0))?;
            self.writer
                .write_sample(to_i16(score * self.scale_factor))?;
            self.frames_written += 1;
        }
        Ok(())
    }

    /// Flush and close the file.
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize()?;
        info!(
            path = %self.path.display(),
            frames = self.frames_written,
            "detection score file closed"
        );
        Ok(())
    }
}

fn to_i16(value: f32) -> i16 {
    value.round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nightjar-{}-{name}.wav", std::process::id()))
    }

    fn read_frames(path: &Path) -> Vec<(i16, i16)> {
        let mut reader = hound::WavReader::open(path).expect("open score file");
        assert_eq!(reader.spec().channels, 2);
        let samples: Vec<i16> = reader
            .samples::<i16>()
            .collect::<std::result::Result<_, _>>()
            .expect("read samples");
        samples.chunks_exact(2).map(|f| (f[0], f[1])).collect()
    }

    #[test]
    fn scores_are_held_for_one_hop() {
        let path = temp_path("hold");
        let mut writer = DetectionScoreWriter::create(&path, 1_000, 2, 100.0, 0.0, None).unwrap();
        writer.write(&[0.0; 6], &[0.1, 0.5]).unwrap();
        writer.finalize().unwrap();

        let scores: Vec<i16> = read_frames(&path).iter().map(|f| f.1).collect();
        assert_eq!(scores, vec![10, 10, 50, 50, 0, 0]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn output_is_limited_to_requested_range_across_chunks() {
        let path = temp_path("range");
        // start at sample 3, write 4 samples
        let mut writer =
            DetectionScoreWriter::create(&path, 1_000, 1, 1.0, 0.003, Some(0.004)).unwrap();
        let ramp: Vec<f32> = (0..5).map(|i| i as f32 / 32767.0).collect();
        writer.write(&ramp, &[]).unwrap();
        let ramp2: Vec<f32> = (5..10).map(|i| i as f32 / 32767.0).collect();
        writer.write(&ramp2, &[]).unwrap();
        writer.finalize().unwrap();

        let audio: Vec<i16> = read_frames(&path).iter().map(|f| f.0).collect();
        assert_eq!(audio, vec![3, 4, 5, 6]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn large_values_saturate() {
        assert_eq!(to_i16(1e9), i16::MAX);
        assert_eq!(to_i16(-1e9), i16::MIN);
    }
}
