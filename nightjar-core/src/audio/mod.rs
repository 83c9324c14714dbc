//! Audio input: live capture via cpal, device enumeration and resampling.
//!
//! # Capture constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It must not block or perform I/O, so it only down-mixes to mono into a
//! reused scratch buffer and pushes into the SPSC ring producer, whose
//! `push_slice` is lock-free.
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `AudioCapture` must be created and dropped on the same thread; the
//! live engine does both inside its `spawn_blocking` worker.

pub mod device;
pub mod resample;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, Stream, StreamConfig,
};

use crate::{
    buffering::AudioProducer,
    error::{NightjarError, Result},
};
use std::sync::{atomic::AtomicBool, Arc};

#[cfg(feature = "audio-cpal")]
use crate::buffering::Producer;
#[cfg(feature = "audio-cpal")]
use std::sync::atomic::Ordering;
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Handle to an active audio capture stream.
///
/// **Not `Send`**: `cpal::Stream` is bound to its creation thread.
pub struct AudioCapture {
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Capture rate reported by the device (Hz). Clip indices of a live
    /// detector are expressed in this rate.
    pub sample_rate: u32,
}

impl AudioCapture {
    /// Open `preferred_device_name` if it exists, else the default input
    /// device, else the first input device, and start streaming mono samples
    /// into `producer`.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        producer: AudioProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        let device = select_input_device(preferred_device_name)?;
        let device_name = device.name().unwrap_or_default();

        let supported = device
            .default_input_config()
            .map_err(|e| NightjarError::AudioDevice(e.to_string()))?;
        let format = supported.sample_format();
        let config: StreamConfig = supported.config();
        let sample_rate = config.sample_rate.0;

        info!(
            device = %device_name,
            sample_rate,
            channels = config.channels,
            ?format,
            "opening input device"
        );

        let stream = match format {
            SampleFormat::F32 => build_mono_stream::<f32>(&device, &config, producer, running, |s| s),
            SampleFormat::I16 => build_mono_stream::<i16>(&device, &config, producer, running, |s| {
                f32::from(s) / 32_768.0
            }),
            SampleFormat::I32 => build_mono_stream::<i32>(&device, &config, producer, running, |s| {
                s as f32 / 2_147_483_648.0
            }),
            SampleFormat::U8 => build_mono_stream::<u8>(&device, &config, producer, running, |s| {
                (f32::from(s) - 128.0) / 128.0
            }),
            other => {
                return Err(NightjarError::AudioStream(format!(
                    "input sample format {other:?} is not supported"
                )))
            }
        }?;
        stream
            .play()
            .map_err(|e| NightjarError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            sample_rate,
        })
    }
}

#[cfg(feature = "audio-cpal")]
fn select_input_device(preferred: Option<&str>) -> Result<cpal::Device> {
    use cpal::traits::HostTrait;

    let host = cpal::default_host();

    if let Some(wanted) = preferred {
        let found = host
            .input_devices()
            .map_err(|e| warn!("failed to list input devices: {e}"))
            .ok()
            .and_then(|mut devices| devices.find(|d| d.name().is_ok_and(|n| n == wanted)));
        match found {
            Some(device) => return Ok(device),
            None => warn!("input device '{wanted}' not found, using the default"),
        }
    }

    if let Some(device) = host.default_input_device() {
        return Ok(device);
    }

    warn!("no default input device, trying the first available input");
    host.input_devices()
        .map_err(|e| NightjarError::AudioDevice(e.to_string()))?
        .next()
        .ok_or(NightjarError::NoDefaultInputDevice)
}

/// Build an input stream that down-mixes interleaved frames of any sample
/// type to mono f32 and pushes them into `producer`.
#[cfg(feature = "audio-cpal")]
fn build_mono_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: AudioProducer,
    running: Arc<AtomicBool>,
    to_f32: fn(T) -> f32,
) -> Result<Stream>
where
    T: cpal::SizedSample + Copy + 'static,
{
    let ch = usize::from(config.channels.max(1));
    let mut mix_buf: Vec<f32> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _info: &cpal::InputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                let frames = data.len() / ch;
                mix_buf.resize(frames, 0.0);
                for (f, frame) in data.chunks_exact(ch).enumerate() {
                    let sum: f32 = frame.iter().map(|&s| to_f32(s)).sum();
                    mix_buf[f] = sum / ch as f32;
                }
                let written = producer.push_slice(&mix_buf);
                if written < mix_buf.len() {
                    warn!("ring buffer full: dropped {} frames", mix_buf.len() - written);
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| NightjarError::AudioStream(e.to_string()))
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open_with_preference(
        _producer: AudioProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(NightjarError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }
}
