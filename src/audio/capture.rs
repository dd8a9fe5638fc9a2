//! Microphone input: the frame-stream contract and its CPAL implementation.
//!
//! Whatever the hardware delivers (format, rate, channel count) is normalized
//! into mono i16 frames of exactly `sample_rate * frame_ms / 1000` samples.

use super::dispatch::FramePump;
use super::frame::{samples_per_frame, AudioFrame};
use super::resample::convert_frame;
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source of capture streams. Shared by every channel; at most one stream is
/// open at a time because only the coordinator's lease holder opens one.
pub trait CaptureDevice: Send + Sync {
    fn open(&self, sample_rate: u32, frame_ms: u64) -> Result<Box<dyn FrameStream>, DeviceError>;
}

/// An open capture stream. Dropping it releases the hardware.
pub trait FrameStream {
    /// Block until the next frame is available.
    fn read_frame(&mut self) -> Result<AudioFrame, DeviceError>;

    /// Frames lost because the reader fell behind the device.
    fn dropped_frames(&self) -> usize {
        0
    }
}

/// How long a read may wait before the device is considered stalled.
const READ_STALL_MS: u64 = 2_000;

/// CPAL-backed microphone.
pub struct CpalCapture {
    preferred_device: Option<String>,
    channel_capacity: usize,
}

impl CpalCapture {
    pub fn new(preferred_device: Option<String>, channel_capacity: usize) -> Self {
        Self {
            preferred_device,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>, DeviceError> {
        let host = cpal::default_host();
        let devices = host.input_devices().map_err(DeviceError::backend)?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    fn resolve_device(&self) -> Result<cpal::Device, DeviceError> {
        let host = cpal::default_host();
        match self.preferred_device.as_deref() {
            Some(name) => host
                .input_devices()
                .map_err(DeviceError::backend)?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| DeviceError::NotFound {
                    name: name.to_string(),
                }),
            None => host
                .default_input_device()
                .ok_or(DeviceError::NoDefault { direction: "input" }),
        }
    }
}

impl CaptureDevice for CpalCapture {
    fn open(&self, sample_rate: u32, frame_ms: u64) -> Result<Box<dyn FrameStream>, DeviceError> {
        let device = self.resolve_device()?;
        let default_config = device
            .default_input_config()
            .map_err(DeviceError::backend)?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let device_rate = device_config.sample_rate.0;
        let channels = usize::from(device_config.channels.max(1));
        let device_frame_samples = samples_per_frame(device_rate, frame_ms).max(1);

        tracing::debug!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            ?format,
            device_rate,
            channels,
            "opening capture stream"
        );

        let (sender, receiver) = bounded::<Vec<f32>>(self.channel_capacity);
        let dropped = Arc::new(AtomicUsize::new(0));
        let pump = Arc::new(Mutex::new(FramePump::new(
            device_frame_samples,
            sender,
            dropped.clone(),
        )));

        let err_fn = |err| tracing::warn!(error = %err, "capture stream error");
        let stream = match format {
            SampleFormat::F32 => {
                let pump = pump.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &device_config,
                    move |data: &[f32], _| match pump.try_lock() {
                        Ok(mut pump) => pump.push(data, channels, |sample| sample),
                        Err(_) => {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let pump = pump.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &device_config,
                    move |data: &[i16], _| match pump.try_lock() {
                        Ok(mut pump) => {
                            pump.push(data, channels, |sample| sample as f32 / 32_768.0)
                        }
                        Err(_) => {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let pump = pump.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &device_config,
                    move |data: &[u16], _| match pump.try_lock() {
                        Ok(mut pump) => pump.push(data, channels, |sample| {
                            (sample as f32 - 32_768.0) / 32_768.0
                        }),
                        Err(_) => {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(DeviceError::UnsupportedFormat {
                    format: format!("{other:?}"),
                })
            }
        }
        .map_err(DeviceError::backend)?;

        stream.play().map_err(DeviceError::backend)?;

        Ok(Box::new(CpalFrameStream {
            stream,
            receiver,
            dropped,
            device_rate,
            target_rate: sample_rate,
            target_frame_samples: samples_per_frame(sample_rate, frame_ms),
        }))
    }
}

struct CpalFrameStream {
    stream: cpal::Stream,
    receiver: Receiver<Vec<f32>>,
    dropped: Arc<AtomicUsize>,
    device_rate: u32,
    target_rate: u32,
    target_frame_samples: usize,
}

impl FrameStream for CpalFrameStream {
    fn read_frame(&mut self) -> Result<AudioFrame, DeviceError> {
        match self
            .receiver
            .recv_timeout(Duration::from_millis(READ_STALL_MS))
        {
            Ok(raw) => {
                let samples = convert_frame(
                    raw,
                    self.device_rate,
                    self.target_rate,
                    self.target_frame_samples,
                );
                Ok(AudioFrame::from_f32(&samples, self.target_rate))
            }
            Err(RecvTimeoutError::Timeout) => Err(DeviceError::Stalled {
                waited_ms: READ_STALL_MS,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(DeviceError::Disconnected),
        }
    }

    fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for CpalFrameStream {
    fn drop(&mut self) {
        if let Err(err) = self.stream.pause() {
            tracing::debug!(error = %err, "failed to pause capture stream");
        }
    }
}
