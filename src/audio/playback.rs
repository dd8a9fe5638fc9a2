//! Output side: the playback contract and a CPAL mixer that renders every
//! channel's excerpt into one output stream.

use super::decode::decode_wav;
use super::resample::resample;
use crate::error::DeviceError;
use crate::interval::PlaybackInterval;
use crate::lock_or_recover;
use crate::pool::ClipSource;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Opaque reference to a clip loaded into a playback device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipHandle(u64);

impl ClipHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Renders labeled time ranges of loaded clips.
///
/// `play_range` starts rendering and returns; the caller owns the wall-clock
/// wait and calls `stop` when the range is over (or on shutdown).
pub trait PlaybackDevice: Send + Sync {
    fn load(&self, clip: &ClipSource) -> Result<ClipHandle, DeviceError>;
    fn play_range(
        &self,
        handle: ClipHandle,
        interval: &PlaybackInterval,
    ) -> Result<(), DeviceError>;
    /// Stop rendering and release the loaded clip. Unknown handles are ignored.
    fn stop(&self, handle: ClipHandle);
}

struct Voice {
    handle: u64,
    samples: Arc<[f32]>,
    cursor: usize,
    end: usize,
    gain: f32,
}

/// Loaded clips and active voices, shared with the output callback.
#[derive(Default)]
pub(crate) struct MixerState {
    output_rate: u32,
    next_handle: u64,
    loaded: HashMap<u64, Arc<[f32]>>,
    voices: Vec<Voice>,
}

impl MixerState {
    pub(crate) fn new(output_rate: u32) -> Self {
        Self {
            output_rate,
            ..Self::default()
        }
    }

    pub(crate) fn insert(&mut self, samples: Arc<[f32]>) -> ClipHandle {
        self.next_handle += 1;
        self.loaded.insert(self.next_handle, samples);
        ClipHandle(self.next_handle)
    }

    pub(crate) fn start_voice(
        &mut self,
        handle: ClipHandle,
        interval: &PlaybackInterval,
    ) -> Result<(), DeviceError> {
        let samples = self
            .loaded
            .get(&handle.0)
            .cloned()
            .ok_or(DeviceError::UnknownHandle(handle.0))?;
        let rate = f64::from(self.output_rate);
        let start = ((interval.start_secs * rate) as usize).min(samples.len());
        let end = ((interval.end_secs() * rate).ceil() as usize).clamp(start, samples.len());
        self.voices.retain(|v| v.handle != handle.0);
        self.voices.push(Voice {
            handle: handle.0,
            samples,
            cursor: start,
            end,
            gain: interval.gain,
        });
        Ok(())
    }

    pub(crate) fn release(&mut self, handle: ClipHandle) {
        self.voices.retain(|v| v.handle != handle.0);
        self.loaded.remove(&handle.0);
    }

    pub(crate) fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Sum every active voice into `out` (mono) and retire finished ones.
    pub(crate) fn mix_into(&mut self, out: &mut [f32]) {
        out.iter_mut().for_each(|s| *s = 0.0);
        for voice in self.voices.iter_mut() {
            let available = voice.end.saturating_sub(voice.cursor);
            let count = available.min(out.len());
            let span = &voice.samples[voice.cursor..voice.cursor + count];
            for (slot, sample) in out.iter_mut().zip(span) {
                *slot += sample * voice.gain;
            }
            voice.cursor += count;
        }
        self.voices.retain(|v| v.cursor < v.end);
        out.iter_mut().for_each(|s| *s = s.clamp(-1.0, 1.0));
    }
}

/// Keeps the cpal output stream alive; playback stops when dropped.
pub struct OutputStream {
    _stream: cpal::Stream,
}

/// Software mixer feeding a single cpal output stream.
pub struct CpalMixer {
    state: Arc<Mutex<MixerState>>,
    output_rate: u32,
}

impl CpalMixer {
    pub fn list_devices() -> Result<Vec<String>, DeviceError> {
        let host = cpal::default_host();
        let devices = host.output_devices().map_err(DeviceError::backend)?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// Open the output device and start the (initially silent) stream.
    ///
    /// The returned [`OutputStream`] must stay on the calling thread and be
    /// kept alive for as long as the mixer is in use.
    pub fn open(preferred_device: Option<&str>) -> Result<(Arc<Self>, OutputStream), DeviceError> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => host
                .output_devices()
                .map_err(DeviceError::backend)?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| DeviceError::NotFound {
                    name: name.to_string(),
                })?,
            None => host.default_output_device().ok_or(DeviceError::NoDefault {
                direction: "output",
            })?,
        };
        let default_config = device
            .default_output_config()
            .map_err(DeviceError::backend)?;
        let format = default_config.sample_format();
        let config: StreamConfig = default_config.into();
        let output_rate = config.sample_rate.0;
        let channels = usize::from(config.channels.max(1));
        tracing::info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            ?format,
            output_rate,
            channels,
            "output stream ready"
        );

        let state = Arc::new(Mutex::new(MixerState::new(output_rate)));
        let err_fn = |err| tracing::warn!(error = %err, "output stream error");
        let stream = match format {
            SampleFormat::F32 => {
                let state = state.clone();
                let mut scratch = Vec::new();
                device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _| {
                        render(&state, &mut scratch, data, channels, |s| s);
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let state = state.clone();
                let mut scratch = Vec::new();
                device.build_output_stream(
                    &config,
                    move |data: &mut [i16], _| {
                        render(&state, &mut scratch, data, channels, |s| {
                            (s * f32::from(i16::MAX)) as i16
                        });
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let state = state.clone();
                let mut scratch = Vec::new();
                device.build_output_stream(
                    &config,
                    move |data: &mut [u16], _| {
                        render(&state, &mut scratch, data, channels, |s| {
                            ((s + 1.0) * 32_767.5) as u16
                        });
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

        Ok((
            Arc::new(Self { state, output_rate }),
            OutputStream { _stream: stream },
        ))
    }
}

/// Output callback body. Never blocks the audio thread: if the mixer state
/// is busy this period renders silence.
fn render<T>(
    state: &Mutex<MixerState>,
    scratch: &mut Vec<f32>,
    data: &mut [T],
    channels: usize,
    convert: impl Fn(f32) -> T,
) where
    T: Copy,
{
    let frames = data.len() / channels.max(1);
    scratch.clear();
    scratch.resize(frames, 0.0);
    if let Ok(mut mixer) = state.try_lock() {
        mixer.mix_into(scratch);
    }
    for (frame, &sample) in data.chunks_mut(channels.max(1)).zip(scratch.iter()) {
        let value = convert(sample);
        frame.iter_mut().for_each(|slot| *slot = value);
    }
}

impl PlaybackDevice for CpalMixer {
    fn load(&self, clip: &ClipSource) -> Result<ClipHandle, DeviceError> {
        // Decode and resample outside the lock; the callback shares it.
        let decoded = decode_wav(clip.path())?;
        let samples: Arc<[f32]> =
            resample(&decoded.samples, decoded.sample_rate, self.output_rate).into();
        Ok(lock_or_recover(&self.state, "mixer load").insert(samples))
    }

    fn play_range(
        &self,
        handle: ClipHandle,
        interval: &PlaybackInterval,
    ) -> Result<(), DeviceError> {
        lock_or_recover(&self.state, "mixer play").start_voice(handle, interval)
    }

    fn stop(&self, handle: ClipHandle) {
        lock_or_recover(&self.state, "mixer stop").release(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(start_secs: f64, duration_secs: f64, gain: f32) -> PlaybackInterval {
        PlaybackInterval {
            start_secs,
            duration_secs,
            gain,
        }
    }

    #[test]
    fn mixer_sums_voices_with_gain() {
        let mut mixer = MixerState::new(10);
        let a = mixer.insert(vec![0.5; 20].into());
        let b = mixer.insert(vec![0.25; 20].into());
        mixer.start_voice(a, &interval(0.0, 1.0, 1.0)).unwrap();
        mixer.start_voice(b, &interval(0.0, 1.0, 0.5)).unwrap();
        let mut out = vec![0.0; 4];
        mixer.mix_into(&mut out);
        assert!(out.iter().all(|s| (s - 0.625).abs() < 1e-6));
    }

    #[test]
    fn mixer_retires_voice_at_interval_end() {
        let mut mixer = MixerState::new(10);
        let handle = mixer.insert((0..30).map(|i| i as f32 / 100.0).collect::<Vec<_>>().into());
        mixer.start_voice(handle, &interval(1.0, 0.5, 1.0)).unwrap();
        let mut out = vec![0.0; 8];
        mixer.mix_into(&mut out);
        assert!((out[0] - 0.10).abs() < 1e-6);
        assert!((out[4] - 0.14).abs() < 1e-6);
        assert_eq!(out[5], 0.0);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn mixer_clamps_hot_mix() {
        let mut mixer = MixerState::new(10);
        for _ in 0..4 {
            let h = mixer.insert(vec![0.9; 10].into());
            mixer.start_voice(h, &interval(0.0, 1.0, 1.0)).unwrap();
        }
        let mut out = vec![0.0; 2];
        mixer.mix_into(&mut out);
        assert_eq!(out, vec![1.0, 1.0]);
    }

    #[test]
    fn unknown_handle_is_rejected_and_release_is_idempotent() {
        let mut mixer = MixerState::new(10);
        let err = mixer
            .start_voice(ClipHandle::new(42), &interval(0.0, 1.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, DeviceError::UnknownHandle(42)));
        mixer.release(ClipHandle::new(42));
    }

    #[test]
    fn render_fans_mono_out_to_every_channel() {
        let state = Mutex::new(MixerState::new(10));
        {
            let mut mixer = state.lock().unwrap();
            let h = mixer.insert(vec![0.5; 10].into());
            mixer.start_voice(h, &interval(0.0, 1.0, 1.0)).unwrap();
        }
        let mut scratch = Vec::new();
        let mut data = vec![0.0f32; 6];
        render(&state, &mut scratch, &mut data, 2, |s| s);
        assert_eq!(data, vec![0.5; 6]);
    }
}
