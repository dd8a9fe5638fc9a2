//! Audio I/O: frames, voice gates, microphone capture, and clip playback.
//!
//! Capture normalizes whatever the input device delivers into mono 16-bit
//! frames at the session rate. Playback decodes WAV clips, resamples them to
//! the output rate, and mixes every active excerpt in the cpal callback.

/// Sample rate the voice gates and recordings use by default.
pub const TARGET_RATE: u32 = 16_000;

mod capture;
mod decode;
mod dispatch;
mod frame;
mod playback;
mod resample;
mod vad;

pub use capture::{CaptureDevice, CpalCapture, FrameStream};
pub use decode::{decode_wav, wav_duration_secs, DecodedClip};
pub use frame::{samples_per_frame, AudioFrame};
pub use playback::{ClipHandle, CpalMixer, OutputStream, PlaybackDevice};
pub use vad::{build_gate, gate_factory, EnergyGate, GateConfig, GateFactory, VoiceActivityGate};
