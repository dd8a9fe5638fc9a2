//! Error taxonomy for devices, frames, clip storage, and capture sessions.
//!
//! All of these are local failures: a device or storage error ends the current
//! play cycle or capture session and the owning channel carries on. Empty pools
//! and a busy coordinator are not errors at all and never show up here.

use crate::session::CaptureState;
use std::path::PathBuf;

/// Playback or capture hardware failed to open, read, or render.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("audio device not found: {name}")]
    NotFound { name: String },

    #[error("no default {direction} device configured")]
    NoDefault { direction: &'static str },

    #[error("unsupported sample format: {format}")]
    UnsupportedFormat { format: String },

    #[error("audio backend error: {0}")]
    Backend(String),

    #[error("audio stream disconnected")]
    Disconnected,

    #[error("no audio frame within {waited_ms} ms")]
    Stalled { waited_ms: u64 },

    #[error("failed to decode '{path}': {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("unknown clip handle {0}")]
    UnknownHandle(u64),
}

impl DeviceError {
    pub(crate) fn backend(err: impl std::fmt::Display) -> Self {
        DeviceError::Backend(err.to_string())
    }
}

/// A frame did not match the gate's exact sample-count contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("frame has {actual} samples at {actual_rate} Hz, want {expected} at {expected_rate} Hz")]
pub struct InvalidFrameError {
    pub expected: usize,
    pub actual: usize,
    pub expected_rate: u32,
    pub actual_rate: u32,
}

/// Listing or writing clip files failed.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read clip directory '{path}': {source}")]
    ListDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write recording '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("wav encoding failed for '{path}': {source}")]
    Wav { path: PathBuf, source: hound::Error },

    #[error("refusing to write an empty recording")]
    EmptyRecording,
}

/// Why a capture session ended without producing a clip.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    InvalidFrame(#[from] InvalidFrameError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("capture session is {} and has nothing to finalize", .0.label())]
    NotFinalizing(CaptureState),
}

impl CaptureError {
    pub fn label(&self) -> &'static str {
        match self {
            CaptureError::Device(_) => "device_error",
            CaptureError::InvalidFrame(_) => "invalid_frame",
            CaptureError::Storage(_) => "storage_error",
            CaptureError::NotFinalizing(_) => "not_finalizing",
        }
    }
}
