//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use crate::audio::GateConfig;
use crate::engine::EngineConfig;
use crate::interval::IntervalConfig;
use crate::session::CaptureConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

pub use defaults::{
    default_vad_engine, DEFAULT_CAPTURE_CHANNEL_CAPACITY, DEFAULT_CAPTURE_TARGET_MS,
    DEFAULT_CHANNELS, DEFAULT_CLIPS_DIR, DEFAULT_FRAME_MS, DEFAULT_IDLE_BACKOFF_MS,
    DEFAULT_LISTEN_TIMEOUT_MS, DEFAULT_MAX_GAIN, DEFAULT_MAX_INTERVAL_MS, DEFAULT_MIN_GAIN,
    DEFAULT_MIN_INTERVAL_MS, DEFAULT_SAMPLE_RATE, DEFAULT_SILENCE_TAIL_MS,
    DEFAULT_VAD_AGGRESSIVENESS, DEFAULT_VAD_THRESHOLD_DB, MAX_CHANNELS,
};

/// CLI options for the murmur soundscape engine.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "murmur",
    about = "murmur - generative soundscape that plays clips and records new ones",
    author,
    version
)]
pub struct AppConfig {
    /// Directory holding the starting WAV clips
    #[arg(long = "clips-dir", env = "MURMUR_CLIPS_DIR", default_value = DEFAULT_CLIPS_DIR)]
    pub clips_dir: PathBuf,

    /// Where new recordings are written (defaults to --clips-dir)
    #[arg(long = "recordings-dir", env = "MURMUR_RECORDINGS_DIR")]
    pub recordings_dir: Option<PathBuf>,

    /// Number of simultaneous playback channels
    #[arg(long, default_value_t = DEFAULT_CHANNELS)]
    pub channels: usize,

    /// Preferred audio input device name
    #[arg(long = "input-device", env = "MURMUR_INPUT_DEVICE")]
    pub input_device: Option<String>,

    /// Preferred audio output device name
    #[arg(long = "output-device", env = "MURMUR_OUTPUT_DEVICE")]
    pub output_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Print detected audio output devices and exit
    #[arg(long = "list-output-devices", default_value_t = false)]
    pub list_output_devices: bool,

    /// Capture sample rate (Hz)
    #[arg(long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Capture frame size (milliseconds)
    #[arg(long = "frame-ms", default_value_t = DEFAULT_FRAME_MS)]
    pub frame_ms: u64,

    /// Buffered audio that completes a recording (milliseconds)
    #[arg(long = "capture-target-ms", default_value_t = DEFAULT_CAPTURE_TARGET_MS)]
    pub capture_target_ms: u64,

    /// Trailing silence that discards a recording (milliseconds)
    #[arg(long = "silence-tail-ms", default_value_t = DEFAULT_SILENCE_TAIL_MS)]
    pub silence_tail_ms: u64,

    /// Stop listening if no speech starts within this time (0 = wait indefinitely)
    #[arg(long = "listen-timeout-ms", default_value_t = DEFAULT_LISTEN_TIMEOUT_MS)]
    pub listen_timeout_ms: u64,

    /// Shortest playback excerpt (milliseconds)
    #[arg(long = "min-interval-ms", default_value_t = DEFAULT_MIN_INTERVAL_MS)]
    pub min_interval_ms: u64,

    /// Longest playback excerpt (milliseconds)
    #[arg(long = "max-interval-ms", default_value_t = DEFAULT_MAX_INTERVAL_MS)]
    pub max_interval_ms: u64,

    /// Lowest gain applied to an excerpt
    #[arg(long = "min-gain", default_value_t = DEFAULT_MIN_GAIN, allow_hyphen_values = true)]
    pub min_gain: f32,

    /// Highest gain applied to an excerpt
    #[arg(long = "max-gain", default_value_t = DEFAULT_MAX_GAIN, allow_hyphen_values = true)]
    pub max_gain: f32,

    /// Voice activity detector implementation to use
    #[arg(long = "vad-engine", value_enum, default_value_t = default_vad_engine())]
    pub vad_engine: VadEngineKind,

    /// Earshot aggressiveness: 0 (permissive) to 3 (strict)
    #[arg(long = "vad-aggressiveness", default_value_t = DEFAULT_VAD_AGGRESSIVENESS)]
    pub vad_aggressiveness: u8,

    /// Energy threshold for the simple detector (decibels)
    #[arg(
        long = "vad-threshold-db",
        default_value_t = DEFAULT_VAD_THRESHOLD_DB,
        allow_hyphen_values = true
    )]
    pub vad_threshold_db: f32,

    /// Frames buffered between the audio callback and the recorder
    #[arg(long = "capture-channel-capacity", default_value_t = DEFAULT_CAPTURE_CHANNEL_CAPACITY)]
    pub capture_channel_capacity: usize,

    /// Pause after a cycle where nothing could play (milliseconds)
    #[arg(long = "idle-backoff-ms", default_value_t = DEFAULT_IDLE_BACKOFF_MS)]
    pub idle_backoff_ms: u64,

    /// Allow recording while the clip pool is empty
    #[arg(long = "bootstrap-capture", default_value_t = false)]
    pub bootstrap_capture: bool,

    /// Write JSON trace logs to MURMUR_TRACE_LOG
    #[arg(long = "logs", env = "MURMUR_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "MURMUR_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Log per-cycle detail
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}

/// Available runtime-selectable VAD implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VadEngineKind {
    Earshot,
    Simple,
}

impl VadEngineKind {
    pub fn label(self) -> &'static str {
        match self {
            VadEngineKind::Earshot => "earshot",
            VadEngineKind::Simple => "simple",
        }
    }
}

impl AppConfig {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.sample_rate,
            frame_ms: self.frame_ms,
            target_ms: self.capture_target_ms,
            silence_tail_ms: self.silence_tail_ms,
            listen_timeout_ms: self.listen_timeout_ms,
        }
    }

    pub fn interval_config(&self) -> IntervalConfig {
        IntervalConfig {
            min_duration_secs: self.min_interval_ms as f64 / 1000.0,
            max_duration_secs: self.max_interval_ms as f64 / 1000.0,
            min_gain: self.min_gain,
            max_gain: self.max_gain,
        }
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            kind: self.vad_engine,
            sample_rate: self.sample_rate,
            frame_ms: self.frame_ms,
            aggressiveness: self.vad_aggressiveness,
            threshold_db: self.vad_threshold_db,
        }
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(cfg: &AppConfig) -> Self {
        EngineConfig {
            channels: cfg.channels,
            interval: cfg.interval_config(),
            capture: cfg.capture_config(),
            gate: cfg.gate_config(),
            idle_backoff: Duration::from_millis(cfg.idle_backoff_ms),
            bootstrap_capture: cfg.bootstrap_capture,
        }
    }
}
