use super::VadEngineKind;

pub const DEFAULT_CLIPS_DIR: &str = "clips";
pub const DEFAULT_CHANNELS: usize = 4;
pub const MAX_CHANNELS: usize = 32;

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_FRAME_MS: u64 = 30;
pub const DEFAULT_CAPTURE_TARGET_MS: u64 = 10_000;
pub const DEFAULT_SILENCE_TAIL_MS: u64 = 3_000;
pub const DEFAULT_LISTEN_TIMEOUT_MS: u64 = 0;
pub const MAX_CAPTURE_HARD_LIMIT_MS: u64 = 60_000;

pub const DEFAULT_MIN_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_MIN_GAIN: f32 = 0.7;
pub const DEFAULT_MAX_GAIN: f32 = 1.0;
/// Boost ceiling for `--max-gain`; the mixer clamps the sum anyway.
pub const MAX_GAIN_LIMIT: f32 = 4.0;

pub const DEFAULT_VAD_AGGRESSIVENESS: u8 = 1;
pub const DEFAULT_VAD_THRESHOLD_DB: f32 = -40.0;
pub const DEFAULT_CAPTURE_CHANNEL_CAPACITY: usize = 64;
pub const DEFAULT_IDLE_BACKOFF_MS: u64 = 100;

/// Frame sizes the earshot detector accepts at 16 kHz.
pub const EARSHOT_FRAME_MS: [u64; 3] = [10, 20, 30];

pub const MAX_DEVICE_NAME_LEN: usize = 256;

pub fn default_vad_engine() -> VadEngineKind {
    if cfg!(feature = "vad_earshot") {
        VadEngineKind::Earshot
    } else {
        VadEngineKind::Simple
    }
}
