use super::defaults::{
    EARSHOT_FRAME_MS, MAX_CAPTURE_HARD_LIMIT_MS, MAX_DEVICE_NAME_LEN, MAX_GAIN_LIMIT,
};
use super::{AppConfig, VadEngineKind, MAX_CHANNELS};
use crate::audio::TARGET_RATE;
use anyhow::{bail, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize device names.
    pub fn validate(&mut self) -> Result<()> {
        if !(1..=MAX_CHANNELS).contains(&self.channels) {
            bail!(
                "--channels must be between 1 and {MAX_CHANNELS}, got {}",
                self.channels
            );
        }

        if !(8_000..=48_000).contains(&self.sample_rate) {
            bail!(
                "--sample-rate must be between 8000 and 48000 Hz, got {}",
                self.sample_rate
            );
        }
        if !(5..=120).contains(&self.frame_ms) {
            bail!(
                "--frame-ms must be between 5 and 120, got {}",
                self.frame_ms
            );
        }
        if self.capture_target_ms < self.frame_ms
            || self.capture_target_ms > MAX_CAPTURE_HARD_LIMIT_MS
        {
            bail!(
                "--capture-target-ms must be between --frame-ms ({}) and {MAX_CAPTURE_HARD_LIMIT_MS} ms, got {}",
                self.frame_ms,
                self.capture_target_ms
            );
        }
        if self.silence_tail_ms < self.frame_ms
            || self.silence_tail_ms > MAX_CAPTURE_HARD_LIMIT_MS
        {
            bail!(
                "--silence-tail-ms must be between --frame-ms ({}) and {MAX_CAPTURE_HARD_LIMIT_MS} ms, got {}",
                self.frame_ms,
                self.silence_tail_ms
            );
        }
        if self.listen_timeout_ms > 0 && self.listen_timeout_ms < self.frame_ms {
            bail!(
                "--listen-timeout-ms must be 0 or at least --frame-ms ({}), got {}",
                self.frame_ms,
                self.listen_timeout_ms
            );
        }

        if self.min_interval_ms == 0 {
            bail!("--min-interval-ms must be greater than 0");
        }
        if self.max_interval_ms < self.min_interval_ms {
            bail!(
                "--max-interval-ms ({}) cannot be less than --min-interval-ms ({})",
                self.max_interval_ms,
                self.min_interval_ms
            );
        }
        if !self.min_gain.is_finite() || !self.max_gain.is_finite() {
            bail!("--min-gain and --max-gain must be finite numbers");
        }
        if self.min_gain < 0.0
            || self.max_gain > MAX_GAIN_LIMIT
            || self.min_gain > self.max_gain
        {
            bail!(
                "gain range must satisfy 0.0 <= --min-gain <= --max-gain <= {MAX_GAIN_LIMIT}, got {}..{}",
                self.min_gain,
                self.max_gain
            );
        }

        if self.vad_aggressiveness > 3 {
            bail!(
                "--vad-aggressiveness must be between 0 and 3, got {}",
                self.vad_aggressiveness
            );
        }
        if !(-120.0..=0.0).contains(&self.vad_threshold_db) {
            bail!(
                "--vad-threshold-db must be between -120.0 and 0.0 dB, got {}",
                self.vad_threshold_db
            );
        }

        #[cfg(not(feature = "vad_earshot"))]
        if matches!(self.vad_engine, VadEngineKind::Earshot) {
            bail!("--vad-engine earshot requires building with the 'vad_earshot' feature");
        }
        if matches!(self.vad_engine, VadEngineKind::Earshot) {
            if self.sample_rate != TARGET_RATE {
                bail!(
                    "--vad-engine earshot requires --sample-rate {TARGET_RATE}, got {}",
                    self.sample_rate
                );
            }
            if !EARSHOT_FRAME_MS.contains(&self.frame_ms) {
                bail!(
                    "--vad-engine earshot requires --frame-ms of 10, 20, or 30, got {}",
                    self.frame_ms
                );
            }
        }

        if !(8..=1024).contains(&self.capture_channel_capacity) {
            bail!(
                "--capture-channel-capacity must be between 8 and 1024, got {}",
                self.capture_channel_capacity
            );
        }
        if self.idle_backoff_ms > 10_000 {
            bail!(
                "--idle-backoff-ms must be at most 10000, got {}",
                self.idle_backoff_ms
            );
        }

        self.input_device = sanitize_device(self.input_device.take(), "--input-device")?;
        self.output_device = sanitize_device(self.output_device.take(), "--output-device")?;

        Ok(())
    }
}

/// Trim a device name; blank means "use the default device".
pub(super) fn sanitize_device(value: Option<String>, flag: &str) -> Result<Option<String>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_DEVICE_NAME_LEN || trimmed.chars().any(char::is_control) {
        bail!("{flag} must be <={MAX_DEVICE_NAME_LEN} characters with no control characters");
    }
    Ok(Some(trimmed.to_string()))
}
