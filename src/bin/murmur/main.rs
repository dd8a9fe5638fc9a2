//! murmur binary: wire the cpal devices and clip directory into the engine
//! and run until SIGINT or SIGTERM.

mod cli_utils;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use murmur::audio::{CpalCapture, CpalMixer};
use murmur::config::AppConfig;
use murmur::telemetry::init_tracing;
use murmur::{DirectoryStorage, EngineConfig, EngineDevices, SoundscapeEngine};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::cli_utils::{list_devices, Direction};
use crate::signals::{install_stop_handlers, stop_requested};

/// How often the main thread checks for a stop signal.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let mut config = AppConfig::parse();
    if config.list_input_devices {
        return list_devices(Direction::Input);
    }
    if config.list_output_devices {
        return list_devices(Direction::Output);
    }

    config.validate()?;
    init_tracing(&config);
    install_stop_handlers()?;

    let clips_dir = config.clips_dir.clone();
    if config.bootstrap_capture && !clips_dir.exists() {
        fs::create_dir_all(&clips_dir)
            .with_context(|| format!("failed to create clip directory {}", clips_dir.display()))?;
    }

    let engine_config = EngineConfig::from(&config);
    let storage = Arc::new(DirectoryStorage::new(
        config.clips_dir.clone(),
        config.recordings_dir.clone(),
    ));
    let (mixer, _output) =
        CpalMixer::open(config.output_device.as_deref()).context("failed to open audio output")?;
    let capture = Arc::new(CpalCapture::new(
        config.input_device.clone(),
        config.capture_channel_capacity,
    ));
    let devices = EngineDevices::new(mixer, capture, storage, &engine_config.gate);

    let engine = SoundscapeEngine::new(engine_config, devices);
    engine
        .load_initial_clips()
        .with_context(|| format!("failed to load clips from {}", clips_dir.display()))?;
    tracing::info!(
        clips_dir = %clips_dir.display(),
        vad_engine = config.vad_engine.label(),
        channels = config.channels,
        "murmur starting"
    );

    let running = engine.start()?;
    while !stop_requested() {
        thread::sleep(STOP_POLL_INTERVAL);
    }
    tracing::info!(clips = engine.pool().len(), "stop requested");
    running.stop()
}
