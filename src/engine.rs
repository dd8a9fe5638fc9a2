//! Top-level orchestration: shared state, channel threads, lifecycle.

use crate::audio::{gate_factory, CaptureDevice, GateConfig, GateFactory, PlaybackDevice};
use crate::coordinator::CaptureCoordinator;
use crate::error::StorageError;
use crate::interval::IntervalConfig;
use crate::player::{ChannelContext, ChannelPlayer};
use crate::pool::{ChannelId, ClipPool, ClipSource};
use crate::session::CaptureConfig;
use crate::shutdown::{shutdown_pair, ShutdownTrigger};
use crate::storage::ClipStorage;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Typed runtime settings, built from the CLI or directly in tests.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub channels: usize,
    pub interval: IntervalConfig,
    pub capture: CaptureConfig,
    pub gate: GateConfig,
    /// Pause after a cycle in which nothing played.
    pub idle_backoff: Duration,
    /// Let channels record while the pool is still empty.
    pub bootstrap_capture: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            interval: IntervalConfig::default(),
            capture: CaptureConfig::default(),
            gate: GateConfig::default(),
            idle_backoff: Duration::from_millis(100),
            bootstrap_capture: false,
        }
    }
}

/// Hardware and persistence the engine drives. All shared across channels.
#[derive(Clone)]
pub struct EngineDevices {
    pub playback: Arc<dyn PlaybackDevice>,
    pub capture: Arc<dyn CaptureDevice>,
    pub storage: Arc<dyn ClipStorage>,
    /// Each capture session gets a fresh gate from here.
    pub gate_factory: GateFactory,
}

impl EngineDevices {
    /// Devices with the gate described by `gate`.
    pub fn new(
        playback: Arc<dyn PlaybackDevice>,
        capture: Arc<dyn CaptureDevice>,
        storage: Arc<dyn ClipStorage>,
        gate: &GateConfig,
    ) -> Self {
        Self {
            playback,
            capture,
            storage,
            gate_factory: gate_factory(gate.clone()),
        }
    }
}

pub struct SoundscapeEngine {
    config: Arc<EngineConfig>,
    devices: EngineDevices,
    pool: Arc<ClipPool>,
    coordinator: Arc<CaptureCoordinator>,
    seed: Option<u64>,
}

impl SoundscapeEngine {
    pub fn new(config: EngineConfig, devices: EngineDevices) -> Self {
        Self {
            config: Arc::new(config),
            devices,
            pool: Arc::new(ClipPool::new()),
            coordinator: Arc::new(CaptureCoordinator::new()),
            seed: None,
        }
    }

    pub fn with_clips(self, clips: impl IntoIterator<Item = ClipSource>) -> Self {
        for clip in clips {
            self.pool.append(clip);
        }
        self
    }

    /// Seed every channel's generator; channel N uses `seed + N`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Append whatever the storage lists at startup. Returns how many clips
    /// were added.
    pub fn load_initial_clips(&self) -> Result<usize, StorageError> {
        let clips = self.devices.storage.list_initial_clips()?;
        let count = clips.len();
        for clip in clips {
            self.pool.append(clip);
        }
        tracing::info!(clips = count, "initial clips loaded");
        Ok(count)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<ClipPool> {
        &self.pool
    }

    pub fn coordinator(&self) -> &Arc<CaptureCoordinator> {
        &self.coordinator
    }

    /// Spawn one thread per channel. The engine keeps running until the
    /// returned handle is stopped or dropped.
    pub fn start(&self) -> Result<RunningEngine> {
        if self.config.channels == 0 {
            bail!("engine needs at least one channel");
        }
        if self.pool.is_empty() && !self.config.bootstrap_capture {
            tracing::warn!("clip pool is empty; channels stay silent until a clip appears");
        }

        let (trigger, shutdown) = shutdown_pair();
        let mut running = RunningEngine {
            trigger,
            threads: Vec::with_capacity(self.config.channels),
            coordinator: Arc::clone(&self.coordinator),
        };
        let ctx = ChannelContext {
            pool: Arc::clone(&self.pool),
            coordinator: Arc::clone(&self.coordinator),
            devices: self.devices.clone(),
            config: Arc::clone(&self.config),
        };

        for index in 0..self.config.channels {
            let id = ChannelId(index);
            let mut player = ChannelPlayer::new(id, ctx.clone(), shutdown.clone());
            if let Some(seed) = self.seed {
                player = player.with_seed(seed.wrapping_add(index as u64));
            }
            // An early return drops `running`, which joins what was spawned.
            let handle = thread::Builder::new()
                .name(id.to_string())
                .spawn(move || player.run())
                .with_context(|| format!("failed to spawn {id}"))?;
            running.threads.push(handle);
        }

        tracing::info!(
            channels = self.config.channels,
            clips = self.pool.len(),
            "soundscape engine started"
        );
        Ok(running)
    }
}

/// Live engine. Stops and joins every channel on [`stop`](Self::stop) or drop.
pub struct RunningEngine {
    trigger: ShutdownTrigger,
    threads: Vec<JoinHandle<()>>,
    coordinator: Arc<CaptureCoordinator>,
}

impl RunningEngine {
    pub fn channels(&self) -> usize {
        self.threads.len()
    }

    /// Signal shutdown and wait for every channel. Errors if any channel
    /// panicked; the others are still joined.
    pub fn stop(mut self) -> Result<()> {
        let panicked = self.shutdown_and_join();
        if panicked > 0 {
            bail!("{panicked} channel thread(s) panicked");
        }
        Ok(())
    }

    fn shutdown_and_join(&mut self) -> usize {
        if self.threads.is_empty() {
            return 0;
        }
        self.trigger.fire();
        let mut panicked = 0;
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("channel").to_string();
            if handle.join().is_err() {
                tracing::warn!(thread = %name, "channel thread panicked");
                panicked += 1;
            }
        }
        tracing::info!(
            capture_busy = self.coordinator.is_busy(),
            "soundscape engine stopped"
        );
        panicked
    }
}

impl Drop for RunningEngine {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStorage, RecordingPlayback, ScriptedCapture};

    fn devices(storage: MemoryStorage) -> EngineDevices {
        EngineDevices::new(
            Arc::new(RecordingPlayback::new()),
            Arc::new(ScriptedCapture::new([])),
            Arc::new(storage),
            &GateConfig::default(),
        )
    }

    #[test]
    fn load_initial_clips_appends_storage_listing() {
        let storage = MemoryStorage::new([
            ClipSource::new("/clips/a.wav", 2.0),
            ClipSource::new("/clips/b.wav", 3.0),
        ]);
        let engine = SoundscapeEngine::new(EngineConfig::default(), devices(storage))
            .with_clips([ClipSource::new("/clips/z.wav", 1.0)]);
        assert_eq!(engine.load_initial_clips().unwrap(), 2);
        let labels: Vec<String> = engine.pool().all().iter().map(|c| c.label()).collect();
        assert_eq!(labels, ["z.wav", "a.wav", "b.wav"]);
    }

    #[test]
    fn zero_channels_is_rejected() {
        let config = EngineConfig {
            channels: 0,
            ..EngineConfig::default()
        };
        let engine = SoundscapeEngine::new(config, devices(MemoryStorage::default()));
        assert!(engine.start().is_err());
    }

    #[test]
    fn start_spawns_named_channels_and_stop_joins_them() {
        let config = EngineConfig {
            channels: 3,
            idle_backoff: Duration::from_millis(1),
            ..EngineConfig::default()
        };
        let engine = SoundscapeEngine::new(config, devices(MemoryStorage::default()));
        let running = engine.start().unwrap();
        assert_eq!(running.channels(), 3);
        running.stop().unwrap();
        assert!(!engine.coordinator().is_busy());
    }
}
