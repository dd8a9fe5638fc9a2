//! One output channel: play a random excerpt, then offer to record.

use crate::coordinator::CaptureCoordinator;
use crate::engine::{EngineConfig, EngineDevices};
use crate::interval::PlaybackInterval;
use crate::pool::{ChannelId, ClipPool, ClipSource};
use crate::session::{run_capture, CaptureOutcome, DiscardReason};
use crate::shutdown::Shutdown;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Everything a channel shares with its siblings.
#[derive(Clone)]
pub struct ChannelContext {
    pub pool: Arc<ClipPool>,
    pub coordinator: Arc<CaptureCoordinator>,
    pub devices: EngineDevices,
    pub config: Arc<EngineConfig>,
}

/// What the playback half of a cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    /// Every clip was playing elsewhere, or the pool is empty.
    Unavailable,
    /// The chosen clip has no audio; nothing was loaded.
    Silent { clip: Arc<ClipSource> },
    Played {
        clip: Arc<ClipSource>,
        interval: PlaybackInterval,
        /// Shutdown cut the excerpt short.
        interrupted: bool,
    },
    Failed {
        clip: Arc<ClipSource>,
        error: String,
    },
}

/// What the capture half of a cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureAttempt {
    /// No attempt: nothing played or the engine is stopping.
    Skipped,
    /// Another channel holds the capture lease.
    Busy,
    Completed(Arc<ClipSource>),
    Discarded(DiscardReason),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub play: PlayOutcome,
    pub capture: CaptureAttempt,
}

impl CycleReport {
    /// Nothing sounded this cycle; the channel backs off before retrying.
    pub fn played_nothing(&self) -> bool {
        !matches!(self.play, PlayOutcome::Played { .. })
    }
}

pub struct ChannelPlayer {
    id: ChannelId,
    ctx: ChannelContext,
    shutdown: Shutdown,
    rng: StdRng,
}

impl ChannelPlayer {
    pub fn new(id: ChannelId, ctx: ChannelContext, shutdown: Shutdown) -> Self {
        Self {
            id,
            ctx,
            shutdown,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic clip and interval choices.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Cycle until shutdown.
    pub fn run(mut self) {
        tracing::info!(channel = %self.id, "channel started");
        while !self.shutdown.is_triggered() {
            let report = self.cycle();
            if report.played_nothing() && !self.shutdown.wait(self.ctx.config.idle_backoff) {
                break;
            }
        }
        tracing::info!(channel = %self.id, "channel stopped");
    }

    /// One select, play, capture pass.
    pub fn cycle(&mut self) -> CycleReport {
        let play = self.play_once();
        let capture = match &play {
            PlayOutcome::Played {
                interrupted: false, ..
            } => self.try_capture(),
            PlayOutcome::Unavailable
                if self.ctx.config.bootstrap_capture && self.ctx.pool.is_empty() =>
            {
                self.try_capture()
            }
            _ => CaptureAttempt::Skipped,
        };
        CycleReport { play, capture }
    }

    fn play_once(&mut self) -> PlayOutcome {
        let Some(claim) = self.ctx.pool.claim(self.id, &mut self.rng) else {
            tracing::debug!(channel = %self.id, "no clip available");
            return PlayOutcome::Unavailable;
        };
        let clip = Arc::clone(claim.clip());
        let interval = PlaybackInterval::random(
            clip.duration_secs(),
            &self.ctx.config.interval,
            &mut self.rng,
        );
        if interval.is_silent() {
            tracing::debug!(channel = %self.id, clip = %clip.label(), "clip has no audio");
            return PlayOutcome::Silent { clip };
        }
        let playback = &self.ctx.devices.playback;

        let handle = match playback.load(&clip) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(
                    channel = %self.id,
                    clip = %clip.label(),
                    error = %err,
                    "clip load failed"
                );
                return PlayOutcome::Failed {
                    clip,
                    error: err.to_string(),
                };
            }
        };
        if let Err(err) = playback.play_range(handle, &interval) {
            playback.stop(handle);
            tracing::warn!(
                channel = %self.id,
                clip = %clip.label(),
                error = %err,
                "playback failed"
            );
            return PlayOutcome::Failed {
                clip,
                error: err.to_string(),
            };
        }
        tracing::debug!(
            channel = %self.id,
            clip = %clip.label(),
            start_secs = interval.start_secs,
            duration_secs = interval.duration_secs,
            gain = interval.gain,
            "playing excerpt"
        );

        let completed = self.shutdown.wait(interval.wall_time());
        playback.stop(handle);
        drop(claim);

        PlayOutcome::Played {
            clip,
            interval,
            interrupted: !completed,
        }
    }

    fn try_capture(&mut self) -> CaptureAttempt {
        if self.shutdown.is_triggered() {
            return CaptureAttempt::Skipped;
        }
        let Some(lease) = self.ctx.coordinator.try_begin() else {
            tracing::debug!(channel = %self.id, "capture busy elsewhere");
            return CaptureAttempt::Busy;
        };

        let mut gate = (self.ctx.devices.gate_factory)();
        tracing::debug!(channel = %self.id, gate = gate.name(), "capture listening");
        let result = run_capture(
            self.ctx.devices.capture.as_ref(),
            gate.as_mut(),
            self.ctx.devices.storage.as_ref(),
            &self.ctx.config.capture,
            &self.shutdown,
        );

        let attempt = match result {
            Ok(report) => match report.outcome {
                CaptureOutcome::Completed(clip) => {
                    let clip = self.ctx.pool.append(clip);
                    tracing::info!(
                        channel = %self.id,
                        clip = %clip.label(),
                        duration_secs = clip.duration_secs(),
                        frames = report.metrics.frames_processed,
                        speech_frames = report.metrics.speech_frames,
                        dropped_frames = report.metrics.frames_dropped,
                        pool_size = self.ctx.pool.len(),
                        "capture added to pool"
                    );
                    CaptureAttempt::Completed(clip)
                }
                CaptureOutcome::Discarded(reason) => {
                    tracing::info!(
                        channel = %self.id,
                        reason = reason.label(),
                        frames = report.metrics.frames_processed,
                        buffered_ms = report.metrics.buffered_ms,
                        "capture discarded"
                    );
                    CaptureAttempt::Discarded(reason)
                }
            },
            Err(err) => {
                tracing::warn!(
                    channel = %self.id,
                    kind = err.label(),
                    error = %err,
                    "capture failed"
                );
                CaptureAttempt::Failed(err.to_string())
            }
        };
        lease.end();
        attempt
    }
}
