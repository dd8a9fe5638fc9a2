//! Voice-gated recording: the per-frame state machine and the loop that feeds
//! it from a capture device.
//!
//! A session listens until it hears speech, then buffers every frame. It ends
//! in one of two ways:
//! - the buffer reaches the target duration, and the frames become a new clip;
//! - trailing silence outlasts the threshold first, and everything is thrown
//!   away.
//!
//! Both limits together bound how long a capture can hold its channel and how
//! long the resulting clip can be.

use crate::audio::{AudioFrame, CaptureDevice, VoiceActivityGate, TARGET_RATE};
use crate::error::CaptureError;
use crate::pool::ClipSource;
use crate::shutdown::Shutdown;
use crate::storage::ClipStorage;

/// Limits for one capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub frame_ms: u64,
    /// Buffered audio that completes a clip.
    pub target_ms: u64,
    /// Trailing silence that, once exceeded, discards the session.
    pub silence_tail_ms: u64,
    /// Give up while still waiting for the first speech frame. 0 waits forever.
    pub listen_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: TARGET_RATE,
            frame_ms: 30,
            target_ms: 10_000,
            silence_tail_ms: 3_000,
            listen_timeout_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for the first speech frame; nothing is buffered.
    Idle,
    /// Speech heard; every frame is buffered.
    Recording,
    /// Target duration reached; ready to be written out.
    Finalizing,
    Completed,
    Discarded,
}

impl CaptureState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CaptureState::Completed | CaptureState::Discarded)
    }

    pub fn label(self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Recording => "recording",
            CaptureState::Finalizing => "finalizing",
            CaptureState::Completed => "completed",
            CaptureState::Discarded => "discarded",
        }
    }
}

/// Frame-driven recorder state.
#[derive(Debug)]
pub struct CaptureSession {
    sample_rate: u32,
    frame_ms: u64,
    max_frames: usize,
    silence_tail_ms: u64,
    state: CaptureState,
    frames: Vec<AudioFrame>,
    silence_run: u64,
}

impl CaptureSession {
    pub fn new(cfg: &CaptureConfig) -> Self {
        let frame_ms = cfg.frame_ms.max(1);
        // Whole frames only: the buffer never exceeds the target duration.
        let max_frames = ((cfg.target_ms / frame_ms) as usize).max(1);
        Self {
            sample_rate: cfg.sample_rate,
            frame_ms,
            max_frames,
            silence_tail_ms: cfg.silence_tail_ms,
            state: CaptureState::Idle,
            frames: Vec::with_capacity(max_frames),
            silence_run: 0,
        }
    }

    /// Feed one classified frame and return the resulting state.
    pub fn push(&mut self, frame: AudioFrame, is_speech: bool) -> CaptureState {
        match self.state {
            CaptureState::Idle => {
                if is_speech {
                    self.state = CaptureState::Recording;
                    self.frames.push(frame);
                    self.silence_run = 0;
                    self.check_cap();
                }
            }
            CaptureState::Recording => {
                self.frames.push(frame);
                if is_speech {
                    self.silence_run = 0;
                } else {
                    self.silence_run += 1;
                }
                if !self.check_cap() && self.silence_ms() > self.silence_tail_ms {
                    self.discard();
                }
            }
            CaptureState::Finalizing | CaptureState::Completed | CaptureState::Discarded => {}
        }
        self.state
    }

    fn check_cap(&mut self) -> bool {
        if self.frames.len() >= self.max_frames {
            self.state = CaptureState::Finalizing;
            true
        } else {
            false
        }
    }

    /// Drop everything buffered; no artifact will be produced.
    pub fn discard(&mut self) {
        self.frames.clear();
        self.silence_run = 0;
        self.state = CaptureState::Discarded;
    }

    /// Write the buffered frames out as a new clip. Only valid in
    /// [`CaptureState::Finalizing`]; a failed write discards the session.
    pub fn finalize(&mut self, storage: &dyn ClipStorage) -> Result<ClipSource, CaptureError> {
        if self.state != CaptureState::Finalizing {
            return Err(CaptureError::NotFinalizing(self.state));
        }
        match storage.write_artifact(&self.frames, self.sample_rate) {
            Ok(clip) => {
                self.frames.clear();
                self.state = CaptureState::Completed;
                Ok(clip)
            }
            Err(err) => {
                self.discard();
                Err(err.into())
            }
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn silence_run(&self) -> u64 {
        self.silence_run
    }

    pub fn silence_ms(&self) -> u64 {
        self.silence_run * self.frame_ms
    }

    pub fn buffered_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn buffered_ms(&self) -> u64 {
        self.frames.len() as u64 * self.frame_ms
    }
}

/// Why a session ended without a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    TrailingSilence,
    NoSpeech,
    Shutdown,
}

impl DiscardReason {
    pub fn label(self) -> &'static str {
        match self {
            DiscardReason::TrailingSilence => "trailing_silence",
            DiscardReason::NoSpeech => "no_speech",
            DiscardReason::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Completed(ClipSource),
    Discarded(DiscardReason),
}

/// Counters collected during one capture for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureMetrics {
    pub frames_processed: usize,
    pub speech_frames: usize,
    pub frames_dropped: usize,
    pub buffered_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    pub outcome: CaptureOutcome,
    pub metrics: CaptureMetrics,
}

/// Open a stream and drive one session to a terminal state.
///
/// Blocks on the device for each frame. Shutdown is checked between frames
/// and discards the session. A device error or a misaligned frame ends the
/// session with an error; in every non-completed case nothing is written.
pub fn run_capture(
    device: &dyn CaptureDevice,
    gate: &mut dyn VoiceActivityGate,
    storage: &dyn ClipStorage,
    cfg: &CaptureConfig,
    shutdown: &Shutdown,
) -> Result<CaptureReport, CaptureError> {
    let mut stream = device.open(cfg.sample_rate, cfg.frame_ms)?;
    let mut session = CaptureSession::new(cfg);
    let mut metrics = CaptureMetrics::default();
    let mut listened_ms = 0u64;

    let outcome = loop {
        if shutdown.is_triggered() {
            session.discard();
            break CaptureOutcome::Discarded(DiscardReason::Shutdown);
        }
        let frame = stream.read_frame()?;
        metrics.frames_processed += 1;
        let is_speech = gate.classify(&frame)?;
        if is_speech {
            metrics.speech_frames += 1;
        }

        match session.push(frame, is_speech) {
            CaptureState::Idle => {
                listened_ms += cfg.frame_ms;
                if cfg.listen_timeout_ms > 0 && listened_ms >= cfg.listen_timeout_ms {
                    session.discard();
                    break CaptureOutcome::Discarded(DiscardReason::NoSpeech);
                }
            }
            CaptureState::Recording => {
                metrics.buffered_ms = session.buffered_ms();
            }
            CaptureState::Finalizing | CaptureState::Completed => {
                metrics.buffered_ms = session.buffered_ms();
                break CaptureOutcome::Completed(session.finalize(storage)?);
            }
            CaptureState::Discarded => {
                break CaptureOutcome::Discarded(DiscardReason::TrailingSilence);
            }
        }
    };

    metrics.frames_dropped = stream.dropped_frames();
    Ok(CaptureReport { outcome, metrics })
}
