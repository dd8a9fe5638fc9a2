//! In-memory devices for exercising the engine without audio hardware.
//!
//! These stand in for the microphone, the mixer, and the clip directory in
//! unit and integration tests, and record enough about what happened to check
//! the engine's exclusion guarantees afterwards.

use crate::audio::{
    samples_per_frame, AudioFrame, CaptureDevice, ClipHandle, FrameStream, PlaybackDevice,
    VoiceActivityGate,
};
use crate::error::{DeviceError, InvalidFrameError, StorageError};
use crate::interval::PlaybackInterval;
use crate::lock_or_recover;
use crate::pool::ClipSource;
use crate::storage::ClipStorage;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the next captured frame should look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFrame {
    /// Loud square wave, well above any energy threshold.
    Speech,
    /// Digital silence.
    Silence,
    /// One sample short of a whole frame.
    Malformed,
    /// The device read fails.
    DeviceFailure,
}

impl ScriptedFrame {
    pub fn render(self, sample_rate: u32, frame_ms: u64) -> Result<AudioFrame, DeviceError> {
        let len = samples_per_frame(sample_rate, frame_ms);
        match self {
            ScriptedFrame::Speech => Ok(speech_frame(sample_rate, frame_ms)),
            ScriptedFrame::Silence => Ok(AudioFrame::silent(sample_rate, frame_ms)),
            ScriptedFrame::Malformed => {
                Ok(AudioFrame::new(vec![0; len.saturating_sub(1)], sample_rate))
            }
            ScriptedFrame::DeviceFailure => Err(DeviceError::Disconnected),
        }
    }
}

pub fn speech_frame(sample_rate: u32, frame_ms: u64) -> AudioFrame {
    let len = samples_per_frame(sample_rate, frame_ms);
    let samples = (0..len)
        .map(|i| if (i / 8) % 2 == 0 { 12_000 } else { -12_000 })
        .collect();
    AudioFrame::new(samples, sample_rate)
}

#[derive(Default)]
struct CaptureCounters {
    opens: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

/// Capture device fed from a shared script. Once the script runs out every
/// stream keeps producing the fallback frame.
#[derive(Clone)]
pub struct ScriptedCapture {
    script: Arc<Mutex<VecDeque<ScriptedFrame>>>,
    fallback: ScriptedFrame,
    frame_delay: Duration,
    counters: Arc<CaptureCounters>,
}

impl ScriptedCapture {
    pub fn new(script: impl IntoIterator<Item = ScriptedFrame>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            fallback: ScriptedFrame::Silence,
            frame_delay: Duration::ZERO,
            counters: Arc::new(CaptureCounters::default()),
        }
    }

    /// Repeat `pattern` `times` times.
    pub fn repeating(pattern: &[ScriptedFrame], times: usize) -> Self {
        Self::new(
            std::iter::repeat(pattern.iter().copied())
                .take(times)
                .flatten(),
        )
    }

    pub fn with_fallback(mut self, fallback: ScriptedFrame) -> Self {
        self.fallback = fallback;
        self
    }

    /// Simulate device pacing between frames.
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open streams seen.
    pub fn max_concurrent_streams(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }

    pub fn open_streams(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }
}

impl CaptureDevice for ScriptedCapture {
    fn open(&self, sample_rate: u32, frame_ms: u64) -> Result<Box<dyn FrameStream>, DeviceError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_active.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(ScriptedStream {
            device: self.clone(),
            sample_rate,
            frame_ms,
        }))
    }
}

struct ScriptedStream {
    device: ScriptedCapture,
    sample_rate: u32,
    frame_ms: u64,
}

impl FrameStream for ScriptedStream {
    fn read_frame(&mut self) -> Result<AudioFrame, DeviceError> {
        if !self.device.frame_delay.is_zero() {
            std::thread::sleep(self.device.frame_delay);
        }
        let next = lock_or_recover(&self.device.script, "scripted capture read")
            .pop_front()
            .unwrap_or(self.device.fallback);
        next.render(self.sample_rate, self.frame_ms)
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.device.counters.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Gate that replays a fixed list of decisions and ignores frame content.
/// Once the list runs out every frame is silence. Frames are still
/// length-checked against `expected_len` when set.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGate {
    decisions: VecDeque<bool>,
    expected_len: Option<usize>,
}

impl ScriptedGate {
    pub fn new(decisions: impl IntoIterator<Item = bool>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn expecting(mut self, sample_rate: u32, frame_ms: u64) -> Self {
        self.expected_len = Some(samples_per_frame(sample_rate, frame_ms));
        self
    }
}

impl VoiceActivityGate for ScriptedGate {
    fn classify(&mut self, frame: &AudioFrame) -> Result<bool, InvalidFrameError> {
        if let Some(expected) = self.expected_len {
            if frame.len() != expected {
                return Err(InvalidFrameError {
                    expected,
                    actual: frame.len(),
                    expected_rate: frame.sample_rate(),
                    actual_rate: frame.sample_rate(),
                });
            }
        }
        Ok(self.decisions.pop_front().unwrap_or(false))
    }

    fn name(&self) -> &'static str {
        "scripted_gate"
    }
}

/// One `play_range` call as seen by [`RecordingPlayback`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    pub clip: PathBuf,
    pub interval: PlaybackInterval,
}

#[derive(Default)]
struct PlaybackLog {
    next_handle: u64,
    loads: usize,
    loaded: HashMap<u64, PathBuf>,
    sounding: HashSet<PathBuf>,
    plays: Vec<PlayEvent>,
    collisions: Vec<PathBuf>,
    max_sounding: usize,
    failing: HashSet<PathBuf>,
}

/// Playback device that renders nothing but remembers every call and flags
/// any clip started while it was already sounding.
#[derive(Clone, Default)]
pub struct RecordingPlayback {
    log: Arc<Mutex<PlaybackLog>>,
}

impl RecordingPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `load` fail for this clip.
    pub fn fail_loads_for(&self, path: impl Into<PathBuf>) {
        lock_or_recover(&self.log, "playback fail").failing.insert(path.into());
    }

    /// Every `load` call, failed ones included.
    pub fn loads(&self) -> usize {
        lock_or_recover(&self.log, "playback loads").loads
    }

    pub fn plays(&self) -> Vec<PlayEvent> {
        lock_or_recover(&self.log, "playback plays").plays.clone()
    }

    pub fn collisions(&self) -> Vec<PathBuf> {
        lock_or_recover(&self.log, "playback collisions")
            .collisions
            .clone()
    }

    pub fn max_concurrent(&self) -> usize {
        lock_or_recover(&self.log, "playback max").max_sounding
    }

    pub fn sounding(&self) -> usize {
        lock_or_recover(&self.log, "playback sounding").sounding.len()
    }
}

impl PlaybackDevice for RecordingPlayback {
    fn load(&self, clip: &ClipSource) -> Result<ClipHandle, DeviceError> {
        let mut log = lock_or_recover(&self.log, "playback load");
        log.loads += 1;
        if log.failing.contains(clip.path()) {
            return Err(DeviceError::Decode {
                path: clip.path().to_path_buf(),
                reason: "scripted failure".to_string(),
            });
        }
        log.next_handle += 1;
        let id = log.next_handle;
        log.loaded.insert(id, clip.path().to_path_buf());
        Ok(ClipHandle::new(id))
    }

    fn play_range(
        &self,
        handle: ClipHandle,
        interval: &PlaybackInterval,
    ) -> Result<(), DeviceError> {
        let mut log = lock_or_recover(&self.log, "playback play");
        let clip = log
            .loaded
            .get(&handle.id())
            .cloned()
            .ok_or(DeviceError::UnknownHandle(handle.id()))?;
        if !log.sounding.insert(clip.clone()) {
            log.collisions.push(clip.clone());
        }
        log.max_sounding = log.max_sounding.max(log.sounding.len());
        log.plays.push(PlayEvent {
            clip,
            interval: *interval,
        });
        Ok(())
    }

    fn stop(&self, handle: ClipHandle) {
        let mut log = lock_or_recover(&self.log, "playback stop");
        if let Some(clip) = log.loaded.remove(&handle.id()) {
            log.sounding.remove(&clip);
        }
    }
}

#[derive(Default)]
struct MemoryStore {
    initial: Vec<ClipSource>,
    written: Vec<ClipSource>,
    frames_written: Vec<usize>,
    fail_writes: bool,
}

/// Clip storage that keeps recordings in memory.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    store: Arc<Mutex<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new(initial: impl IntoIterator<Item = ClipSource>) -> Self {
        let storage = Self::default();
        lock_or_recover(&storage.store, "memory storage init").initial =
            initial.into_iter().collect();
        storage
    }

    pub fn fail_writes(&self, fail: bool) {
        lock_or_recover(&self.store, "memory storage fail").fail_writes = fail;
    }

    pub fn written(&self) -> Vec<ClipSource> {
        lock_or_recover(&self.store, "memory storage written")
            .written
            .clone()
    }

    /// Frame count of each recording, in write order.
    pub fn frames_written(&self) -> Vec<usize> {
        lock_or_recover(&self.store, "memory storage frames")
            .frames_written
            .clone()
    }
}

impl ClipStorage for MemoryStorage {
    fn list_initial_clips(&self) -> Result<Vec<ClipSource>, StorageError> {
        Ok(lock_or_recover(&self.store, "memory storage list")
            .initial
            .clone())
    }

    fn write_artifact(
        &self,
        frames: &[AudioFrame],
        sample_rate: u32,
    ) -> Result<ClipSource, StorageError> {
        let mut store = lock_or_recover(&self.store, "memory storage write");
        if store.fail_writes {
            return Err(StorageError::Write {
                path: PathBuf::from("memory"),
                source: std::io::Error::other("scripted write failure"),
            });
        }
        let samples: usize = frames.iter().map(AudioFrame::len).sum();
        if samples == 0 || sample_rate == 0 {
            return Err(StorageError::EmptyRecording);
        }
        let clip = ClipSource::new(
            format!("memory://recording_{}.wav", store.written.len()),
            samples as f64 / f64::from(sample_rate),
        );
        store.written.push(clip.clone());
        store.frames_written.push(frames.len());
        Ok(clip)
    }
}
