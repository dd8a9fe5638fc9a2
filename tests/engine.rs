use murmur::audio::GateConfig;
use murmur::config::VadEngineKind;
use murmur::testing::{MemoryStorage, RecordingPlayback, ScriptedCapture, ScriptedFrame};
use murmur::{
    CaptureConfig, ClipSource, EngineConfig, EngineDevices, IntervalConfig, SoundscapeEngine,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    playback: RecordingPlayback,
    capture: ScriptedCapture,
    storage: MemoryStorage,
    engine: SoundscapeEngine,
}

fn quick_config(channels: usize) -> EngineConfig {
    let gate = GateConfig {
        kind: VadEngineKind::Simple,
        ..GateConfig::default()
    };
    EngineConfig {
        channels,
        interval: IntervalConfig {
            min_duration_secs: 0.005,
            max_duration_secs: 0.02,
            ..IntervalConfig::default()
        },
        capture: CaptureConfig {
            target_ms: 90,
            silence_tail_ms: 60,
            ..CaptureConfig::default()
        },
        gate,
        idle_backoff: Duration::from_millis(2),
        bootstrap_capture: false,
    }
}

fn harness(config: EngineConfig, clips: usize, capture: ScriptedCapture) -> Harness {
    let playback = RecordingPlayback::new();
    let storage = MemoryStorage::default();
    let devices = EngineDevices::new(
        Arc::new(playback.clone()),
        Arc::new(capture.clone()),
        Arc::new(storage.clone()),
        &config.gate,
    );
    let engine = SoundscapeEngine::new(config, devices)
        .with_clips((0..clips).map(|i| ClipSource::new(format!("/clips/{i}.wav"), 6.0)))
        .with_seed(42);
    Harness {
        playback,
        capture,
        storage,
        engine,
    }
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

fn speech_then_pause() -> ScriptedCapture {
    ScriptedCapture::repeating(
        &[
            ScriptedFrame::Speech,
            ScriptedFrame::Speech,
            ScriptedFrame::Speech,
            ScriptedFrame::Speech,
            ScriptedFrame::Silence,
            ScriptedFrame::Silence,
            ScriptedFrame::Silence,
        ],
        200,
    )
    .with_frame_delay(Duration::from_millis(1))
}

#[test]
fn channels_never_play_the_same_clip_at_once() {
    let h = harness(quick_config(4), 3, speech_then_pause());
    let running = h.engine.start().expect("start engine");
    assert!(wait_until(WAIT, || h.playback.plays().len() >= 60));
    running.stop().expect("clean stop");

    assert!(
        h.playback.collisions().is_empty(),
        "{:?}",
        h.playback.collisions()
    );
    assert_eq!(h.playback.sounding(), 0);
    assert!((1..=3).contains(&h.playback.max_concurrent()));
    assert!(h.engine.pool().snapshot_playing().is_empty());
}

#[test]
fn only_one_capture_stream_is_ever_open() {
    let h = harness(quick_config(6), 8, speech_then_pause());
    let running = h.engine.start().expect("start engine");
    assert!(wait_until(WAIT, || h.capture.opens() >= 10));
    running.stop().expect("clean stop");

    assert_eq!(h.capture.max_concurrent_streams(), 1);
    assert_eq!(h.capture.open_streams(), 0);
    assert!(!h.engine.coordinator().is_busy());
}

#[test]
fn recordings_grow_the_pool_monotonically() {
    let capture = ScriptedCapture::new([]).with_fallback(ScriptedFrame::Speech);
    let h = harness(quick_config(3), 2, capture);
    let running = h.engine.start().expect("start engine");

    let mut previous = h.engine.pool().len();
    let mut grew = false;
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline && !grew {
        let now = h.engine.pool().len();
        assert!(now >= previous, "pool shrank from {previous} to {now}");
        grew = now >= 6;
        previous = now;
        thread::sleep(Duration::from_millis(2));
    }
    running.stop().expect("clean stop");

    assert!(grew, "pool never grew past {previous}");
    assert_eq!(h.engine.pool().len(), 2 + h.storage.written().len());
    assert!(h.storage.frames_written().iter().all(|&frames| frames == 3));
    assert!(h.playback.collisions().is_empty());
}

#[test]
fn stop_interrupts_a_listening_capture_without_artifacts() {
    let capture = ScriptedCapture::new([])
        .with_fallback(ScriptedFrame::Silence)
        .with_frame_delay(Duration::from_millis(1));
    let h = harness(quick_config(2), 1, capture);
    let running = h.engine.start().expect("start engine");
    assert!(wait_until(WAIT, || h.capture.open_streams() == 1));
    assert!(h.engine.coordinator().is_busy());

    let started = Instant::now();
    running.stop().expect("clean stop");
    assert!(started.elapsed() < Duration::from_secs(2));

    assert!(!h.engine.coordinator().is_busy());
    assert_eq!(h.capture.open_streams(), 0);
    assert!(h.storage.written().is_empty());
    assert_eq!(h.engine.pool().len(), 1);
}

#[test]
fn empty_pool_stays_silent_without_bootstrap() {
    let h = harness(quick_config(2), 0, speech_then_pause());
    let running = h.engine.start().expect("start engine");
    thread::sleep(Duration::from_millis(100));
    running.stop().expect("clean stop");

    assert!(h.playback.plays().is_empty());
    assert_eq!(h.capture.opens(), 0);
    assert!(h.engine.pool().is_empty());
}

#[test]
fn bootstrap_capture_fills_an_empty_pool() {
    let config = EngineConfig {
        bootstrap_capture: true,
        ..quick_config(2)
    };
    let h = harness(config, 0, speech_then_pause());
    let running = h.engine.start().expect("start engine");
    assert!(wait_until(WAIT, || !h.playback.plays().is_empty()));
    running.stop().expect("clean stop");

    assert!(!h.engine.pool().is_empty());
    assert!(!h.storage.written().is_empty());
}

#[test]
fn dropping_the_running_engine_stops_it() {
    let h = harness(quick_config(3), 2, speech_then_pause());
    {
        let _running = h.engine.start().expect("start engine");
        thread::sleep(Duration::from_millis(50));
    }
    let plays = h.playback.plays().len();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(h.playback.plays().len(), plays);
    assert!(!h.engine.coordinator().is_busy());
}
