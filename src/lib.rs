//! murmur: an unattended soundscape that replays random excerpts of a growing
//! clip pool on several channels and records overheard speech back into it.

pub mod audio;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod interval;
mod lock;
pub mod player;
pub mod pool;
pub mod session;
pub mod shutdown;
pub mod storage;
pub mod telemetry;
pub mod testing;
#[cfg(feature = "vad_earshot")]
pub mod vad_earshot;

pub(crate) use lock::lock_or_recover;

pub use coordinator::{CaptureCoordinator, CaptureLease};
pub use engine::{EngineConfig, EngineDevices, RunningEngine, SoundscapeEngine};
pub use error::{CaptureError, DeviceError, InvalidFrameError, StorageError};
pub use interval::{IntervalConfig, PlaybackInterval};
pub use player::{CaptureAttempt, ChannelPlayer, CycleReport, PlayOutcome};
pub use pool::{ChannelId, ClipPool, ClipSource};
pub use session::{CaptureConfig, CaptureSession, CaptureState, DiscardReason};
pub use storage::{ClipStorage, DirectoryStorage};
