//! The shared, growing pool of clips and the per-channel "now playing" slots.
//!
//! One mutex covers both the clip list and the slots, so selecting a clip and
//! marking it as playing happen in the same critical section. No operation
//! here waits on audio; the lock is only ever held for bookkeeping.

use crate::lock_or_recover;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// An audio file with a known decoded duration. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSource {
    path: PathBuf,
    duration_secs: f64,
}

impl ClipSource {
    pub fn new(path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            duration_secs: if duration_secs.is_finite() {
                duration_secs.max(0.0)
            } else {
                0.0
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn label(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Index of one logical output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub usize);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel-{}", self.0)
    }
}

#[derive(Default)]
struct PoolState {
    clips: Vec<Arc<ClipSource>>,
    playing: HashMap<ChannelId, Arc<ClipSource>>,
}

impl PoolState {
    fn is_playing_elsewhere(&self, channel: ChannelId, clip: &ClipSource) -> bool {
        self.playing
            .iter()
            .any(|(owner, playing)| *owner != channel && playing.path() == clip.path())
    }
}

/// Thread-safe clip registry shared by every channel and the recorder.
#[derive(Default)]
pub struct ClipPool {
    state: Mutex<PoolState>,
}

impl ClipPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clips(clips: impl IntoIterator<Item = ClipSource>) -> Self {
        let pool = Self::new();
        for clip in clips {
            pool.append(clip);
        }
        pool
    }

    /// Add a clip at the end. Existing entries are never touched.
    pub fn append(&self, clip: ClipSource) -> Arc<ClipSource> {
        let clip = Arc::new(clip);
        lock_or_recover(&self.state, "clip pool append")
            .clips
            .push(clip.clone());
        clip
    }

    /// All clips in insertion order.
    pub fn all(&self) -> Vec<Arc<ClipSource>> {
        lock_or_recover(&self.state, "clip pool all").clips.clone()
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.state, "clip pool len").clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent copy of every channel's current slot.
    pub fn snapshot_playing(&self) -> HashMap<ChannelId, Arc<ClipSource>> {
        lock_or_recover(&self.state, "clip pool snapshot")
            .playing
            .clone()
    }

    /// Overwrite a channel's slot. `None` clears it.
    pub fn set_playing(&self, channel: ChannelId, clip: Option<Arc<ClipSource>>) {
        let mut state = lock_or_recover(&self.state, "clip pool set_playing");
        match clip {
            Some(clip) => {
                state.playing.insert(channel, clip);
            }
            None => {
                state.playing.remove(&channel);
            }
        }
    }

    /// Clips a channel could pick right now: pool minus whatever is playing on
    /// other channels.
    pub fn available_for(&self, channel: ChannelId) -> Vec<Arc<ClipSource>> {
        let state = lock_or_recover(&self.state, "clip pool available");
        state
            .clips
            .iter()
            .filter(|clip| !state.is_playing_elsewhere(channel, clip))
            .cloned()
            .collect()
    }

    /// Pick a clip uniformly among those not playing elsewhere and mark it as
    /// this channel's slot, all under one lock. Returns `None` when nothing is
    /// available; the channel should skip the cycle.
    ///
    /// The slot is cleared when the returned guard drops.
    pub fn claim<R: Rng + ?Sized>(
        &self,
        channel: ChannelId,
        rng: &mut R,
    ) -> Option<ClaimedClip<'_>> {
        let mut state = lock_or_recover(&self.state, "clip pool claim");
        let candidates: Vec<&Arc<ClipSource>> = state
            .clips
            .iter()
            .filter(|clip| !state.is_playing_elsewhere(channel, clip))
            .collect();
        let chosen = Arc::clone(candidates.choose(rng)?);
        state.playing.insert(channel, chosen.clone());
        Some(ClaimedClip {
            pool: self,
            channel,
            clip: chosen,
        })
    }
}

/// A clip marked as playing on one channel. Dropping it clears the slot, so
/// an early return or a panic cannot leave the clip excluded forever.
pub struct ClaimedClip<'a> {
    pool: &'a ClipPool,
    channel: ChannelId,
    clip: Arc<ClipSource>,
}

impl ClaimedClip<'_> {
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn clip(&self) -> &Arc<ClipSource> {
        &self.clip
    }
}

impl Deref for ClaimedClip<'_> {
    type Target = ClipSource;

    fn deref(&self) -> &ClipSource {
        &self.clip
    }
}

impl Drop for ClaimedClip<'_> {
    fn drop(&mut self) {
        self.pool.set_playing(self.channel, None);
    }
}
