//! Clip persistence: the startup listing and the capture artifacts.

use crate::audio::{wav_duration_secs, AudioFrame};
use crate::error::StorageError;
use crate::pool::ClipSource;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub trait ClipStorage: Send + Sync {
    /// Clips available when the run starts.
    fn list_initial_clips(&self) -> Result<Vec<ClipSource>, StorageError>;

    /// Serialize captured frames as one mono 16-bit clip.
    fn write_artifact(
        &self,
        frames: &[AudioFrame],
        sample_rate: u32,
    ) -> Result<ClipSource, StorageError>;
}

/// WAV files in a directory. Recordings land in `recordings_dir`, which is the
/// clip directory unless configured otherwise.
pub struct DirectoryStorage {
    clips_dir: PathBuf,
    recordings_dir: PathBuf,
    sequence: AtomicU64,
}

impl DirectoryStorage {
    pub fn new(clips_dir: impl Into<PathBuf>, recordings_dir: Option<PathBuf>) -> Self {
        let clips_dir = clips_dir.into();
        Self {
            recordings_dir: recordings_dir.unwrap_or_else(|| clips_dir.clone()),
            clips_dir,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn clips_dir(&self) -> &Path {
        &self.clips_dir
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    fn scan(dir: &Path) -> Result<Vec<ClipSource>, StorageError> {
        let entries = fs::read_dir(dir).map_err(|source| StorageError::ListDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_wav(path))
            .collect();
        paths.sort();

        let mut clips = Vec::with_capacity(paths.len());
        for path in paths {
            match wav_duration_secs(&path) {
                Ok(secs) if secs > 0.0 => clips.push(ClipSource::new(path, secs)),
                Ok(_) => tracing::warn!(path = %path.display(), "skipping empty clip"),
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable clip"
                    );
                }
            }
        }
        Ok(clips)
    }

    fn next_recording_path(&self) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        loop {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            let name = if seq == 0 {
                format!("recording_{millis}.wav")
            } else {
                format!("recording_{millis}_{seq}.wav")
            };
            let path = self.recordings_dir.join(name);
            if !path.exists() {
                return path;
            }
        }
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

impl ClipStorage for DirectoryStorage {
    fn list_initial_clips(&self) -> Result<Vec<ClipSource>, StorageError> {
        let mut clips = Self::scan(&self.clips_dir)?;
        if self.recordings_dir != self.clips_dir && self.recordings_dir.is_dir() {
            clips.extend(Self::scan(&self.recordings_dir)?);
        }
        Ok(clips)
    }

    fn write_artifact(
        &self,
        frames: &[AudioFrame],
        sample_rate: u32,
    ) -> Result<ClipSource, StorageError> {
        let total_samples: usize = frames.iter().map(AudioFrame::len).sum();
        if total_samples == 0 || sample_rate == 0 {
            return Err(StorageError::EmptyRecording);
        }
        fs::create_dir_all(&self.recordings_dir).map_err(|source| StorageError::Write {
            path: self.recordings_dir.clone(),
            source,
        })?;

        let path = self.next_recording_path();
        // Written beside the final name and renamed once complete, so the pool
        // directory never shows a half-written clip.
        let partial = path.with_extension("wav.part");
        if let Err(err) = write_wav(&partial, frames, sample_rate) {
            let _ = fs::remove_file(&partial);
            return Err(err);
        }
        fs::rename(&partial, &path).map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })?;

        let duration_secs = total_samples as f64 / f64::from(sample_rate);
        Ok(ClipSource::new(path, duration_secs))
    }
}

pub(crate) fn write_wav(
    path: &Path,
    frames: &[AudioFrame],
    sample_rate: u32,
) -> Result<(), StorageError> {
    let wav_err = |source| StorageError::Wav {
        path: path.to_path_buf(),
        source,
    };
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_err)?;
    for sample in frames.iter().flat_map(|frame| frame.samples().iter().copied()) {
        writer.write_sample(sample).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode_wav;

    fn frames(count: usize, value: i16) -> Vec<AudioFrame> {
        (0..count)
            .map(|_| AudioFrame::new(vec![value; 480], 16_000))
            .collect()
    }

    #[test]
    fn artifact_round_trips_through_listing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::new(dir.path(), None);
        let clip = storage.write_artifact(&frames(100, 1_000), 16_000).unwrap();
        assert!((clip.duration_secs() - 3.0).abs() < 1e-9);
        assert!(clip.label().starts_with("recording_"));

        let listed = storage.list_initial_clips().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path(), clip.path());

        let decoded = decode_wav(clip.path()).unwrap();
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.samples.len(), 48_000);
    }

    #[test]
    fn consecutive_artifacts_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::new(dir.path(), None);
        let a = storage.write_artifact(&frames(1, 0), 16_000).unwrap();
        let b = storage.write_artifact(&frames(1, 0), 16_000).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(!dir
            .path()
            .read_dir()
            .unwrap()
            .any(|e| e.unwrap().path().to_string_lossy().ends_with(".part")));
    }

    #[test]
    fn empty_recording_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::new(dir.path(), None);
        assert!(matches!(
            storage.write_artifact(&[], 16_000),
            Err(StorageError::EmptyRecording)
        ));
    }

    #[test]
    fn listing_skips_non_wav_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("broken.wav"), "not a wav").unwrap();
        let storage = DirectoryStorage::new(dir.path(), None);
        storage.write_artifact(&frames(2, 0), 16_000).unwrap();
        let listed = storage.list_initial_clips().unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn listing_skips_header_only_wavs() {
        let dir = tempfile::tempdir().unwrap();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        hound::WavWriter::create(dir.path().join("empty.wav"), spec)
            .unwrap()
            .finalize()
            .unwrap();
        let storage = DirectoryStorage::new(dir.path(), None);
        assert!(storage.list_initial_clips().unwrap().is_empty());
    }

    #[test]
    fn recordings_dir_is_listed_and_created() {
        let clips = tempfile::tempdir().unwrap();
        let recordings = clips.path().join("captured");
        let storage = DirectoryStorage::new(clips.path(), Some(recordings.clone()));
        assert_eq!(storage.clips_dir(), clips.path());
        assert_eq!(storage.recordings_dir(), recordings.as_path());
        let clip = storage.write_artifact(&frames(1, 0), 16_000).unwrap();
        assert!(clip.path().starts_with(&recordings));
        assert_eq!(storage.list_initial_clips().unwrap().len(), 1);
    }

    #[test]
    fn missing_clip_dir_is_an_error() {
        let storage = DirectoryStorage::new("/nonexistent/murmur-clips", None);
        assert!(matches!(
            storage.list_initial_clips(),
            Err(StorageError::ListDir { .. })
        ));
    }
}
