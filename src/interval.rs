//! Random excerpt selection: which part of a clip to play, and how loud.

use rand::Rng;
use std::time::Duration;

/// Bounds for randomized excerpts.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalConfig {
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    pub min_gain: f32,
    pub max_gain: f32,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 3.0,
            max_duration_secs: 5.0,
            min_gain: 0.7,
            max_gain: 1.0,
        }
    }
}

/// One excerpt of one clip, computed per play and never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackInterval {
    pub start_secs: f64,
    pub duration_secs: f64,
    pub gain: f32,
}

impl PlaybackInterval {
    /// Draw an excerpt for a clip of `source_secs`.
    ///
    /// The start is uniform over `[0, max(source - max_duration, 0)]`, so a
    /// full-length excerpt usually fits; the requested duration is then cut
    /// back if it would run past the end of the clip.
    pub fn random<R: Rng + ?Sized>(source_secs: f64, cfg: &IntervalConfig, rng: &mut R) -> Self {
        let source_secs = source_secs.max(0.0);
        let latest_start = (source_secs - cfg.max_duration_secs).max(0.0);
        let start_secs = rng.gen_range(0.0..=latest_start);
        let requested = rng.gen_range(cfg.min_duration_secs..=cfg.max_duration_secs);
        let duration_secs = requested.min(source_secs - start_secs).max(0.0);
        let gain = rng.gen_range(cfg.min_gain..=cfg.max_gain);
        Self {
            start_secs,
            duration_secs,
            gain,
        }
    }

    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }

    /// Wall-clock time the excerpt occupies its channel.
    pub fn wall_time(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs.max(0.0))
    }

    pub fn is_silent(&self) -> bool {
        self.duration_secs <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn intervals_stay_inside_the_clip() {
        let cfg = IntervalConfig::default();
        let mut rng = StdRng::seed_from_u64(11);
        for &source in &[0.0, 1.5, 3.0, 4.0, 5.0, 8.0, 60.0] {
            for _ in 0..500 {
                let iv = PlaybackInterval::random(source, &cfg, &mut rng);
                assert!(iv.start_secs >= 0.0);
                assert!(iv.duration_secs <= cfg.max_duration_secs);
                assert!(iv.end_secs() <= source + 1e-9, "{iv:?} overruns {source}");
                assert!((0.7..=1.0).contains(&iv.gain));
            }
        }
    }

    #[test]
    fn long_clip_keeps_requested_duration() {
        let cfg = IntervalConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            let iv = PlaybackInterval::random(8.0, &cfg, &mut rng);
            assert!(iv.start_secs <= 3.0);
            assert!((3.0..=5.0).contains(&iv.duration_secs));
        }
    }

    #[test]
    fn short_clip_plays_from_the_top_and_is_clamped() {
        let cfg = IntervalConfig::default();
        let mut rng = StdRng::seed_from_u64(9);
        let iv = PlaybackInterval::random(2.0, &cfg, &mut rng);
        assert_eq!(iv.start_secs, 0.0);
        assert_eq!(iv.duration_secs, 2.0);
    }

    #[test]
    fn zero_length_clip_is_silent() {
        let mut rng = StdRng::seed_from_u64(2);
        let iv = PlaybackInterval::random(0.0, &IntervalConfig::default(), &mut rng);
        assert!(iv.is_silent());
        assert_eq!(iv.wall_time(), Duration::ZERO);
    }
}
