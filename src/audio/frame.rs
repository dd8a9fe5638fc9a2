//! Fixed-duration mono PCM blocks produced by capture devices.

/// One block of mono 16-bit PCM.
///
/// Capture streams emit frames of exactly `sample_rate * frame_ms / 1000`
/// samples; the voice gate rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Quantize normalized `[-1.0, 1.0]` samples to i16.
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        let samples = samples
            .iter()
            .map(|sample| (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)
            .collect();
        Self::new(samples, sample_rate)
    }

    pub fn silent(sample_rate: u32, frame_ms: u64) -> Self {
        Self::new(
            vec![0; samples_per_frame(sample_rate, frame_ms)],
            sample_rate,
        )
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in whole milliseconds (truncated).
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / u64::from(self.sample_rate)
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|&sample| f32::from(sample) / 32_768.0)
            .collect()
    }
}

/// Sample count of one frame; earshot-style gates require this exactly.
pub fn samples_per_frame(sample_rate: u32, frame_ms: u64) -> usize {
    ((u64::from(sample_rate) * frame_ms) / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_ms_at_16khz_is_480_samples() {
        assert_eq!(samples_per_frame(16_000, 30), 480);
        let frame = AudioFrame::silent(16_000, 30);
        assert_eq!(frame.len(), 480);
        assert_eq!(frame.duration_ms(), 30);
    }

    #[test]
    fn from_f32_clamps_out_of_range_samples() {
        let frame = AudioFrame::from_f32(&[2.0, -2.0, 0.0], 16_000);
        assert_eq!(frame.samples(), &[i16::MAX, -i16::MAX, 0]);
    }

    #[test]
    fn zero_rate_frame_has_zero_duration() {
        let frame = AudioFrame::new(vec![1, 2, 3], 0);
        assert_eq!(frame.duration_ms(), 0);
    }
}
