//! WAV decoding for playback. Clips are decoded whole into mono f32.

use super::dispatch::downmix_into;
use crate::error::DeviceError;
use std::path::Path;

/// Decoded mono clip at its native rate.
#[derive(Debug, Clone)]
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedClip {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

pub fn decode_wav(path: &Path) -> Result<DecodedClip, DeviceError> {
    let decode_err = |reason: String| DeviceError::Decode {
        path: path.to_path_buf(),
        reason,
    };
    let mut reader = hound::WavReader::open(path).map_err(|e| decode_err(e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| decode_err(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample)
                .ok_or_else(|| decode_err(format!("{} bits per sample", spec.bits_per_sample)))?;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| decode_err(e.to_string()))?
        }
    };

    let mut samples = Vec::with_capacity(interleaved.len() / channels + 1);
    downmix_into(&mut samples, &interleaved, channels, |sample| sample);
    Ok(DecodedClip {
        samples,
        sample_rate: spec.sample_rate,
    })
}

fn int_scale(bits: u16) -> Option<f32> {
    match bits {
        1..=32 => Some((1u64 << (bits - 1)) as f32),
        _ => None,
    }
}

/// Clip length from the header alone, without decoding samples.
pub fn wav_duration_secs(path: &Path) -> Result<f64, hound::Error> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Ok(0.0);
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, data: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in data {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decodes_stereo_to_mono_average() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[16_384, 0, -16_384, -16_384]);
        let clip = decode_wav(&path).unwrap();
        assert_eq!(clip.sample_rate, 8_000);
        assert_eq!(clip.samples.len(), 2);
        assert!((clip.samples[0] - 0.25).abs() < 1e-4);
        assert!((clip.samples[1] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn header_duration_matches_frame_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one_second.wav");
        write_wav(&path, 1, &vec![0i16; 8_000]);
        let secs = wav_duration_secs(&path).unwrap();
        assert!((secs - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let err = decode_wav(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(matches!(err, DeviceError::Decode { .. }));
    }
}
