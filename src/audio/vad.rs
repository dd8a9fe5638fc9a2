//! Voice activity gates: speech/non-speech classification of single frames.
//!
//! A gate answers one question per frame and carries no decision state from
//! one call to the next, so the same frame always classifies the same way.

use super::frame::{samples_per_frame, AudioFrame};
use super::TARGET_RATE;
use crate::config::VadEngineKind;
use crate::error::InvalidFrameError;
use std::sync::Arc;

/// Fixed-at-construction settings for a voice gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    pub kind: VadEngineKind,
    pub sample_rate: u32,
    pub frame_ms: u64,
    /// 0 (most permissive) ..= 3 (most aggressive at rejecting non-speech).
    pub aggressiveness: u8,
    /// Energy floor for [`EnergyGate`].
    pub threshold_db: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            kind: crate::config::default_vad_engine(),
            sample_rate: TARGET_RATE,
            frame_ms: 30,
            aggressiveness: 1,
            threshold_db: -40.0,
        }
    }
}

impl GateConfig {
    pub fn frame_samples(&self) -> usize {
        samples_per_frame(self.sample_rate, self.frame_ms)
    }

    /// Enforce the exact frame-alignment contract shared by every gate.
    pub fn check_frame(&self, frame: &AudioFrame) -> Result<(), InvalidFrameError> {
        let expected = self.frame_samples();
        if frame.len() != expected || frame.sample_rate() != self.sample_rate {
            return Err(InvalidFrameError {
                expected,
                actual: frame.len(),
                expected_rate: self.sample_rate,
                actual_rate: frame.sample_rate(),
            });
        }
        Ok(())
    }
}

/// Classifies a single frame as speech (`true`) or not.
///
/// # Frame Size Contract
/// Frames must hold exactly `sample_rate * frame_ms / 1000` samples at the
/// gate's sample rate. Example: 30ms @ 16kHz = 480 samples. Anything else
/// fails with [`InvalidFrameError`] instead of being padded or truncated.
pub trait VoiceActivityGate: Send {
    fn classify(&mut self, frame: &AudioFrame) -> Result<bool, InvalidFrameError>;
    fn name(&self) -> &'static str {
        "unknown_gate"
    }
}

/// Builds a fresh gate for each capture session.
pub type GateFactory = Arc<dyn Fn() -> Box<dyn VoiceActivityGate> + Send + Sync>;

/// Instantiate the configured gate, falling back to [`EnergyGate`] when the
/// earshot backend was compiled out.
pub fn build_gate(cfg: &GateConfig) -> Box<dyn VoiceActivityGate> {
    match cfg.kind {
        VadEngineKind::Earshot => {
            #[cfg(feature = "vad_earshot")]
            {
                Box::new(crate::vad_earshot::EarshotGate::new(cfg))
            }
            #[cfg(not(feature = "vad_earshot"))]
            {
                tracing::warn!("earshot gate not compiled in; using energy gate");
                Box::new(EnergyGate::new(cfg))
            }
        }
        VadEngineKind::Simple => Box::new(EnergyGate::new(cfg)),
    }
}

pub fn gate_factory(cfg: GateConfig) -> GateFactory {
    Arc::new(move || build_gate(&cfg))
}

/// Lightweight fallback gate that thresholds RMS energy. Used when Earshot is
/// disabled or unavailable.
#[derive(Debug, Clone)]
pub struct EnergyGate {
    cfg: GateConfig,
}

impl EnergyGate {
    pub fn new(cfg: &GateConfig) -> Self {
        Self { cfg: cfg.clone() }
    }
}

impl VoiceActivityGate for EnergyGate {
    fn classify(&mut self, frame: &AudioFrame) -> Result<bool, InvalidFrameError> {
        self.cfg.check_frame(frame)?;
        Ok(rms_db(frame.samples()) >= self.cfg.threshold_db)
    }

    fn name(&self) -> &'static str {
        "energy_gate"
    }
}

const FLOOR_DB: f32 = -120.0;

/// RMS level of i16 PCM in dBFS.
pub(crate) fn rms_db(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return FLOOR_DB;
    }
    let energy: f64 = samples
        .iter()
        .map(|&s| {
            let v = f64::from(s) / 32_768.0;
            v * v
        })
        .sum::<f64>()
        / samples.len() as f64;
    let rms = energy.sqrt().max(1e-6);
    (20.0 * rms.log10()) as f32
}
