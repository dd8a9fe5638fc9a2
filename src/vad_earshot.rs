//! Earshot-powered voice gate implementing `VoiceActivityGate`.

use crate::audio::{AudioFrame, GateConfig, VoiceActivityGate};
use crate::error::InvalidFrameError;
use earshot::{VoiceActivityDetector, VoiceActivityProfile};

/// Thin wrapper that adapts `earshot` to the crate's gate trait.
pub struct EarshotGate {
    cfg: GateConfig,
    detector: VoiceActivityDetector,
}

impl EarshotGate {
    pub fn new(cfg: &GateConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            detector: VoiceActivityDetector::new(profile_for(cfg.aggressiveness)),
        }
    }
}

pub(crate) fn profile_for(aggressiveness: u8) -> VoiceActivityProfile {
    match aggressiveness {
        0 => VoiceActivityProfile::QUALITY,
        1 => VoiceActivityProfile::LBR,
        2 => VoiceActivityProfile::AGGRESSIVE,
        _ => VoiceActivityProfile::VERY_AGGRESSIVE,
    }
}

impl VoiceActivityGate for EarshotGate {
    fn classify(&mut self, frame: &AudioFrame) -> Result<bool, InvalidFrameError> {
        self.cfg.check_frame(frame)?;
        // Per-frame decisions only; nothing carries over between calls.
        self.detector.reset();
        match self.detector.predict_16khz(frame.samples()) {
            Ok(is_speech) => Ok(is_speech),
            Err(_) => Err(InvalidFrameError {
                expected: self.cfg.frame_samples(),
                actual: frame.len(),
                expected_rate: self.cfg.sample_rate,
                actual_rate: frame.sample_rate(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "earshot_gate"
    }
}
