use earshot::{VoiceActivityDetector, VoiceActivityProfile};
use tracing::debug;

use crate::error::{Error, Result};

/// Frame-level speech/non-speech decision primitive.
///
/// The calling contract is one boolean per frame with no cross-frame memory,
/// so alternative classifiers (energy-based, model-based) can be substituted
/// without touching the segmentation state machine.
pub trait FrameClassifier {
    /// Check static preconditions before any frame is classified.
    fn validate(&self, sample_rate: u32, frame_duration_ms: u32) -> Result<()>;

    fn is_speech(&mut self, frame: &[f32], sample_rate: u32) -> bool;

    fn name(&self) -> &'static str;
}

/// WebRTC-style VAD backed by the `earshot` crate.
pub struct EarshotClassifier {
    detector: VoiceActivityDetector,
    scratch: Vec<i16>,
}

const SUPPORTED_RATES: [u32; 4] = [8_000, 16_000, 32_000, 48_000];
const SUPPORTED_FRAME_MS: [u32; 3] = [10, 20, 30];

impl EarshotClassifier {
    /// `aggressiveness` runs 0 (most permissive) to 3 (most restrictive).
    pub fn new(aggressiveness: u8) -> Result<Self> {
        let profile = match aggressiveness {
            0 => VoiceActivityProfile::QUALITY,
            1 => VoiceActivityProfile::LBR,
            2 => VoiceActivityProfile::AGGRESSIVE,
            3 => VoiceActivityProfile::VERY_AGGRESSIVE,
            other => {
                return Err(Error::configuration(
                    "aggressiveness",
                    format!("must be 0-3, got {}", other),
                ))
            }
        };
        Ok(Self {
            detector: VoiceActivityDetector::new(profile),
            scratch: Vec::new(),
        })
    }
}

impl FrameClassifier for EarshotClassifier {
    fn validate(&self, sample_rate: u32, frame_duration_ms: u32) -> Result<()> {
        if !SUPPORTED_RATES.contains(&sample_rate) {
            return Err(Error::configuration(
                "sample_rate",
                format!(
                    "{} Hz is not supported; expected one of {:?}",
                    sample_rate, SUPPORTED_RATES
                ),
            ));
        }
        if !SUPPORTED_FRAME_MS.contains(&frame_duration_ms) {
            return Err(Error::configuration(
                "frame_duration_ms",
                format!(
                    "{} ms is not supported; expected one of {:?}",
                    frame_duration_ms, SUPPORTED_FRAME_MS
                ),
            ));
        }
        Ok(())
    }

    fn is_speech(&mut self, frame: &[f32], sample_rate: u32) -> bool {
        self.scratch.clear();
        self.scratch.reserve(frame.len());
        for sample in frame.iter().copied() {
            self.scratch.push((sample.clamp(-1.0, 1.0) * 32_768.0) as i16);
        }
        let decision = match sample_rate {
            8_000 => self.detector.predict_8khz(&self.scratch),
            16_000 => self.detector.predict_16khz(&self.scratch),
            32_000 => self.detector.predict_32khz(&self.scratch),
            48_000 => self.detector.predict_48khz(&self.scratch),
            // validate() has already rejected anything else
            _ => return false,
        };
        match decision {
            Ok(speech) => speech,
            Err(err) => {
                debug!(error = ?err, "vad predict failed; treating frame as silence");
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "earshot"
    }
}

/// Mean-absolute-amplitude threshold classifier.
///
/// Deterministic and rate-agnostic, which also makes it the classifier of
/// choice for synthetic-waveform tests.
pub struct EnergyClassifier {
    threshold: f32,
}

impl EnergyClassifier {
    pub fn new(threshold: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::configuration(
                "energy_threshold",
                format!("must be within [0, 1], got {}", threshold),
            ));
        }
        Ok(Self { threshold })
    }
}

impl FrameClassifier for EnergyClassifier {
    fn validate(&self, sample_rate: u32, _frame_duration_ms: u32) -> Result<()> {
        if sample_rate == 0 {
            return Err(Error::configuration("sample_rate", "must be non-zero"));
        }
        Ok(())
    }

    fn is_speech(&mut self, frame: &[f32], _sample_rate: u32) -> bool {
        if frame.is_empty() {
            return false;
        }
        let mean_abs: f32 = frame.iter().map(|s| s.abs()).sum::<f32>() / frame.len() as f32;
        mean_abs > self.threshold
    }

    fn name(&self) -> &'static str {
        "energy"
    }
}
