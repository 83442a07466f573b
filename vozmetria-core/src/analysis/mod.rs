//! Per-frame signal estimators.
//!
//! The `PitchEstimator` trait is the extensibility point for pitch tracking:
//! the default [`pitch::AutocorrelationPitch`] works in the time domain, and a
//! cross-correlation backend for very large frames can be swapped in without
//! touching the analyzer, as long as it honours the same gating.
//!
//! Intensity and quality are stateless functions of a [`SpectrumFrame`].

pub mod intensity;
pub mod pitch;
pub mod quality;
pub mod spectrum;

pub use intensity::IntensityEstimator;
pub use pitch::AutocorrelationPitch;
pub use quality::{QualityLevel, VoiceQualityEstimator};
pub use spectrum::SpectrumAnalyzer;

use serde::{Deserialize, Serialize};

use crate::buffering::frame::AudioFrame;

/// Lower bound (exclusive) of the accepted voice pitch range, in Hz.
pub const MIN_VOICE_HZ: f32 = 50.0;
/// Upper bound (exclusive) of the accepted voice pitch range, in Hz.
pub const MAX_VOICE_HZ: f32 = 500.0;

/// Open interval of pitch values treated as real voice.
///
/// Anything outside it (including 0, the "no pitch" value, and NaN) is never
/// averaged or voted on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceRange {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl VoiceRange {
    pub const HUMAN: Self = Self {
        min_hz: MIN_VOICE_HZ,
        max_hz: MAX_VOICE_HZ,
    };

    pub fn contains(&self, pitch_hz: f32) -> bool {
        pitch_hz > self.min_hz && pitch_hz < self.max_hz
    }

    /// `pitch_hz` if it lies in the range, otherwise 0.
    pub fn gate(&self, pitch_hz: f32) -> f32 {
        if self.contains(pitch_hz) {
            pitch_hz
        } else {
            0.0
        }
    }
}

impl Default for VoiceRange {
    fn default() -> Self {
        Self::HUMAN
    }
}

/// Whether `pitch_hz` lies in the default (50, 500) Hz voice range.
pub fn is_valid_pitch(pitch_hz: f32) -> bool {
    VoiceRange::HUMAN.contains(pitch_hz)
}

/// Compute the root-mean-square of a sample slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Trait for time-domain pitch detectors.
///
/// `&mut self` lets implementations reuse scratch buffers between frames;
/// the result must still be a pure function of the frame.
pub trait PitchEstimator: Send + 'static {
    /// Fundamental frequency of `frame` in Hz, or 0 when none is detected or
    /// the estimate falls outside the configured voice range.
    fn detect(&mut self, frame: &AudioFrame) -> f32;
}
