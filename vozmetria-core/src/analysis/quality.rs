//! Heuristic voice clarity score.
//!
//! Compares energy in the lowest 10 % of bins ("fundamental" band) against
//! the highest 20 % ("noise" band): `snr = fundamental / (noise + 1)`,
//! reported as `min(snr / scale, 1)`. Bins are summed on a 0–255 scale so
//! the `+ 1` and the default `scale` of 10 mean the same thing whatever
//! representation the frame source delivers. This is a proxy, not a true
//! signal-to-noise ratio; `scale` is the calibration knob.

use serde::{Deserialize, Serialize};

use crate::buffering::frame::SpectrumFrame;

const FUNDAMENTAL_BAND: f32 = 0.1;
const NOISE_BAND_START: f32 = 0.8;
const BYTE_FULL_SCALE: f32 = 255.0;

#[derive(Debug, Clone, Copy)]
pub struct VoiceQualityEstimator {
    scale: f32,
}

impl VoiceQualityEstimator {
    pub const DEFAULT_SCALE: f32 = 10.0;

    /// Non-positive or non-finite scales fall back to the default.
    pub fn new(scale: f32) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            Self::DEFAULT_SCALE
        };
        Self { scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Quality in [0, 1]. Empty and all-zero spectra score 0.
    pub fn estimate(&self, spectrum: &SpectrumFrame) -> f32 {
        let n = spectrum.len();
        if n == 0 {
            return 0.0;
        }
        let fundamental_end = (n as f32 * FUNDAMENTAL_BAND).floor() as usize;
        let noise_start = (n as f32 * NOISE_BAND_START).floor() as usize;
        let to_bytes = BYTE_FULL_SCALE / spectrum.full_scale;

        let fundamental: f32 = spectrum.magnitudes[..fundamental_end]
            .iter()
            .map(|m| m * to_bytes)
            .sum();
        let noise: f32 = spectrum.magnitudes[noise_start..]
            .iter()
            .map(|m| m * to_bytes)
            .sum();

        let snr = fundamental / (noise + 1.0);
        (snr / self.scale).clamp(0.0, 1.0)
    }
}

impl Default for VoiceQualityEstimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SCALE)
    }
}

/// Coarse label for a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityLevel {
    #[serde(rename = "EXCELENTE")]
    Excellent,
    #[serde(rename = "BUENA")]
    Good,
    #[serde(rename = "REGULAR")]
    Fair,
    #[serde(rename = "BAJA")]
    Low,
}

impl QualityLevel {
    pub fn from_quality(quality: f32) -> Self {
        if quality > 0.8 {
            QualityLevel::Excellent
        } else if quality > 0.6 {
            QualityLevel::Good
        } else if quality > 0.4 {
            QualityLevel::Fair
        } else {
            QualityLevel::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QualityLevel::Excellent => "EXCELENTE",
            QualityLevel::Good => "BUENA",
            QualityLevel::Fair => "REGULAR",
            QualityLevel::Low => "BAJA",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn spectrum(low: u8, mid: u8, high: u8) -> SpectrumFrame {
        // 100 bins: [0,10) fundamental, [80,100) noise
        let bins: Vec<u8> = (0..100)
            .map(|i| match i {
                0..=9 => low,
                80..=99 => high,
                _ => mid,
            })
            .collect();
        SpectrumFrame::from_bytes(&bins, 44_100)
    }

    #[test]
    fn clean_low_band_saturates() {
        // 10 × 200 / (0 + 1) = 2000 → min(200, 1)
        let q = VoiceQualityEstimator::default().estimate(&spectrum(200, 50, 0));
        assert_eq!(q, 1.0);
    }

    #[test]
    fn noisy_spectrum_scores_low() {
        // fundamental 10 × 100 = 1000, noise 20 × 100 = 2000 → snr ≈ 0.49975
        let q = VoiceQualityEstimator::default().estimate(&spectrum(100, 100, 100));
        assert_abs_diff_eq!(q, 1000.0 / 2001.0 / 10.0, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_spectra_score_zero() {
        let q = VoiceQualityEstimator::default();
        assert_eq!(q.estimate(&spectrum(0, 0, 0)), 0.0);
        assert_eq!(q.estimate(&SpectrumFrame::normalized(vec![], 44_100)), 0.0);
        // Fewer than 10 bins: empty fundamental band.
        assert_eq!(q.estimate(&SpectrumFrame::from_bytes(&[255; 5], 44_100)), 0.0);
    }

    #[test]
    fn normalised_and_byte_frames_agree() {
        let bytes = spectrum(120, 30, 8);
        let unit = SpectrumFrame::normalized(
            bytes.magnitudes.iter().map(|m| m / 255.0).collect(),
            44_100,
        );
        let q = VoiceQualityEstimator::default();
        assert_abs_diff_eq!(q.estimate(&bytes), q.estimate(&unit), epsilon = 1e-4);
    }

    #[test]
    fn invalid_scale_falls_back_to_default() {
        assert_eq!(VoiceQualityEstimator::new(0.0).scale(), 10.0);
        assert_eq!(VoiceQualityEstimator::new(-2.0).scale(), 10.0);
        assert_eq!(VoiceQualityEstimator::new(4.0).scale(), 4.0);
    }

    #[test]
    fn quality_levels_follow_thresholds() {
        assert_eq!(QualityLevel::from_quality(0.95), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_quality(0.8), QualityLevel::Good);
        assert_eq!(QualityLevel::from_quality(0.5), QualityLevel::Fair);
        assert_eq!(QualityLevel::from_quality(0.4), QualityLevel::Low);
        assert_eq!(QualityLevel::Fair.label(), "REGULAR");
    }
}
