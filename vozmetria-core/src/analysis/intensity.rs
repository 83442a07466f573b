//! Loudness score: mean spectral magnitude over the representable full scale.

use crate::buffering::frame::SpectrumFrame;

/// Stateless intensity estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntensityEstimator;

impl IntensityEstimator {
    /// Mean of all bins divided by the frame's full scale, in [0, 1].
    ///
    /// An empty spectrum has intensity 0.
    pub fn estimate(&self, spectrum: &SpectrumFrame) -> f32 {
        if spectrum.is_empty() {
            return 0.0;
        }
        let sum: f32 = spectrum.magnitudes.iter().sum();
        let mean = sum / spectrum.len() as f32;
        (mean / spectrum.full_scale).clamp(0.0, 1.0)
    }
}
