//! Typed frames handed from the frame source to the estimators.

use crate::error::{Result, VozError};

/// A contiguous block of mono time-domain samples at a known sample rate.
///
/// Produced fresh each analysis tick and owned by the tick that consumes it.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono f32 samples, approximately in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this frame in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Returns true if the frame contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Frequency-bin magnitudes derived from the same instant as an [`AudioFrame`].
///
/// `full_scale` is the largest representable bin value: `1.0` for normalised
/// magnitudes, `255.0` for the byte flavour some analysers expose.
#[derive(Debug, Clone)]
pub struct SpectrumFrame {
    pub magnitudes: Vec<f32>,
    pub sample_rate: u32,
    pub full_scale: f32,
}

impl SpectrumFrame {
    /// Magnitudes already normalised to [0, 1].
    pub fn normalized(magnitudes: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            magnitudes,
            sample_rate,
            full_scale: 1.0,
        }
    }

    /// Byte magnitudes in [0, 255].
    pub fn from_bytes(bins: &[u8], sample_rate: u32) -> Self {
        Self {
            magnitudes: bins.iter().map(|&b| b as f32).collect(),
            sample_rate,
            full_scale: 255.0,
        }
    }

    /// Magnitudes on an arbitrary positive full scale.
    ///
    /// # Errors
    /// `VozError::InvalidFrame` if `full_scale` is not a positive finite number.
    pub fn with_full_scale(magnitudes: Vec<f32>, sample_rate: u32, full_scale: f32) -> Result<Self> {
        if !full_scale.is_finite() || full_scale <= 0.0 {
            return Err(VozError::InvalidFrame(format!(
                "spectrum full scale must be positive, got {full_scale}"
            )));
        }
        Ok(Self {
            magnitudes,
            sample_rate,
            full_scale,
        })
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Bin `i` mapped onto [0, 1], clamped.
    pub fn unit_bin(&self, i: usize) -> f32 {
        self.magnitudes
            .get(i)
            .map(|m| (m / self.full_scale).clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }
}
