//! Spectrum front-end: turns a time-domain frame into normalised bin magnitudes.
//!
//! Mirrors what a browser analyser node reports as its frequency data:
//!
//! ```text
//! Blackman window → FFT (N) → |X[k]| / N → smoothing with previous frame
//!     → 20·log10 → map [min_db, max_db] onto [0, 1] (clamped) → N/2 bins
//! ```
//!
//! Smoothing makes the analyzer stateful; call `reset()` between recordings.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::buffering::frame::{AudioFrame, SpectrumFrame};

pub struct SpectrumAnalyzer {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Weight of the previous frame in [0, 1).
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    previous: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub const DEFAULT_SMOOTHING: f32 = 0.3;
    pub const DEFAULT_MIN_DB: f32 = -90.0;
    pub const DEFAULT_MAX_DB: f32 = -10.0;

    /// Create an analyzer for frames of `fft_size` samples.
    ///
    /// `fft_size` is raised to at least 2; `smoothing` is clamped to [0, 0.99];
    /// an empty or inverted dB range falls back to the defaults.
    pub fn new(fft_size: usize, smoothing: f32, min_db: f32, max_db: f32) -> Self {
        let fft_size = fft_size.max(2);
        let (min_db, max_db) = if min_db < max_db {
            (min_db, max_db)
        } else {
            (Self::DEFAULT_MIN_DB, Self::DEFAULT_MAX_DB)
        };
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
        Self {
            fft_size,
            fft,
            window: blackman_window(fft_size),
            smoothing: smoothing.clamp(0.0, 0.99),
            min_db,
            max_db,
            previous: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn with_defaults(fft_size: usize) -> Self {
        Self::new(
            fft_size,
            Self::DEFAULT_SMOOTHING,
            Self::DEFAULT_MIN_DB,
            Self::DEFAULT_MAX_DB,
        )
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyse the most recent `fft_size` samples of `frame` (zero-padded when
    /// shorter) and return `fft_size / 2` normalised magnitudes.
    pub fn analyze(&mut self, frame: &AudioFrame) -> SpectrumFrame {
        let tail = &frame.samples[frame.samples.len().saturating_sub(self.fft_size)..];
        for (i, v) in self.scratch.iter_mut().enumerate() {
            let sample = tail.get(i).copied().unwrap_or(0.0);
            *v = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let db_span = self.max_db - self.min_db;
        let mut bins = Vec::with_capacity(self.bin_count());
        for (k, prev) in self.previous.iter_mut().enumerate() {
            let mag = self.scratch[k].norm() * scale;
            let smoothed = self.smoothing * *prev + (1.0 - self.smoothing) * mag;
            *prev = if smoothed.is_finite() { smoothed } else { 0.0 };
            let db = 20.0 * prev.max(1e-12).log10();
            bins.push(((db - self.min_db) / db_span).clamp(0.0, 1.0));
        }

        SpectrumFrame::normalized(bins, frame.sample_rate)
    }

    /// Forget the smoothing memory.
    pub fn reset(&mut self) {
        self.previous.iter_mut().for_each(|p| *p = 0.0);
    }
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_db", &self.min_db)
            .field("max_db", &self.max_db)
            .finish_non_exhaustive()
    }
}

fn blackman_window(n: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            A0 - A1 * (2.0 * PI * x).cos() + A2 * (4.0 * PI * x).cos()
        })
        .collect()
}
