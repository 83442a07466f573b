//! Time-domain pitch detection by normalised difference autocorrelation.
//!
//! ## Algorithm
//!
//! 1. Gate on RMS: frames quieter than `silence_rms` carry no pitch claim.
//! 2. Trim the frame to `[r1, r2]`, the first/last positions (searched in the
//!    outer halves) where `|x| < trim_threshold`. This drops clipped,
//!    high-energy edges; without a crossing the full frame is used.
//! 3. For each lag `τ`, score similarity as
//!    `1 - mean(|x[i] - x[i + τ]|)` over the overlapping part of `[r1, r2)`.
//!    Lag 0 is perfect self-similarity (score 1).
//! 4. Skip the zero-lag lobe (every lag before the score first falls below
//!    the midpoint of 1 and the lowest score), find the best score past it,
//!    and take the earliest local peak within `OCTAVE_TOLERANCE` of it,
//!    settled on the highest-scoring lag of that run above the tolerance floor.
//!    Periodic signals score almost equally at `T`, `2T`, `3T`…; the
//!    earliest one is the fundamental. A frame whose scores only fall (a
//!    period longer than the lag cap) has no peak and no pitch.
//! 5. Refine the lag with a parabola through `(τ-1, τ, τ+1)`, unless the
//!    curvature is exactly zero.
//! 6. `pitch = sample_rate / τ`, gated to the voice range.
//!
//! Cost is O(span × max_lag). Lags are capped at `sample_rate / min_hz` (plus
//! a margin for refinement), since anything longer gates to 0 anyway.

use super::{rms, PitchEstimator, VoiceRange};
use crate::buffering::frame::AudioFrame;

/// Autocorrelation pitch detector.
#[derive(Debug, Clone)]
pub struct AutocorrelationPitch {
    /// Frames with RMS below this are treated as silence.
    silence_rms: f32,
    /// Amplitude below which an edge sample counts as a trim point.
    trim_threshold: f32,
    range: VoiceRange,
    /// Similarity score per lag, reused between frames.
    scores: Vec<f32>,
}

impl AutocorrelationPitch {
    pub const SILENCE_RMS: f32 = 0.01;
    pub const TRIM_THRESHOLD: f32 = 0.2;
    /// Fraction of the (best − worst) score spread an earlier peak may trail
    /// the best one by and still be preferred.
    pub const OCTAVE_TOLERANCE: f32 = 0.1;
    /// Extra lags past `sample_rate / min_hz` so the refinement has a right
    /// neighbour at the range edge.
    const LAG_MARGIN: usize = 2;

    pub fn new(silence_rms: f32, trim_threshold: f32, range: VoiceRange) -> Self {
        Self {
            silence_rms,
            trim_threshold,
            range,
            scores: Vec::new(),
        }
    }

    /// Detect the pitch of raw samples at `sample_rate`.
    pub fn detect_samples(&mut self, samples: &[f32], sample_rate: u32) -> f32 {
        if samples.len() < 4 || sample_rate == 0 {
            return 0.0;
        }
        if rms(samples) < self.silence_rms {
            return 0.0;
        }

        let (r1, r2) = trim_bounds(samples, self.trim_threshold);
        let Some(lag) = self.best_lag(samples, r1, r2, sample_rate) else {
            return 0.0;
        };

        self.range.gate(sample_rate as f32 / lag)
    }

    /// Refined best lag in samples, or `None` if the span is too short or the
    /// scores never rise back to a peak.
    fn best_lag(&mut self, samples: &[f32], r1: usize, r2: usize, sample_rate: u32) -> Option<f32> {
        let span = r2.checked_sub(r1)?;
        let range_cap = (sample_rate as f32 / self.range.min_hz.max(1.0)).ceil() as usize
            + Self::LAG_MARGIN;
        let max_lag = (span / 2).min(range_cap);
        if max_lag < 3 {
            return None;
        }

        self.scores.clear();
        self.scores.resize(max_lag + 1, 0.0);
        self.scores[0] = 1.0;
        for lag in 1..=max_lag {
            let overlap = span - lag;
            let diff: f32 = (r1..r2 - lag)
                .map(|i| (samples[i] - samples[i + lag]).abs())
                .sum();
            self.scores[lag] = 1.0 - diff / overlap as f32;
        }
        let scores = &self.scores;

        // The zero-lag lobe ends where the score first drops below the midpoint
        // between perfect similarity and the deepest trough. A single rise
        // inside the lobe (noise) does not end it.
        let worst = scores[1..].iter().copied().fold(f32::INFINITY, f32::min);
        let lobe_floor = (1.0 + worst) / 2.0;
        let start = (1..=max_lag).find(|&lag| scores[lag] < lobe_floor)?;

        let best = scores[start..].iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = best - Self::OCTAVE_TOLERANCE * (best - worst);
        let is_peak = |lag: usize| {
            scores[lag] >= scores[lag - 1] && (lag == max_lag || scores[lag] >= scores[lag + 1])
        };
        let first = (start..=max_lag).find(|&lag| scores[lag] >= floor && is_peak(lag))?;

        // Settle on the top of the run above the floor.
        let mut lag = first;
        for candidate in first + 1..=max_lag {
            if scores[candidate] < floor {
                break;
            }
            if scores[candidate] > scores[lag] {
                lag = candidate;
            }
        }

        let mut refined = lag as f32;
        if lag < max_lag {
            let (y1, y2, y3) = (scores[lag - 1], scores[lag], scores[lag + 1]);
            let a = (y1 - 2.0 * y2 + y3) / 2.0;
            let b = (y3 - y1) / 2.0;
            if a != 0.0 {
                refined -= b / (2.0 * a);
            }
        }

        (refined > 0.0).then_some(refined)
    }
}

impl Default for AutocorrelationPitch {
    fn default() -> Self {
        Self::new(Self::SILENCE_RMS, Self::TRIM_THRESHOLD, VoiceRange::HUMAN)
    }
}

impl PitchEstimator for AutocorrelationPitch {
    fn detect(&mut self, frame: &AudioFrame) -> f32 {
        self.detect_samples(&frame.samples, frame.sample_rate)
    }
}

/// First/last sample in the outer halves whose magnitude falls below `threshold`.
fn trim_bounds(samples: &[f32], threshold: f32) -> (usize, usize) {
    let n = samples.len();
    let half = (n + 1) / 2;
    let r1 = (0..half)
        .find(|&i| samples[i].abs() < threshold)
        .unwrap_or(0);
    let r2 = (1..half)
        .map(|i| n - i)
        .find(|&i| samples[i].abs() < threshold)
        .unwrap_or(n - 1);
    (r1, r2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    const SR: u32 = 44_100;

    fn sine(freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SR as f32).sin())
            .collect()
    }

    fn detect(samples: &[f32]) -> f32 {
        AutocorrelationPitch::default().detect(&AudioFrame::new(samples.to_vec(), SR))
    }

    #[test]
    fn detects_female_range_sine() {
        let pitch = detect(&sine(220.0, 0.5, 4096));
        assert_abs_diff_eq!(pitch, 220.0, epsilon = 2.0);
    }

    #[test]
    fn detects_male_range_sine() {
        let pitch = detect(&sine(120.0, 0.5, 4096));
        assert_abs_diff_eq!(pitch, 120.0, epsilon = 1.5);
    }

    #[test]
    fn detects_voice_like_harmonic_mix() {
        let f0 = 150.0;
        let samples: Vec<f32> = sine(f0, 0.4, 4096)
            .iter()
            .zip(sine(2.0 * f0, 0.2, 4096))
            .zip(sine(3.0 * f0, 0.1, 4096))
            .map(|((a, b), c)| a + b + c)
            .collect();
        let pitch = detect(&samples);
        assert_abs_diff_eq!(pitch, f0, epsilon = 2.0);
    }

    /// Sum of four uniforms in [-0.5, 0.5] per sample, from a fixed LCG seed.
    fn noise(seed: u64, scale: f32, len: usize) -> Vec<f32> {
        let mut state = seed;
        let mut uniform = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 40) as f32 / (1u64 << 24) as f32 - 0.5
        };
        (0..len)
            .map(|_| scale * (0..4).map(|_| uniform()).sum::<f32>())
            .collect()
    }

    #[test]
    fn detects_pitch_in_moderate_noise() {
        // Noise RMS ≈ 0.058 against a 0.4 sine, about 14 dB SNR.
        let f0 = 150.0;
        for seed in 1..=5 {
            let samples: Vec<f32> = sine(f0, 0.4, 4096)
                .iter()
                .zip(noise(seed, 0.1, 4096))
                .map(|(s, n)| s + n)
                .collect();
            let pitch = detect(&samples);
            assert_abs_diff_eq!(pitch, f0, epsilon = 3.0);
        }
    }

    #[test]
    fn falling_scores_without_a_peak_have_no_pitch() {
        // At 20 Hz the half period is past the lag cap, so scores only fall.
        assert_eq!(detect(&sine(20.0, 0.5, 4096)), 0.0);
    }

    #[test]
    fn quiet_frame_returns_zero() {
        // RMS ≈ 0.0035 < 0.01
        assert_eq!(detect(&sine(200.0, 0.005, 4096)), 0.0);
        assert_eq!(detect(&vec![0.0; 4096]), 0.0);
    }

    #[test]
    fn empty_and_tiny_frames_return_zero() {
        assert_eq!(detect(&[]), 0.0);
        assert_eq!(detect(&[0.5, -0.5, 0.5]), 0.0);
    }

    #[test]
    fn zero_sample_rate_returns_zero() {
        let mut det = AutocorrelationPitch::default();
        assert_eq!(det.detect_samples(&sine(200.0, 0.5, 2048), 0), 0.0);
    }

    #[test]
    fn above_voice_range_is_gated() {
        assert_eq!(detect(&sine(1_000.0, 0.5, 4096)), 0.0);
    }

    #[test]
    fn below_voice_range_is_gated() {
        assert_eq!(detect(&sine(30.0, 0.5, 4096)), 0.0);
    }

    #[test]
    fn constant_frame_has_no_pitch() {
        assert_eq!(detect(&vec![0.5; 4096]), 0.0);
    }

    #[test]
    fn detection_is_deterministic() {
        let samples = sine(175.0, 0.3, 4096);
        let mut det = AutocorrelationPitch::default();
        let a = det.detect_samples(&samples, SR);
        let b = det.detect_samples(&samples, SR);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn trim_bounds_default_to_full_frame_without_crossing() {
        let loud = vec![0.9f32; 64];
        assert_eq!(trim_bounds(&loud, 0.2), (0, 63));
    }

    #[test]
    fn trim_bounds_skip_loud_edges() {
        let mut samples = vec![0.0f32; 16];
        samples[0] = 0.9;
        samples[1] = 0.8;
        samples[15] = 0.9;
        assert_eq!(trim_bounds(&samples, 0.2), (2, 14));
    }
}
