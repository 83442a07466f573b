//! Moving average over the last few raw pitch estimates.

use crate::analysis::VoiceRange;
use crate::buffering::window::BoundedHistory;

#[derive(Debug, Clone)]
pub struct PitchSmoother {
    window: BoundedHistory<f32>,
    range: VoiceRange,
}

impl PitchSmoother {
    pub const DEFAULT_WINDOW: usize = 5;

    pub fn new(window: usize, range: VoiceRange) -> Self {
        Self {
            window: BoundedHistory::new(window),
            range,
        }
    }

    /// Feed one raw estimate and return the smoothed pitch.
    ///
    /// A value outside the voice range (including 0, "no pitch") is not
    /// pushed: the tick reports 0 and the window keeps its valid history, so
    /// dropouts never drag the average into a different register.
    pub fn push(&mut self, raw_pitch: f32) -> f32 {
        if !self.range.contains(raw_pitch) {
            return 0.0;
        }
        self.window.push(raw_pitch);
        self.current()
    }

    /// Mean of the window contents, or 0 when empty.
    pub fn current(&self) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.window.iter().sum();
        sum / self.window.len() as f32
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

impl Default for PitchSmoother {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW, VoiceRange::HUMAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sixth_value_evicts_oldest() {
        let mut s = PitchSmoother::default();
        for _ in 0..5 {
            assert_abs_diff_eq!(s.push(100.0), 100.0);
        }
        assert_abs_diff_eq!(s.push(300.0), 140.0);
        assert_eq!(s.len(), 5);
    }

    #[test]
    fn partial_window_averages_what_it_has() {
        let mut s = PitchSmoother::default();
        s.push(100.0);
        assert_abs_diff_eq!(s.push(200.0), 150.0);
    }

    #[test]
    fn invalid_pitch_is_not_averaged() {
        let mut s = PitchSmoother::default();
        s.push(200.0);
        s.push(200.0);
        assert_eq!(s.push(0.0), 0.0);
        assert_eq!(s.push(720.0), 0.0);
        assert_eq!(s.len(), 2);
        assert_abs_diff_eq!(s.push(200.0), 200.0);
    }

    #[test]
    fn reset_clears_history() {
        let mut s = PitchSmoother::default();
        s.push(110.0);
        s.push(115.0);
        s.reset();
        assert!(s.is_empty());
        assert_eq!(s.current(), 0.0);
        assert_abs_diff_eq!(s.push(220.0), 220.0);
    }
}
