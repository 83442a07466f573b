//! Hysteresis classifier with majority-vote smoothing.
//!
//! ## Decision per tick
//!
//! ```text
//! pitch outside voice range        → Unknown
//! pitch <  male_max − overlap      → Male
//! pitch >  female_min + overlap    → Female
//! otherwise (overlap band)         → last buffered decision if Male/Female,
//!                                    else Unknown
//! ```
//!
//! Every tentative decision, Unknown included, goes into a FIFO vote buffer.
//! The emitted label is the buffer majority; when Unknown holds the maximum,
//! or Male and Female tie for it, the classifier emits Unknown.
//!
//! The overlap band looks at the *last buffered* decision, so a single
//! invalid tick (Unknown vote) ends the stickiness until a value outside the
//! band re-establishes a register.

use serde::{Deserialize, Serialize};

use super::Gender;
use crate::analysis::VoiceRange;
use crate::buffering::window::BoundedHistory;

/// Empirical band edges, in Hz. Kept configurable; the defaults have no
/// derivation beyond calibration on typical adult voices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct GenderThresholds {
    pub male_max_hz: f32,
    pub female_min_hz: f32,
    pub overlap_hz: f32,
}

impl GenderThresholds {
    /// Pitches strictly below this are Male.
    pub fn male_below(&self) -> f32 {
        self.male_max_hz - self.overlap_hz
    }

    /// Pitches strictly above this are Female.
    pub fn female_above(&self) -> f32 {
        self.female_min_hz + self.overlap_hz
    }
}

impl Default for GenderThresholds {
    fn default() -> Self {
        Self {
            male_max_hz: 165.0,
            female_min_hz: 150.0,
            overlap_hz: 15.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenderClassifier {
    thresholds: GenderThresholds,
    range: VoiceRange,
    votes: BoundedHistory<Gender>,
}

impl GenderClassifier {
    pub const DEFAULT_VOTES: usize = 10;

    pub fn new(thresholds: GenderThresholds, range: VoiceRange, vote_window: usize) -> Self {
        Self {
            thresholds,
            range,
            votes: BoundedHistory::new(vote_window),
        }
    }

    /// Classify one smoothed pitch value and return the majority label.
    pub fn classify(&mut self, pitch_hz: f32) -> Gender {
        let tentative = self.tentative(pitch_hz);
        self.votes.push(tentative);
        majority_vote(self.votes.iter().copied())
    }

    fn tentative(&self, pitch_hz: f32) -> Gender {
        if !self.range.contains(pitch_hz) {
            return Gender::Unknown;
        }
        if pitch_hz < self.thresholds.male_below() {
            Gender::Male
        } else if pitch_hz > self.thresholds.female_above() {
            Gender::Female
        } else {
            match self.votes.last() {
                Some(&previous) if previous.is_determined() => previous,
                _ => Gender::Unknown,
            }
        }
    }

    /// Buffered votes, oldest first.
    pub fn votes(&self) -> impl Iterator<Item = Gender> + '_ {
        self.votes.iter().copied()
    }

    pub fn reset(&mut self) {
        self.votes.clear();
    }
}

impl Default for GenderClassifier {
    fn default() -> Self {
        Self::new(
            GenderThresholds::default(),
            VoiceRange::HUMAN,
            Self::DEFAULT_VOTES,
        )
    }
}

/// Majority label over `votes`; Unknown on an empty set, an Unknown majority
/// or a Male/Female tie.
pub fn majority_vote<I: IntoIterator<Item = Gender>>(votes: I) -> Gender {
    let (mut male, mut female, mut unknown) = (0usize, 0usize, 0usize);
    for vote in votes {
        match vote {
            Gender::Male => male += 1,
            Gender::Female => female += 1,
            Gender::Unknown => unknown += 1,
        }
    }
    let max = male.max(female).max(unknown);
    if unknown == max || (male == max && female == max) {
        Gender::Unknown
    } else if male == max {
        Gender::Male
    } else {
        Gender::Female
    }
}
