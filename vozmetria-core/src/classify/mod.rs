//! Pitch smoothing and voice-register classification.
//!
//! Both stages are stateful and caller-owned. Their state must be cleared with
//! `reset()` at the start of every recording so one session never biases the
//! first seconds of the next.

pub mod gender;
pub mod smoother;

pub use gender::{majority_vote, GenderClassifier, GenderThresholds};
pub use smoother::PitchSmoother;

use serde::{Deserialize, Serialize};

/// Voice register label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "MASCULINA")]
    Male,
    #[serde(rename = "FEMENINA")]
    Female,
    #[default]
    #[serde(rename = "INDETERMINADA")]
    Unknown,
}

impl Gender {
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "MASCULINA",
            Gender::Female => "FEMENINA",
            Gender::Unknown => "INDETERMINADA",
        }
    }

    /// `true` for `Male` and `Female`.
    pub fn is_determined(self) -> bool {
        self != Gender::Unknown
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
