//! Session export record.
//!
//! The JSON layout is shared with other tools that read exported sessions,
//! so field names and the summary filtering rules are fixed:
//!
//! - `validSamples` counts pitch in (50, 500), whatever voice range the
//!   session was aggregated with
//! - `pitchRange.min` is taken over pitch > 50, `pitchRange.max` over
//!   pitch < 500 (the asymmetry is part of the format); `null` when empty
//! - `durationMinutes` is rounded to 2 decimals

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::Session;
use crate::analysis::{is_valid_pitch, MAX_VOICE_HZ, MIN_VOICE_HZ};
use crate::error::{Result, VozError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchRangeSummary {
    pub min: Option<f32>,
    pub max: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total_samples: usize,
    pub valid_samples: usize,
    pub duration_minutes: f64,
    pub pitch_range: PitchRangeSummary,
}

impl SessionSummary {
    pub fn from_session(session: &Session) -> Self {
        let pitches = || session.measurements.iter().map(|m| m.pitch_hz);
        let min = pitches()
            .filter(|&p| p > MIN_VOICE_HZ)
            .fold(None, |acc: Option<f32>, p| Some(acc.map_or(p, |a| a.min(p))));
        let max = pitches()
            .filter(|&p| p < MAX_VOICE_HZ)
            .fold(None, |acc: Option<f32>, p| Some(acc.map_or(p, |a| a.max(p))));

        Self {
            total_samples: session.measurements.len(),
            valid_samples: pitches().filter(|&p| is_valid_pitch(p)).count(),
            duration_minutes: (session.duration as f64 / 60_000.0 * 100.0).round() / 100.0,
            pitch_range: PitchRangeSummary { min, max },
        }
    }
}

/// A finalized session plus export metadata, serialised as one flat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    #[serde(flatten)]
    pub session: Session,
    /// RFC 3339 UTC timestamp of the export.
    pub export_date: String,
    pub summary: SessionSummary,
}

impl SessionExport {
    /// Build an export from a finalized session.
    ///
    /// # Errors
    /// `VozError::SessionNotFinalized` if the session has no end time yet.
    pub fn from_session(session: Session) -> Result<Self> {
        if !session.is_finalized() {
            return Err(VozError::SessionNotFinalized);
        }
        let summary = SessionSummary::from_session(&session);
        Ok(Self {
            session,
            export_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            summary,
        })
    }

    /// File name used by hosts that write exports to disk.
    pub fn file_name(&self) -> String {
        format!("sesion_voz_{}.json", self.session.id)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Whether the stored summary matches one recomputed from the log.
    pub fn verify_summary(&self) -> bool {
        SessionSummary::from_session(&self.session) == self.summary
    }
}
