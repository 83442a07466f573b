//! Live measurement and session lifecycle events.
//!
//! | Event | Published by |
//! |-------|--------------|
//! | `MeasurementEvent` | every analysis tick |
//! | `SessionStatusEvent` | session start / stop, analyzer reset |

use serde::{Deserialize, Serialize};

use crate::analysis::QualityLevel;
use crate::classify::Gender;

// ---------------------------------------------------------------------------
// Measurement events
// ---------------------------------------------------------------------------

/// Per-tick scalars for live display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementEvent {
    /// Monotonically increasing tick sequence number.
    pub seq: u64,
    /// Tick timestamp in monotonic milliseconds.
    pub timestamp: u64,
    /// Detector output before smoothing (0 when undetected).
    pub raw_pitch: f32,
    /// Smoothed pitch in Hz (0 when undetected).
    pub pitch: f32,
    pub intensity: f32,
    pub quality: f32,
    pub quality_level: QualityLevel,
    /// Live register from the short vote window.
    pub gender: Gender,
    /// Whether this tick was appended to an active session.
    pub recorded: bool,
}

// ---------------------------------------------------------------------------
// Session status events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    /// Optional human-readable detail.
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Analysing, nothing recorded.
    Idle,
    /// A session is collecting measurements.
    Recording,
    /// A session was finalized and handed to the caller.
    Finalized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_event_serializes_with_camel_case() {
        let event = MeasurementEvent {
            seq: 4,
            timestamp: 1_234,
            raw_pitch: 181.5,
            pitch: 180.25,
            intensity: 0.4,
            quality: 0.9,
            quality_level: QualityLevel::Excellent,
            gender: Gender::Female,
            recorded: true,
        };

        let json = serde_json::to_value(&event).expect("serialize measurement event");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["rawPitch"], 181.5);
        assert_eq!(json["pitch"], 180.25);
        assert_eq!(json["qualityLevel"], "EXCELENTE");
        assert_eq!(json["gender"], "FEMENINA");
        assert_eq!(json["recorded"], true);

        let round_trip: MeasurementEvent =
            serde_json::from_value(json).expect("deserialize measurement event");
        assert_eq!(round_trip.seq, 4);
        assert_eq!(round_trip.gender, Gender::Female);
    }

    #[test]
    fn session_status_serializes_lowercase() {
        let event = SessionStatusEvent {
            status: SessionStatus::Recording,
            session_id: Some("SESION_ABC".into()),
            detail: None,
        };
        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "recording");
        assert_eq!(json["sessionId"], "SESION_ABC");
        assert!(json["detail"].is_null());
    }

    #[test]
    fn session_status_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<SessionStatus>(r#""Recording""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}
