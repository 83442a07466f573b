//! Session recording: folds a stream of per-tick measurements into running
//! statistics and a session-level register verdict.
//!
//! The session verdict (`dominant_gender`) looks at every valid measurement of
//! the session and needs a clear share to commit. It never reads the live
//! classifier's 10-vote window, which only drives per-tick feedback.

pub mod export;

pub use export::{PitchRangeSummary, SessionExport, SessionSummary};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::VoiceRange;
use crate::classify::Gender;

/// Share of valid measurements one register needs to become dominant.
pub const DEFAULT_DOMINANT_SHARE: f64 = 0.6;

/// One analysis tick as recorded in a session log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceMeasurement {
    /// Monotonic milliseconds.
    pub timestamp: u64,
    /// Smoothed pitch in Hz, 0 when undetected.
    #[serde(rename = "pitch")]
    pub pitch_hz: f32,
    /// Intensity in [0, 1].
    pub intensity: f32,
    /// Voice quality in [0, 1].
    #[serde(rename = "voiceQuality")]
    pub quality: f32,
    pub gender: Gender,
}

/// A recorded session. Owned by whoever started it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub start_time: u64,
    pub end_time: Option<u64>,
    #[serde(rename = "voiceData")]
    pub measurements: Vec<VoiceMeasurement>,
    pub average_pitch: f32,
    pub average_intensity: f32,
    pub average_quality: f32,
    pub dominant_gender: Gender,
    /// Milliseconds; frozen by `SessionAggregator::finalize`.
    pub duration: u64,
}

impl Session {
    /// An empty session starting at `start_time` (ms).
    pub fn new(start_time: u64) -> Self {
        Self {
            id: session_id(start_time),
            start_time,
            end_time: None,
            measurements: Vec::new(),
            average_pitch: 0.0,
            average_intensity: 0.0,
            average_quality: 0.0,
            dominant_gender: Gender::Unknown,
            duration: 0,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.end_time.is_some()
    }

    /// Measurements whose pitch lies in (50, 500) Hz.
    ///
    /// This is the export format's notion of validity and stays fixed even
    /// when the session was aggregated with a narrower or wider
    /// [`VoiceRange`]; the averages and the dominant verdict follow the
    /// aggregator's range instead.
    pub fn valid_measurements(&self) -> impl Iterator<Item = &VoiceMeasurement> {
        self.measurements
            .iter()
            .filter(|m| VoiceRange::HUMAN.contains(m.pitch_hz))
    }
}

/// `SESION_` followed by the start time in upper-case base 36.
pub fn session_id(start_time: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut n = start_time;
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    digits.reverse();
    format!("SESION_{}", String::from_utf8_lossy(&digits))
}

/// Incrementally maintains a [`Session`]'s aggregates.
///
/// Averages cover only measurements in the aggregator's voice range. While none exist the
/// previous averages are kept.
#[derive(Debug, Clone)]
pub struct SessionAggregator {
    session: Session,
    range: VoiceRange,
    dominant_share: f64,
    valid: usize,
    male: usize,
    female: usize,
    pitch_sum: f64,
    intensity_sum: f64,
    quality_sum: f64,
}

impl SessionAggregator {
    pub fn new(start_time: u64, range: VoiceRange, dominant_share: f64) -> Self {
        Self {
            session: Session::new(start_time),
            range,
            dominant_share,
            valid: 0,
            male: 0,
            female: 0,
            pitch_sum: 0.0,
            intensity_sum: 0.0,
            quality_sum: 0.0,
        }
    }

    /// Start with the default voice range and dominant share.
    pub fn start(start_time: u64) -> Self {
        Self::new(start_time, VoiceRange::HUMAN, DEFAULT_DOMINANT_SHARE)
    }

    /// Fold one measurement into the session.
    pub fn append(&mut self, measurement: VoiceMeasurement) {
        self.session.duration = measurement
            .timestamp
            .saturating_sub(self.session.start_time);
        self.session.measurements.push(measurement);

        if !self.range.contains(measurement.pitch_hz) {
            return;
        }
        self.valid += 1;
        match measurement.gender {
            Gender::Male => self.male += 1,
            Gender::Female => self.female += 1,
            Gender::Unknown => {}
        }
        self.pitch_sum += measurement.pitch_hz as f64;
        self.intensity_sum += measurement.intensity as f64;
        self.quality_sum += measurement.quality as f64;

        let n = self.valid as f64;
        self.session.average_pitch = (self.pitch_sum / n) as f32;
        self.session.average_intensity = (self.intensity_sum / n) as f32;
        self.session.average_quality = (self.quality_sum / n) as f32;
        self.session.dominant_gender =
            verdict(self.male, self.female, self.valid, self.dominant_share);
    }

    /// Current snapshot.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn valid_count(&self) -> usize {
        self.valid
    }

    /// Freeze `end_time` and `duration` and hand the session over.
    pub fn finalize(mut self, end_time: u64) -> Session {
        let end_time = end_time.max(self.session.start_time);
        self.session.end_time = Some(end_time);
        self.session.duration = end_time - self.session.start_time;
        info!(
            session_id = %self.session.id,
            samples = self.session.measurements.len(),
            valid = self.valid,
            duration_ms = self.session.duration,
            dominant = %self.session.dominant_gender,
            "session finalized"
        );
        self.session
    }
}

/// Session-level verdict over a measurement log, counting only measurements
/// whose pitch lies in `range`.
pub fn dominant_gender<'a, I>(measurements: I, range: VoiceRange, share: f64) -> Gender
where
    I: IntoIterator<Item = &'a VoiceMeasurement>,
{
    let (mut valid, mut male, mut female) = (0usize, 0usize, 0usize);
    for m in measurements.into_iter().filter(|m| range.contains(m.pitch_hz)) {
        valid += 1;
        match m.gender {
            Gender::Male => male += 1,
            Gender::Female => female += 1,
            Gender::Unknown => {}
        }
    }
    verdict(male, female, valid, share)
}

fn verdict(male: usize, female: usize, valid: usize, share: f64) -> Gender {
    if valid == 0 {
        return Gender::Unknown;
    }
    let total = valid as f64;
    if male as f64 / total >= share {
        Gender::Male
    } else if female as f64 / total >= share {
        Gender::Female
    } else {
        Gender::Unknown
    }
}

/// Summary statistics over valid pitch values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PitchStats {
    pub average: f32,
    pub min: f32,
    pub max: f32,
    /// Population variance.
    pub variance: f32,
}

/// Average, min, max and variance of the values inside the voice range; all
/// zero when there are none.
pub fn pitch_stats<I: IntoIterator<Item = f32>>(values: I) -> PitchStats {
    let valid: Vec<f64> = values
        .into_iter()
        .filter(|&p| VoiceRange::HUMAN.contains(p))
        .map(f64::from)
        .collect();
    if valid.is_empty() {
        return PitchStats::default();
    }
    let n = valid.len() as f64;
    let average = valid.iter().sum::<f64>() / n;
    let variance = valid.iter().map(|p| (p - average).powi(2)).sum::<f64>() / n;
    let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
    let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    PitchStats {
        average: average as f32,
        min: min as f32,
        max: max as f32,
        variance: variance as f32,
    }
}
