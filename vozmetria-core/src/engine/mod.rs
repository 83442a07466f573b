//! `VoiceAnalyzer`: the per-tick driver and session lifecycle controller.
//!
//! ## Tick order
//!
//! ```text
//! AudioFrame ─► PitchEstimator ─► PitchSmoother ─► GenderClassifier
//! SpectrumFrame ─► IntensityEstimator, VoiceQualityEstimator
//!                                   └─► SessionAggregator (when recording)
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! VoiceAnalyzer::new()
//!     └─► reset()                  → smoothing/vote state cleared
//!         └─► start_session(t0)    → recording, state cleared again
//!             └─► stop_session(t1) → Session handed to the caller
//! ```
//!
//! `tick()` never fails and never blocks. Lifecycle calls in the wrong state
//! return an error rather than panicking.
//!
//! ## Threading
//!
//! The analyzer is plain `&mut self`. Hosts that tick from one thread and
//! start/stop sessions from another share it through [`AnalyzerHandle`], a
//! single mutex around all per-tick state.

pub mod pipeline;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    analysis::{
        AutocorrelationPitch, IntensityEstimator, PitchEstimator, QualityLevel,
        VoiceQualityEstimator, VoiceRange,
    },
    buffering::frame::{AudioFrame, SpectrumFrame},
    classify::{Gender, GenderClassifier, GenderThresholds, PitchSmoother},
    error::{Result, VozError},
    ipc::events::{MeasurementEvent, SessionStatus, SessionStatusEvent},
    session::{Session, SessionAggregator, VoiceMeasurement, DEFAULT_DOMINANT_SHARE},
};

/// Broadcast channel capacity: measurement events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Configuration for `VoiceAnalyzer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Pitch detector RMS silence gate. Default: 0.01.
    pub silence_rms: f32,
    /// Pitch detector edge-trim amplitude. Default: 0.2.
    pub trim_threshold: f32,
    /// Accepted pitch range, exclusive on both ends. Default: (50, 500) Hz.
    pub voice_range: VoiceRange,
    /// Raw pitch values averaged by the smoother. Default: 5.
    pub smoothing_window: usize,
    /// Decisions in the live majority vote. Default: 10.
    pub vote_window: usize,
    pub thresholds: GenderThresholds,
    /// Share of valid measurements needed for a session verdict. Default: 0.6.
    pub dominant_share: f64,
    /// Quality calibration divisor. Default: 10.
    pub quality_scale: f32,
    /// Record ticks with no smoothed pitch in the session log. They never
    /// count towards averages or the verdict. Default: true.
    pub record_unvoiced: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            silence_rms: AutocorrelationPitch::SILENCE_RMS,
            trim_threshold: AutocorrelationPitch::TRIM_THRESHOLD,
            voice_range: VoiceRange::HUMAN,
            smoothing_window: PitchSmoother::DEFAULT_WINDOW,
            vote_window: GenderClassifier::DEFAULT_VOTES,
            thresholds: GenderThresholds::default(),
            dominant_share: DEFAULT_DOMINANT_SHARE,
            quality_scale: VoiceQualityEstimator::DEFAULT_SCALE,
            record_unvoiced: true,
        }
    }
}

impl AnalyzerConfig {
    /// Reject values no analyzer could run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(VozError::InvalidConfig(msg));

        if !(self.silence_rms.is_finite() && self.silence_rms >= 0.0) {
            return invalid(format!("silence_rms must be >= 0, got {}", self.silence_rms));
        }
        if !(self.trim_threshold.is_finite() && self.trim_threshold > 0.0) {
            return invalid(format!(
                "trim_threshold must be > 0, got {}",
                self.trim_threshold
            ));
        }
        let range = self.voice_range;
        if !(range.min_hz.is_finite() && range.max_hz.is_finite())
            || range.min_hz <= 0.0
            || range.min_hz >= range.max_hz
        {
            return invalid(format!(
                "voice range ({}, {}) is empty or inverted",
                range.min_hz, range.max_hz
            ));
        }
        if self.smoothing_window == 0 {
            return invalid("smoothing_window must be at least 1".into());
        }
        if self.vote_window == 0 {
            return invalid("vote_window must be at least 1".into());
        }
        let t = self.thresholds;
        if !(t.male_max_hz.is_finite() && t.female_min_hz.is_finite() && t.overlap_hz.is_finite())
            || t.overlap_hz < 0.0
            || t.male_below() > t.female_above()
        {
            return invalid(format!(
                "gender thresholds leave no consistent band: male below {}, female above {}",
                t.male_below(),
                t.female_above()
            ));
        }
        if !(self.dominant_share > 0.0 && self.dominant_share <= 1.0) {
            return invalid(format!(
                "dominant_share must be in (0, 1], got {}",
                self.dominant_share
            ));
        }
        if !(self.quality_scale.is_finite() && self.quality_scale > 0.0) {
            return invalid(format!(
                "quality_scale must be > 0, got {}",
                self.quality_scale
            ));
        }
        Ok(())
    }
}

/// Scalars produced by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutput {
    pub timestamp: u64,
    /// Detector output before smoothing.
    pub raw_pitch: f32,
    /// Smoothed pitch; 0 when the tick had no valid pitch.
    pub pitch: f32,
    pub intensity: f32,
    pub quality: f32,
    /// Live majority label.
    pub gender: Gender,
    /// Whether the tick was appended to the active session.
    pub recorded: bool,
}

pub struct VoiceAnalyzer {
    config: AnalyzerConfig,
    detector: Box<dyn PitchEstimator>,
    smoother: PitchSmoother,
    classifier: GenderClassifier,
    intensity: IntensityEstimator,
    quality: VoiceQualityEstimator,
    /// Present while a session is recording.
    session: Option<SessionAggregator>,
    /// Timestamp of the most recent tick.
    last_timestamp: u64,
    seq: u64,
    measurement_tx: broadcast::Sender<MeasurementEvent>,
    status_tx: broadcast::Sender<SessionStatusEvent>,
}

impl VoiceAnalyzer {
    /// Build an analyzer with the autocorrelation detector.
    ///
    /// # Errors
    /// `VozError::InvalidConfig` if `config.validate()` fails.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        let detector = AutocorrelationPitch::new(
            config.silence_rms,
            config.trim_threshold,
            config.voice_range,
        );
        Self::with_detector(config, Box::new(detector))
    }

    /// Build an analyzer around a custom pitch backend.
    pub fn with_detector(config: AnalyzerConfig, detector: Box<dyn PitchEstimator>) -> Result<Self> {
        config.validate()?;
        let (measurement_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Ok(Self {
            smoother: PitchSmoother::new(config.smoothing_window, config.voice_range),
            classifier: GenderClassifier::new(
                config.thresholds,
                config.voice_range,
                config.vote_window,
            ),
            intensity: IntensityEstimator,
            quality: VoiceQualityEstimator::new(config.quality_scale),
            detector,
            session: None,
            last_timestamp: 0,
            seq: 0,
            measurement_tx,
            status_tx,
            config,
        })
    }

    /// Run one analysis tick.
    pub fn tick(
        &mut self,
        audio: &AudioFrame,
        spectrum: &SpectrumFrame,
        timestamp_ms: u64,
    ) -> TickOutput {
        let raw_pitch = self.detector.detect(audio);
        let pitch = self.smoother.push(raw_pitch);
        let gender = self.classifier.classify(pitch);
        let intensity = self.intensity.estimate(spectrum);
        let quality = self.quality.estimate(spectrum);

        let mut recorded = false;
        if let Some(session) = self.session.as_mut() {
            if pitch > 0.0 || self.config.record_unvoiced {
                session.append(VoiceMeasurement {
                    timestamp: timestamp_ms,
                    pitch_hz: pitch,
                    intensity,
                    quality,
                    gender,
                });
                recorded = true;
            }
        }

        self.last_timestamp = timestamp_ms;
        self.seq += 1;
        // No subscribers is fine.
        let _ = self.measurement_tx.send(MeasurementEvent {
            seq: self.seq,
            timestamp: timestamp_ms,
            raw_pitch,
            pitch,
            intensity,
            quality,
            quality_level: QualityLevel::from_quality(quality),
            gender,
            recorded,
        });

        TickOutput {
            timestamp: timestamp_ms,
            raw_pitch,
            pitch,
            intensity,
            quality,
            gender,
            recorded,
        }
    }

    /// Clear smoothing and vote state. Call at the start of every recording.
    pub fn reset(&mut self) {
        self.clear_state();
        let session_id = self.session().map(|s| s.id.clone());
        let status = if session_id.is_some() {
            SessionStatus::Recording
        } else {
            SessionStatus::Idle
        };
        self.publish_status(status, session_id, Some("analysis state reset".into()));
    }

    fn clear_state(&mut self) {
        self.smoother.reset();
        self.classifier.reset();
    }

    /// Begin recording a session at `now_ms` and return its id.
    ///
    /// # Errors
    /// `VozError::SessionAlreadyActive` if a session is already recording.
    pub fn start_session(&mut self, now_ms: u64) -> Result<String> {
        if self.session.is_some() {
            return Err(VozError::SessionAlreadyActive);
        }
        self.clear_state();
        let aggregator =
            SessionAggregator::new(now_ms, self.config.voice_range, self.config.dominant_share);
        let id = aggregator.session().id.clone();
        self.session = Some(aggregator);

        info!(session_id = %id, start_ms = now_ms, "session started");
        self.publish_status(SessionStatus::Recording, Some(id.clone()), None);
        Ok(id)
    }

    /// Finalize the active session at `now_ms` and hand it to the caller.
    ///
    /// # Errors
    /// `VozError::NoActiveSession` if nothing is recording.
    pub fn stop_session(&mut self, now_ms: u64) -> Result<Session> {
        let aggregator = self.session.take().ok_or(VozError::NoActiveSession)?;
        let session = aggregator.finalize(now_ms);
        self.publish_status(
            SessionStatus::Finalized,
            Some(session.id.clone()),
            Some(format!("{} measurements", session.measurements.len())),
        );
        Ok(session)
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Snapshot of the active session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref().map(SessionAggregator::session)
    }

    /// Timestamp of the most recent tick (0 before the first).
    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    pub fn subscribe_measurements(&self) -> broadcast::Receiver<MeasurementEvent> {
        self.measurement_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.status_tx.subscribe()
    }

    fn publish_status(
        &self,
        status: SessionStatus,
        session_id: Option<String>,
        detail: Option<String>,
    ) {
        let _ = self.status_tx.send(SessionStatusEvent {
            status,
            session_id,
            detail,
        });
    }
}

impl std::fmt::Debug for VoiceAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceAnalyzer")
            .field("config", &self.config)
            .field("recording", &self.is_recording())
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Thread-safe, cloneable handle to a `VoiceAnalyzer`.
#[derive(Clone)]
pub struct AnalyzerHandle(pub Arc<Mutex<VoiceAnalyzer>>);

impl AnalyzerHandle {
    pub fn new(analyzer: VoiceAnalyzer) -> Self {
        Self(Arc::new(Mutex::new(analyzer)))
    }
}

impl std::fmt::Debug for AnalyzerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerHandle").finish_non_exhaustive()
    }
}
