//! # vozmetria-core
//!
//! Real-time voice analysis engine: pitch, intensity, a voice clarity score,
//! a smoothed male/female register estimate, and session recording.
//!
//! ## Architecture
//!
//! ```text
//! Sample source → SPSC RingBuffer → Pipeline(spawn_blocking)
//!                                        │
//!                          SampleWindow + SpectrumAnalyzer
//!                                        │
//!                   VoiceAnalyzer::tick (pitch → smooth → classify
//!                                        → intensity → quality → session)
//!                                        │
//!                      broadcast::Sender<MeasurementEvent>
//! ```
//!
//! Per-tick analysis never fails: "no signal" is a value (pitch 0,
//! intensity 0, gender Unknown). Only session lifecycle, configuration and
//! export operations return [`VozError`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod analysis;
pub mod buffering;
pub mod classify;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod session;

// Convenience re-exports for downstream crates
pub use analysis::{PitchEstimator, QualityLevel, VoiceRange};
pub use buffering::frame::{AudioFrame, SpectrumFrame};
pub use classify::{Gender, GenderThresholds};
pub use engine::{AnalyzerConfig, AnalyzerHandle, TickOutput, VoiceAnalyzer};
pub use error::VozError;
pub use ipc::events::{MeasurementEvent, SessionStatus, SessionStatusEvent};
pub use session::{Session, SessionExport, SessionSummary, VoiceMeasurement};
