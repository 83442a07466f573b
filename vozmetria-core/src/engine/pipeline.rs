//! Blocking frame pipeline.
//!
//! ## Pipeline stages (per iteration)
//!
//! ```text
//! 1. FrameSource::next_frames()
//!      RingFrameSource: drain ring → SampleWindow → (full window, one hop)
//!                       → AudioFrame + SpectrumAnalyzer → SpectrumFrame
//! 2. VoiceAnalyzer::tick under the handle's mutex
//! 3. Update PipelineDiagnostics
//! ```
//!
//! Timestamps come from the sample clock (`samples consumed · 1000 / rate`),
//! so a given input always yields the same measurements whatever the
//! wall-clock pacing of the source.
//!
//! This loop runs in `spawn_blocking`, keeping the Tokio executor free for
//! event forwarding and file I/O.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::{
    analysis::SpectrumAnalyzer,
    buffering::{
        frame::{AudioFrame, SpectrumFrame},
        window::SampleWindow,
        Consumer, Observer, SampleConsumer,
    },
    engine::AnalyzerHandle,
    error::{Result, VozError},
};

/// Sleep when the ring is empty (avoids busy-wait burning a core).
const SLEEP_EMPTY_MS: u64 = 5;

/// Emit a level `debug!` line every this many ticks (~1 s at 60 Hz).
const LEVEL_LOG_EVERY: usize = 60;

#[derive(Default)]
pub struct PipelineDiagnostics {
    pub samples_in: AtomicUsize,
    pub frames_analyzed: AtomicUsize,
    pub voiced_frames: AtomicUsize,
    pub measurements_recorded: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.samples_in.store(0, Ordering::Relaxed);
        self.frames_analyzed.store(0, Ordering::Relaxed);
        self.voiced_frames.store(0, Ordering::Relaxed);
        self.measurements_recorded.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            samples_in: self.samples_in.load(Ordering::Relaxed),
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            voiced_frames: self.voiced_frames.load(Ordering::Relaxed),
            measurements_recorded: self.measurements_recorded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub samples_in: usize,
    pub frames_analyzed: usize,
    pub voiced_frames: usize,
    pub measurements_recorded: usize,
}

// ---------------------------------------------------------------------------
// Frame assembly
// ---------------------------------------------------------------------------

/// Analysis window length and stride, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub frame_size: usize,
    pub hop_size: usize,
}

impl FrameGeometry {
    /// Hop that yields `tick_rate_hz` frames per second of audio.
    pub fn from_tick_rate(frame_size: usize, sample_rate: u32, tick_rate_hz: f32) -> Self {
        let hop = if tick_rate_hz.is_finite() && tick_rate_hz > 0.0 {
            (sample_rate as f32 / tick_rate_hz).round() as usize
        } else {
            frame_size
        };
        Self {
            frame_size,
            hop_size: hop.max(1),
        }
    }
}

/// One tick's worth of input.
#[derive(Debug, Clone)]
pub struct FrameSet {
    pub audio: AudioFrame,
    pub spectrum: SpectrumFrame,
    pub timestamp_ms: u64,
}

/// Delivers frame pairs to the pipeline. `None` ends the run.
pub trait FrameSource {
    fn next_frames(&mut self) -> Option<FrameSet>;
}

/// Turns a sample stream into overlapping frame pairs.
///
/// The first frame is emitted once `frame_size` samples have arrived, then
/// one frame per `hop_size` further samples.
#[derive(Debug)]
pub struct FrameAssembler {
    window: SampleWindow,
    spectrum: SpectrumAnalyzer,
    sample_rate: u32,
    hop_size: usize,
    /// Samples accepted since the last emitted frame (once primed).
    pending: usize,
    consumed: u64,
}

impl FrameAssembler {
    /// # Errors
    /// `VozError::InvalidFrame` for a zero frame size, hop or sample rate.
    pub fn new(geometry: FrameGeometry, sample_rate: u32, spectrum: SpectrumAnalyzer) -> Result<Self> {
        if geometry.frame_size == 0 || geometry.hop_size == 0 {
            return Err(VozError::InvalidFrame(format!(
                "frame size {} / hop {} must be non-zero",
                geometry.frame_size, geometry.hop_size
            )));
        }
        if sample_rate == 0 {
            return Err(VozError::InvalidFrame("sample rate must be non-zero".into()));
        }
        Ok(Self {
            window: SampleWindow::new(geometry.frame_size),
            spectrum,
            sample_rate,
            hop_size: geometry.hop_size,
            pending: 0,
            consumed: 0,
        })
    }

    /// Start over for a new recording: empty window, sample clock back at
    /// zero, spectrum smoothing forgotten.
    pub fn reset(&mut self) {
        self.window.clear();
        self.spectrum.reset();
        self.pending = 0;
        self.consumed = 0;
    }

    /// Samples still needed before the next frame is emitted.
    pub fn wanted(&self) -> usize {
        if self.window.is_full() {
            self.hop_size - self.pending
        } else {
            self.window.size() - self.window.len()
        }
    }

    /// Accept up to `wanted()` samples from `samples`. Returns how many were
    /// taken and the frame they completed, if any.
    pub fn push(&mut self, samples: &[f32]) -> (usize, Option<FrameSet>) {
        let primed = self.window.is_full();
        let taken = samples.len().min(self.wanted());
        self.window.extend(&samples[..taken]);
        self.consumed += taken as u64;

        let ready = if primed {
            self.pending += taken;
            self.pending == self.hop_size
        } else {
            self.window.is_full()
        };
        if !ready {
            return (taken, None);
        }
        self.pending = 0;

        let audio = self.window.to_frame(self.sample_rate);
        let spectrum = self.spectrum.analyze(&audio);
        let timestamp_ms = self.consumed * 1_000 / self.sample_rate as u64;
        (
            taken,
            Some(FrameSet {
                audio,
                spectrum,
                timestamp_ms,
            }),
        )
    }
}

/// Frames over an in-memory sample buffer.
#[derive(Debug)]
pub struct SliceFrameSource {
    samples: Vec<f32>,
    position: usize,
    assembler: FrameAssembler,
}

impl SliceFrameSource {
    pub fn new(samples: Vec<f32>, assembler: FrameAssembler) -> Self {
        Self {
            samples,
            position: 0,
            assembler,
        }
    }
}

impl FrameSource for SliceFrameSource {
    fn next_frames(&mut self) -> Option<FrameSet> {
        while self.position < self.samples.len() {
            let (taken, frames) = self.assembler.push(&self.samples[self.position..]);
            self.position += taken;
            if frames.is_some() {
                return frames;
            }
        }
        None
    }
}

/// Frames over the consumer half of the sample ring.
///
/// Ends when `running` is cleared, or when `finished` is set by the producer
/// and the ring has been drained.
pub struct RingFrameSource {
    consumer: SampleConsumer,
    assembler: FrameAssembler,
    scratch: Vec<f32>,
    finished: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl RingFrameSource {
    pub fn new(
        consumer: SampleConsumer,
        assembler: FrameAssembler,
        finished: Arc<AtomicBool>,
        running: Arc<AtomicBool>,
        diagnostics: Arc<PipelineDiagnostics>,
    ) -> Self {
        let scratch = vec![0.0; assembler.window.size().max(assembler.hop_size)];
        Self {
            consumer,
            assembler,
            scratch,
            finished,
            running,
            diagnostics,
        }
    }
}

impl FrameSource for RingFrameSource {
    fn next_frames(&mut self) -> Option<FrameSet> {
        loop {
            if !self.running.load(Ordering::Relaxed) {
                return None;
            }

            let want = self.assembler.wanted().min(self.scratch.len());
            let n = self.consumer.pop_slice(&mut self.scratch[..want]);
            if n == 0 {
                // `finished` is stored after the last push, so an empty ring
                // seen after it is really the end of the input.
                if self.finished.load(Ordering::Acquire) && self.consumer.is_empty() {
                    return None;
                }
                std::thread::sleep(Duration::from_millis(SLEEP_EMPTY_MS));
                continue;
            }

            self.diagnostics.samples_in.fetch_add(n, Ordering::Relaxed);
            let (_, frames) = self.assembler.push(&self.scratch[..n]);
            if frames.is_some() {
                return frames;
            }
        }
    }
}

impl std::fmt::Debug for RingFrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingFrameSource")
            .field("assembler", &self.assembler)
            .field("finished", &self.finished.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// All context the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub analyzer: AnalyzerHandle,
    pub source: Box<dyn FrameSource + Send>,
    pub running: Arc<AtomicBool>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Run the blocking pipeline until `ctx.running` is cleared or the source
/// runs dry. Clears `running` on exit.
pub fn run(mut ctx: PipelineContext) {
    info!("pipeline started");
    let started = Instant::now();

    while ctx.running.load(Ordering::Relaxed) {
        let Some(frames) = ctx.source.next_frames() else {
            break;
        };

        let out = ctx
            .analyzer
            .0
            .lock()
            .tick(&frames.audio, &frames.spectrum, frames.timestamp_ms);

        let ticks = ctx.diagnostics.frames_analyzed.fetch_add(1, Ordering::Relaxed) + 1;
        if out.pitch > 0.0 {
            ctx.diagnostics.voiced_frames.fetch_add(1, Ordering::Relaxed);
        }
        if out.recorded {
            ctx.diagnostics
                .measurements_recorded
                .fetch_add(1, Ordering::Relaxed);
        }

        if ticks % LEVEL_LOG_EVERY == 0 {
            debug!(
                t_ms = out.timestamp,
                pitch = out.pitch,
                intensity = out.intensity,
                quality = out.quality,
                gender = %out.gender,
                "level check"
            );
        }
    }

    ctx.running.store(false, Ordering::SeqCst);
    let snapshot = ctx.diagnostics.snapshot();
    info!(
        ticks = snapshot.frames_analyzed,
        voiced = snapshot.voiced_frames,
        recorded = snapshot.measurements_recorded,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pipeline stopped"
    );
}
