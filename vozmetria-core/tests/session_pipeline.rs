use std::f32::consts::PI;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use vozmetria_core::analysis::SpectrumAnalyzer;
use vozmetria_core::buffering::{create_sample_ring, Producer};
use vozmetria_core::engine::pipeline::{
    self, FrameAssembler, FrameGeometry, PipelineDiagnostics, RingFrameSource, SliceFrameSource,
};
use vozmetria_core::{
    AnalyzerConfig, AnalyzerHandle, Gender, MeasurementEvent, SessionExport, VoiceAnalyzer,
};

const SR: u32 = 44_100;
const FRAME: usize = 4096;

fn tone(freq: f32, secs: f32) -> Vec<f32> {
    let n = (SR as f32 * secs) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / SR as f32;
            // Fundamental plus two weaker harmonics.
            0.4 * (2.0 * PI * freq * t).sin()
                + 0.15 * (2.0 * PI * 2.0 * freq * t).sin()
                + 0.05 * (2.0 * PI * 3.0 * freq * t).sin()
        })
        .collect()
}

fn assembler() -> FrameAssembler {
    FrameAssembler::new(
        FrameGeometry::from_tick_rate(FRAME, SR, 60.0),
        SR,
        SpectrumAnalyzer::with_defaults(FRAME),
    )
    .expect("valid geometry")
}

fn analyzer() -> AnalyzerHandle {
    AnalyzerHandle::new(VoiceAnalyzer::new(AnalyzerConfig::default()).expect("default config"))
}

fn recv_with_timeout(
    rx: &mut broadcast::Receiver<MeasurementEvent>,
    timeout: Duration,
) -> MeasurementEvent {
    let start = Instant::now();
    loop {
        match rx.try_recv() {
            Ok(ev) => return ev,
            Err(TryRecvError::Empty) => {
                if start.elapsed() >= timeout {
                    panic!("timed out waiting for measurement event");
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Closed) => panic!("measurement channel closed unexpectedly"),
        }
    }
}

/// Runs `samples` through the ring with a feeder thread, recording one session.
fn record_through_ring(samples: Vec<f32>) -> (vozmetria_core::Session, usize) {
    let handle = analyzer();
    handle.0.lock().start_session(0).expect("start session");

    let (mut producer, consumer) = create_sample_ring();
    let finished = Arc::new(AtomicBool::new(false));
    let running = Arc::new(AtomicBool::new(true));
    let diagnostics = Arc::new(PipelineDiagnostics::default());

    let feeder_finished = Arc::clone(&finished);
    let feeder = thread::spawn(move || {
        for block in samples.chunks(1_024) {
            let mut rest = block;
            while !rest.is_empty() {
                let n = producer.push_slice(rest);
                rest = &rest[n..];
                if n == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
        feeder_finished.store(true, Ordering::Release);
    });

    let source = RingFrameSource::new(
        consumer,
        assembler(),
        finished,
        Arc::clone(&running),
        Arc::clone(&diagnostics),
    );
    let ctx = pipeline::PipelineContext {
        analyzer: handle.clone(),
        source: Box::new(source),
        running,
        diagnostics: Arc::clone(&diagnostics),
    };
    let pipe = thread::spawn(move || pipeline::run(ctx));

    feeder.join().expect("feeder thread panicked");
    pipe.join().expect("pipeline thread panicked");

    let mut guard = handle.0.lock();
    let end = guard.last_timestamp();
    let session = guard.stop_session(end).expect("stop session");
    (session, diagnostics.snapshot().samples_in)
}

#[test]
fn male_voice_session_through_ring() {
    let samples = tone(118.0, 2.0);
    let total = samples.len();
    let (session, samples_in) = record_through_ring(samples);

    assert_eq!(samples_in, total);
    // 1 + floor((88200 - 4096) / 735)
    assert_eq!(session.measurements.len(), 115);
    assert_eq!(session.dominant_gender, Gender::Male);
    assert_abs_diff_eq!(session.average_pitch, 118.0, epsilon = 2.0);
    assert!(session.average_intensity > 0.0 && session.average_intensity <= 1.0);
    assert!(session.average_quality >= 0.0 && session.average_quality <= 1.0);
    assert_eq!(session.duration, session.end_time.unwrap() - session.start_time);
}

#[test]
fn female_voice_with_pause_keeps_log_and_verdict() {
    let mut samples = tone(225.0, 1.0);
    samples.extend(std::iter::repeat(0.0).take(SR as usize / 2));
    samples.extend(tone(215.0, 1.0));
    let (session, _) = record_through_ring(samples);

    assert_eq!(session.dominant_gender, Gender::Female);
    let silent = session
        .measurements
        .iter()
        .filter(|m| m.pitch_hz == 0.0)
        .count();
    assert!(silent > 0, "pause should leave unvoiced entries in the log");
    assert!(session.valid_measurements().count() < session.measurements.len());
    assert_abs_diff_eq!(session.average_pitch, 220.0, epsilon = 6.0);
}

#[test]
fn export_round_trip_after_pipeline_run() {
    let handle = analyzer();
    handle.0.lock().start_session(1_000).expect("start session");

    let mut samples = tone(130.0, 0.5);
    samples.extend(tone(240.0, 0.3));
    pipeline::run(pipeline::PipelineContext {
        analyzer: handle.clone(),
        source: Box::new(SliceFrameSource::new(samples, assembler())),
        running: Arc::new(AtomicBool::new(true)),
        diagnostics: Arc::new(PipelineDiagnostics::default()),
    });

    let session = handle.0.lock().stop_session(2_000).expect("stop session");
    let export = SessionExport::from_session(session).expect("finalized");
    let raw = export.to_json_pretty().expect("serialize");
    let back = SessionExport::from_json(&raw).expect("deserialize");

    assert!(back.verify_summary());
    assert_eq!(back.summary, export.summary);
    assert_eq!(back.session.measurements, export.session.measurements);
    assert_eq!(back.summary.duration_minutes, 0.02);
    assert!(back.summary.pitch_range.min.unwrap() < back.summary.pitch_range.max.unwrap());
}

#[test]
fn first_measurement_latency_under_500ms() {
    let handle = analyzer();
    let mut rx = handle.0.lock().subscribe_measurements();

    let (mut producer, consumer) = create_sample_ring();
    producer.push_slice(&tone(150.0, 0.2));

    let running = Arc::new(AtomicBool::new(true));
    let diagnostics = Arc::new(PipelineDiagnostics::default());
    let source = RingFrameSource::new(
        consumer,
        assembler(),
        Arc::new(AtomicBool::new(false)),
        Arc::clone(&running),
        Arc::clone(&diagnostics),
    );
    let ctx = pipeline::PipelineContext {
        analyzer: handle,
        source: Box::new(source),
        running: Arc::clone(&running),
        diagnostics,
    };

    let start = Instant::now();
    let pipe = thread::spawn(move || pipeline::run(ctx));

    let first = recv_with_timeout(&mut rx, Duration::from_secs(2));
    let elapsed = start.elapsed();

    running.store(false, Ordering::SeqCst);
    pipe.join().expect("pipeline thread panicked");

    assert_eq!(first.seq, 1);
    assert!(!first.recorded);
    assert!(
        elapsed < Duration::from_millis(500),
        "first measurement too slow: {:?} (target < 500ms)",
        elapsed
    );
}
