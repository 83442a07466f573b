//! Vozmetria command-line host.
//!
//! ```text
//! vozmetria analyze <file.wav> [--settings <path>] [--out <dir>] [--realtime] [--save-settings]
//! vozmetria summary <export.json>
//! vozmetria list [--settings <path>] [--out <dir>]
//! ```
//!
//! `analyze` plays the frame-source role for the core: it decodes the file,
//! feeds the sample ring from a feeder thread, runs the pipeline on a
//! blocking task, records one session spanning the whole file and writes
//! the export. `--save-settings` writes the effective settings (file plus
//! command-line overrides) back to the settings path. `list` shows the
//! exports stored in the export directory.

mod settings;
mod source;
mod storage;

use std::path::{Path, PathBuf};
use std::sync::{atomic::AtomicBool, Arc};

use anyhow::{anyhow, bail, Context, Result};
use settings::{default_settings_path, load_settings, save_settings, AppSettings};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use vozmetria_core::{
    analysis::SpectrumAnalyzer,
    buffering::create_sample_ring,
    engine::pipeline::{
        self, FrameAssembler, FrameGeometry, PipelineContext, PipelineDiagnostics,
        RingFrameSource,
    },
    session::pitch_stats,
    AnalyzerHandle, QualityLevel, SessionExport, VoiceAnalyzer,
};

const USAGE: &str = "usage:
  vozmetria analyze <file.wav> [--settings <path>] [--out <dir>] [--realtime] [--save-settings]
  vozmetria summary <export.json>
  vozmetria list [--settings <path>] [--out <dir>]";

#[derive(Debug, PartialEq)]
enum Command {
    Analyze {
        input: PathBuf,
        settings: Option<PathBuf>,
        out: Option<PathBuf>,
        realtime: bool,
        save_settings: bool,
    },
    Summary {
        path: PathBuf,
    },
    List {
        settings: Option<PathBuf>,
        out: Option<PathBuf>,
    },
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Command> {
    let mut it = args.into_iter();
    let command = it.next().ok_or_else(|| anyhow!("missing command\n{USAGE}"))?;

    match command.as_str() {
        "analyze" => {
            let mut input = None;
            let mut settings = None;
            let mut out = None;
            let mut realtime = false;
            let mut save_settings = false;
            while let Some(arg) = it.next() {
                match arg.as_str() {
                    "--settings" => {
                        let v = it.next().ok_or_else(|| anyhow!("--settings needs a path"))?;
                        settings = Some(PathBuf::from(v));
                    }
                    "--out" => {
                        let v = it.next().ok_or_else(|| anyhow!("--out needs a directory"))?;
                        out = Some(PathBuf::from(v));
                    }
                    "--realtime" => realtime = true,
                    "--save-settings" => save_settings = true,
                    flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
                    _ if input.is_none() => input = Some(PathBuf::from(arg)),
                    _ => bail!("unexpected argument {arg}\n{USAGE}"),
                }
            }
            Ok(Command::Analyze {
                input: input.ok_or_else(|| anyhow!("analyze needs a WAV file\n{USAGE}"))?,
                settings,
                out,
                realtime,
                save_settings,
            })
        }
        "summary" => {
            let path = it
                .next()
                .ok_or_else(|| anyhow!("summary needs an export file\n{USAGE}"))?;
            if let Some(extra) = it.next() {
                bail!("unexpected argument {extra}\n{USAGE}");
            }
            Ok(Command::Summary {
                path: PathBuf::from(path),
            })
        }
        "list" => {
            let mut settings = None;
            let mut out = None;
            while let Some(arg) = it.next() {
                match arg.as_str() {
                    "--settings" => {
                        let v = it.next().ok_or_else(|| anyhow!("--settings needs a path"))?;
                        settings = Some(PathBuf::from(v));
                    }
                    "--out" => {
                        let v = it.next().ok_or_else(|| anyhow!("--out needs a directory"))?;
                        out = Some(PathBuf::from(v));
                    }
                    _ => bail!("unexpected argument {arg}\n{USAGE}"),
                }
            }
            Ok(Command::List { settings, out })
        }
        "-h" | "--help" | "help" => bail!("{USAGE}"),
        other => bail!("unknown command {other}\n{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vozmetria=info")),
        )
        .init();

    match parse_args(std::env::args().skip(1))? {
        Command::Analyze {
            input,
            settings,
            out,
            realtime,
            save_settings: save,
        } => {
            let settings_path = settings.unwrap_or_else(default_settings_path);
            let mut app_settings = load_settings(&settings_path);
            app_settings.realtime |= realtime;
            if let Some(dir) = out {
                app_settings.export_dir = Some(dir);
            }
            if save {
                save_settings(&settings_path, &app_settings)
                    .with_context(|| format!("saving {}", settings_path.display()))?;
                info!(path = %settings_path.display(), "settings saved");
            }
            analyze(input, app_settings).await
        }
        Command::Summary { path } => summary(path),
        Command::List { settings, out } => {
            let settings_path = settings.unwrap_or_else(default_settings_path);
            let dir = out.unwrap_or_else(|| load_settings(&settings_path).export_dir());
            list(&dir)
        }
    }
}

async fn analyze(input: PathBuf, settings: AppSettings) -> Result<()> {
    let audio = source::decode_wav(&input)?;
    info!(
        file = %input.display(),
        seconds = audio.duration_secs(),
        realtime = settings.realtime,
        "vozmetria analyze starting"
    );

    let analyzer = VoiceAnalyzer::new(settings.analyzer_config())
        .context("invalid analyzer settings")?;
    let handle = AnalyzerHandle::new(analyzer);

    // Forward live measurements to the log while the pipeline runs.
    let mut measurements = handle.0.lock().subscribe_measurements();
    let forwarder = tokio::spawn(async move {
        loop {
            match measurements.recv().await {
                Ok(ev) => debug!(
                    seq = ev.seq,
                    t_ms = ev.timestamp,
                    pitch = ev.pitch,
                    intensity = ev.intensity,
                    quality = ev.quality,
                    level = ev.quality_level.label(),
                    gender = %ev.gender,
                    "measurement"
                ),
                Err(RecvError::Lagged(n)) => warn!("measurement log lagged by {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    {
        let mut guard = handle.0.lock();
        guard.reset();
        guard.start_session(0)?;
    }

    let geometry =
        FrameGeometry::from_tick_rate(settings.frame_size, audio.sample_rate, settings.tick_rate_hz);
    let spectrum = SpectrumAnalyzer::new(
        settings.frame_size,
        settings.spectrum_smoothing,
        settings.min_db,
        settings.max_db,
    );
    let assembler = FrameAssembler::new(geometry, audio.sample_rate, spectrum)?;

    let (producer, consumer) = create_sample_ring();
    let finished = Arc::new(AtomicBool::new(false));
    let running = Arc::new(AtomicBool::new(true));
    let diagnostics = Arc::new(PipelineDiagnostics::default());

    let feeder = source::spawn_feeder(
        audio,
        producer,
        settings.realtime,
        Arc::clone(&finished),
        Arc::clone(&running),
    );

    let ctx = PipelineContext {
        analyzer: handle.clone(),
        source: Box::new(RingFrameSource::new(
            consumer,
            assembler,
            finished,
            Arc::clone(&running),
            Arc::clone(&diagnostics),
        )),
        running,
        diagnostics: Arc::clone(&diagnostics),
    };
    tokio::task::spawn_blocking(move || pipeline::run(ctx))
        .await
        .context("pipeline task panicked")?;
    feeder
        .join()
        .map_err(|_| anyhow!("feeder thread panicked"))?;

    let session = {
        let mut guard = handle.0.lock();
        let end = guard.last_timestamp();
        guard.stop_session(end)?
    };
    // Dropping the last handle closes the channel and ends the forwarder.
    drop(handle);
    let _ = forwarder.await;

    let snapshot = diagnostics.snapshot();
    info!(
        samples = snapshot.samples_in,
        ticks = snapshot.frames_analyzed,
        voiced = snapshot.voiced_frames,
        "analysis complete"
    );

    let export = SessionExport::from_session(session)?;
    let path = storage::write_export(&settings.export_dir(), &export)?;
    print_summary(&export);
    println!("export:      {}", path.display());
    Ok(())
}

fn summary(path: PathBuf) -> Result<()> {
    let export = storage::read_export(&path)?;
    if !export.verify_summary() {
        warn!(path = %path.display(), "stored summary does not match the measurement log");
    }
    print_summary(&export);
    Ok(())
}

fn list(dir: &Path) -> Result<()> {
    let paths = storage::list_exports(dir)?;
    if paths.is_empty() {
        println!("no exports in {}", dir.display());
        return Ok(());
    }
    for path in paths {
        match storage::read_export(&path) {
            Ok(export) => println!(
                "{}  {:>6.2} min  {:>5} samples  {}",
                export.session.id,
                export.summary.duration_minutes,
                export.summary.total_samples,
                export.session.dominant_gender.label()
            ),
            Err(e) => warn!(path = %path.display(), "skipping unreadable export: {e:#}"),
        }
    }
    Ok(())
}

fn print_summary(export: &SessionExport) {
    let session = &export.session;
    let summary = &export.summary;
    let stats = pitch_stats(session.measurements.iter().map(|m| m.pitch_hz));
    let range = |v: Option<f32>| v.map_or_else(|| "-".to_string(), |p| format!("{p:.1} Hz"));

    println!("session:     {}", session.id);
    println!("exported:    {}", export.export_date);
    println!("duration:    {:.2} min", summary.duration_minutes);
    println!(
        "samples:     {} total, {} valid",
        summary.total_samples, summary.valid_samples
    );
    println!(
        "pitch:       avg {:.1} Hz, range {} .. {}, std dev {:.1} Hz",
        session.average_pitch,
        range(summary.pitch_range.min),
        range(summary.pitch_range.max),
        stats.variance.sqrt()
    );
    println!("intensity:   {:.3}", session.average_intensity);
    println!(
        "quality:     {:.3} ({})",
        session.average_quality,
        QualityLevel::from_quality(session.average_quality).label()
    );
    println!("register:    {}", session.dominant_gender.label());
}
