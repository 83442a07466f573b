//! WAV-backed sample source: decode to mono f32, then feed the sample ring
//! from a dedicated thread.

use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader};
use tracing::{debug, info};
use vozmetria_core::buffering::{Producer, SampleProducer};

/// Samples pushed per feeder iteration (~20 ms at 48 kHz).
const FEED_BLOCK: usize = 960;

#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode a PCM or float WAV file, averaging channels down to mono.
pub fn decode_wav(path: &Path) -> Result<DecodedAudio> {
    let mut reader =
        WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        bail!("{} has no channels or a zero sample rate", path.display());
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("reading float samples from {}", path.display()))?,
        SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("reading PCM samples from {}", path.display()))?
        }
    };

    let channels = spec.channels as usize;
    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect::<Vec<_>>();

    info!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels,
        bits = spec.bits_per_sample,
        frames = samples.len(),
        "decoded wav"
    );
    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Push `audio` into the ring on a new thread, then set `finished`.
///
/// With `realtime` the feeder sleeps so samples arrive at the file's rate.
/// Stops early when `running` is cleared.
pub fn spawn_feeder(
    audio: DecodedAudio,
    mut producer: SampleProducer,
    realtime: bool,
    finished: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let started = Instant::now();
        let mut fed = 0usize;

        'blocks: for block in audio.samples.chunks(FEED_BLOCK) {
            let mut rest = block;
            while !rest.is_empty() {
                if !running.load(Ordering::Relaxed) {
                    break 'blocks;
                }
                let n = producer.push_slice(rest);
                rest = &rest[n..];
                fed += n;
                if n == 0 {
                    // Ring full: let the pipeline catch up.
                    thread::sleep(Duration::from_millis(2));
                }
            }

            if realtime {
                let due = Duration::from_secs_f64(fed as f64 / audio.sample_rate as f64);
                if let Some(wait) = due.checked_sub(started.elapsed()) {
                    thread::sleep(wait);
                }
            }
        }

        debug!(samples = fed, "feeder done");
        finished.store(true, Ordering::Release);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hound::{WavSpec, WavWriter};
    use std::path::PathBuf;
    use vozmetria_core::buffering::{create_sample_ring, Consumer, Observer};

    fn temp_wav(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("vozmetria-source-{}-{name}.wav", std::process::id()))
    }

    #[test]
    fn decodes_stereo_i16_to_mono() {
        let path = temp_wav("stereo16");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16_384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let audio = decode_wav(&path).unwrap();
        assert_eq!(audio.sample_rate, 22_050);
        assert_eq!(audio.samples.len(), 100);
        assert_abs_diff_eq!(audio.samples[0], 0.25, epsilon = 1e-6);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn decodes_float_wav() {
        let path = temp_wav("float");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0.5f32, -0.5, 0.25] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let audio = decode_wav(&path).unwrap();
        assert_eq!(audio.samples, vec![0.5, -0.5, 0.25]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(decode_wav(Path::new("/nonexistent/vozmetria.wav")).is_err());
    }

    #[test]
    fn feeder_pushes_everything_then_finishes() {
        let (producer, mut consumer) = create_sample_ring();
        let finished = Arc::new(AtomicBool::new(false));
        let audio = DecodedAudio {
            samples: (0..5_000).map(|i| i as f32 / 5_000.0).collect(),
            sample_rate: 44_100,
        };

        spawn_feeder(
            audio,
            producer,
            false,
            Arc::clone(&finished),
            Arc::new(AtomicBool::new(true)),
        )
        .join()
        .unwrap();

        assert!(finished.load(Ordering::Acquire));
        assert_eq!(consumer.occupied_len(), 5_000);
        let mut out = vec![0.0; 5_000];
        assert_eq!(consumer.pop_slice(&mut out), 5_000);
        assert_abs_diff_eq!(out[4_999], 4_999.0 / 5_000.0);
    }
}
