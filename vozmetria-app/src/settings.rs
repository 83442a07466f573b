//! Persistent host settings (JSON file in the app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vozmetria_core::{AnalyzerConfig, GenderThresholds};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// Analysis window in samples (the analyser node's fftSize).
    pub frame_size: usize,
    /// Ticks per second of audio.
    pub tick_rate_hz: f32,
    pub spectrum_smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
    /// Where `analyze` writes session exports. `None` uses the data dir.
    pub export_dir: Option<PathBuf>,
    /// Pace the WAV source to real time instead of feeding it at full speed.
    pub realtime: bool,
    pub silence_rms: f32,
    pub dominant_share: f64,
    pub quality_scale: f32,
    pub male_max_hz: f32,
    pub female_min_hz: f32,
    pub overlap_hz: f32,
    pub record_unvoiced: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        let analyzer = AnalyzerConfig::default();
        Self {
            frame_size: 4096,
            tick_rate_hz: 60.0,
            spectrum_smoothing: 0.3,
            min_db: -90.0,
            max_db: -10.0,
            export_dir: None,
            realtime: false,
            silence_rms: analyzer.silence_rms,
            dominant_share: analyzer.dominant_share,
            quality_scale: analyzer.quality_scale,
            male_max_hz: analyzer.thresholds.male_max_hz,
            female_min_hz: analyzer.thresholds.female_min_hz,
            overlap_hz: analyzer.thresholds.overlap_hz,
            record_unvoiced: analyzer.record_unvoiced,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        let defaults = Self::default();
        // FFT sizes stay powers of two, as an analyser node requires.
        self.frame_size = self.frame_size.clamp(256, 32_768).next_power_of_two();
        if !self.tick_rate_hz.is_finite() {
            self.tick_rate_hz = defaults.tick_rate_hz;
        }
        self.tick_rate_hz = self.tick_rate_hz.clamp(1.0, 240.0);
        self.spectrum_smoothing = finite_or(self.spectrum_smoothing, defaults.spectrum_smoothing)
            .clamp(0.0, 0.99);
        self.min_db = finite_or(self.min_db, defaults.min_db).clamp(-160.0, 0.0);
        self.max_db = finite_or(self.max_db, defaults.max_db).clamp(-160.0, 0.0);
        if self.min_db >= self.max_db {
            self.min_db = defaults.min_db;
            self.max_db = defaults.max_db;
        }
        self.export_dir = self
            .export_dir
            .take()
            .filter(|d| !d.as_os_str().is_empty());
        self.silence_rms = finite_or(self.silence_rms, defaults.silence_rms).clamp(0.0, 0.5);
        self.dominant_share = if self.dominant_share.is_finite() {
            self.dominant_share.clamp(0.5, 1.0)
        } else {
            defaults.dominant_share
        };
        self.quality_scale = finite_or(self.quality_scale, defaults.quality_scale).clamp(0.1, 1_000.0);
        self.male_max_hz = finite_or(self.male_max_hz, defaults.male_max_hz).clamp(60.0, 400.0);
        self.female_min_hz =
            finite_or(self.female_min_hz, defaults.female_min_hz).clamp(60.0, 400.0);
        self.overlap_hz = finite_or(self.overlap_hz, defaults.overlap_hz).clamp(0.0, 100.0);
        if self.male_max_hz - self.overlap_hz > self.female_min_hz + self.overlap_hz {
            self.male_max_hz = defaults.male_max_hz;
            self.female_min_hz = defaults.female_min_hz;
            self.overlap_hz = defaults.overlap_hz;
        }
    }

    /// Analyzer configuration with this file's overrides applied.
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            silence_rms: self.silence_rms,
            dominant_share: self.dominant_share,
            quality_scale: self.quality_scale,
            thresholds: GenderThresholds {
                male_max_hz: self.male_max_hz,
                female_min_hz: self.female_min_hz,
                overlap_hz: self.overlap_hz,
            },
            record_unvoiced: self.record_unvoiced,
            ..AnalyzerConfig::default()
        }
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("sessions"))
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Per-user data directory for settings and exports.
pub fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Vozmetria")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("vozmetria")
    }
}

pub fn default_settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

/// Missing or unreadable files yield the defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("vozmetria-settings-{}-{name}", std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn defaults_survive_normalize() {
        let mut settings = AppSettings::default();
        settings.normalize();
        assert_eq!(settings, AppSettings::default());
        settings.analyzer_config().validate().unwrap();
    }

    #[test]
    fn normalize_clamps_out_of_range_values() {
        let mut settings = AppSettings {
            frame_size: 3000,
            tick_rate_hz: f32::NAN,
            spectrum_smoothing: 4.0,
            min_db: -5.0,
            max_db: -50.0,
            dominant_share: 0.2,
            quality_scale: -3.0,
            export_dir: Some(PathBuf::new()),
            ..AppSettings::default()
        };
        settings.normalize();
        assert_eq!(settings.frame_size, 4096);
        assert_eq!(settings.tick_rate_hz, 60.0);
        assert_eq!(settings.spectrum_smoothing, 0.99);
        assert_eq!((settings.min_db, settings.max_db), (-90.0, -10.0));
        assert_eq!(settings.dominant_share, 0.5);
        assert_eq!(settings.quality_scale, 0.1);
        assert!(settings.export_dir.is_none());
        settings.analyzer_config().validate().unwrap();
    }

    #[test]
    fn inconsistent_thresholds_fall_back_together() {
        let mut settings = AppSettings {
            male_max_hz: 300.0,
            female_min_hz: 100.0,
            overlap_hz: 0.0,
            ..AppSettings::default()
        };
        settings.normalize();
        assert_eq!(settings.male_max_hz, 165.0);
        assert_eq!(settings.female_min_hz, 150.0);
        assert_eq!(settings.overlap_hz, 15.0);
    }

    #[test]
    fn overrides_reach_analyzer_config() {
        let settings = AppSettings {
            dominant_share: 0.75,
            male_max_hz: 170.0,
            record_unvoiced: false,
            ..AppSettings::default()
        };
        let config = settings.analyzer_config();
        assert_eq!(config.dominant_share, 0.75);
        assert_eq!(config.thresholds.male_max_hz, 170.0);
        assert!(!config.record_unvoiced);
        assert_eq!(config.vote_window, 10);
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = temp_path("roundtrip");
        let settings = AppSettings {
            frame_size: 2048,
            realtime: true,
            export_dir: Some(PathBuf::from("/tmp/vozmetria-exports")),
            ..AppSettings::default()
        };
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path), settings);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_or_corrupt_file_yields_defaults() {
        let path = temp_path("corrupt");
        assert_eq!(load_settings(&path), AppSettings::default());

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings(&path), AppSettings::default());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{"tickRateHz": 30}"#).unwrap();
        assert_eq!(settings.tick_rate_hz, 30.0);
        assert_eq!(settings.frame_size, 4096);
    }
}
