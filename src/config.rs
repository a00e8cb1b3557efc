//! Configuration management for maestro
//!
//! A single optional TOML file covers bootstrap concerns: logging and the
//! session tuning table. Every field has a built-in default, so running
//! without a config file is fully supported.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--config, --log-level)
//! 2. Environment variables (MAESTRO_CONFIG, MAESTRO_LOG)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Application configuration loaded from TOML file
///
/// These settings cannot change during runtime. The application must restart
/// to pick up changes to the TOML file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Session timing and input tuning (optional)
    #[serde(default)]
    pub tuning: Tuning,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Session timing and input tuning
///
/// Defaults: 500 ms status poll, 250 ms end-of-track tolerance, 1000 ms
/// duplicate-completion hold-off, 2000 ms gesture acceptance gate, 3500 ms
/// voice capture window. Integration tests shrink these windows to keep
/// runtimes short.
#[derive(Debug, Clone, Deserialize)]
pub struct Tuning {
    /// Interval between engine status polls while a track is loaded
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How close to the reported duration counts as end-of-track
    #[serde(default = "default_completion_tolerance_ms")]
    pub completion_tolerance_ms: u64,

    /// How long duplicate completion detections are suppressed after a fire
    #[serde(default = "default_completion_holdoff_ms")]
    pub completion_holdoff_ms: u64,

    /// Cadence at which the camera recognizer is sampled
    #[serde(default = "default_gesture_sample_interval_ms")]
    pub gesture_sample_interval_ms: u64,

    /// Minimum gap between two accepted camera detections
    #[serde(default = "default_gesture_min_gap_ms")]
    pub gesture_min_gap_ms: u64,

    /// Length of the voice recording window
    #[serde(default = "default_voice_capture_window_ms")]
    pub voice_capture_window_ms: u64,

    /// Overall deadline for one voice capture + transcription round
    #[serde(default = "default_voice_timeout_ms")]
    pub voice_timeout_ms: u64,

    /// Horizontal pan translation that counts as a track-change swipe
    #[serde(default = "default_swipe_threshold_px")]
    pub swipe_threshold_px: f32,

    /// Volume change per pixel of vertical pan translation
    #[serde(default = "default_pan_volume_scale")]
    pub pan_volume_scale: f32,

    /// Volume applied before the first volume command arrives
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,

    /// Capacity of the session event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            completion_tolerance_ms: default_completion_tolerance_ms(),
            completion_holdoff_ms: default_completion_holdoff_ms(),
            gesture_sample_interval_ms: default_gesture_sample_interval_ms(),
            gesture_min_gap_ms: default_gesture_min_gap_ms(),
            voice_capture_window_ms: default_voice_capture_window_ms(),
            voice_timeout_ms: default_voice_timeout_ms(),
            swipe_threshold_px: default_swipe_threshold_px(),
            pan_volume_scale: default_pan_volume_scale(),
            initial_volume: default_initial_volume(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_completion_tolerance_ms() -> u64 {
    250
}

fn default_completion_holdoff_ms() -> u64 {
    1000
}

fn default_gesture_sample_interval_ms() -> u64 {
    1500
}

fn default_gesture_min_gap_ms() -> u64 {
    2000
}

fn default_voice_capture_window_ms() -> u64 {
    3500
}

fn default_voice_timeout_ms() -> u64 {
    10000
}

fn default_swipe_threshold_px() -> f32 {
    50.0
}

fn default_pan_volume_scale() -> f32 {
    0.002
}

fn default_initial_volume() -> f32 {
    0.8
}

fn default_event_capacity() -> usize {
    100
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed. A missing file is
    /// an error here; callers that treat the file as optional should fall
    /// back to `Config::default()` before calling.
    pub async fn load(path: &Path) -> Result<Self> {
        let toml_str = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Config = toml::from_str(&toml_str)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }
}

impl Tuning {
    /// Status poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Duplicate-completion hold-off as Duration
    pub fn completion_holdoff(&self) -> Duration {
        Duration::from_millis(self.completion_holdoff_ms)
    }

    /// Camera sampling cadence as Duration
    pub fn gesture_sample_interval(&self) -> Duration {
        Duration::from_millis(self.gesture_sample_interval_ms)
    }

    /// Camera acceptance gate as Duration
    pub fn gesture_min_gap(&self) -> Duration {
        Duration::from_millis(self.gesture_min_gap_ms)
    }

    /// Voice recording window as Duration
    pub fn voice_capture_window(&self) -> Duration {
        Duration::from_millis(self.voice_capture_window_ms)
    }

    /// Voice round deadline as Duration
    pub fn voice_timeout(&self) -> Duration {
        Duration::from_millis(self.voice_timeout_ms)
    }
}
