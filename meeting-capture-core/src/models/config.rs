use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::audio_models::Volumes;
use super::error::CaptureError;

/// How elapsed time advances while recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickerMode {
    /// A background thread calls `tick()` every `tick_interval_ms`.
    Background,
    /// The owner calls `RecordingSession::tick()` itself.
    Manual,
}

/// Configuration for a recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfiguration {
    /// Mixing graph sample rate in Hz (default: 48000).
    pub sample_rate: f64,

    /// Mixing graph output channels (default: 2).
    pub channels: u16,

    /// Audio duration of one recorder slice, in milliseconds (default: 1000).
    pub timeslice_ms: u64,

    /// Elapsed-time granularity, in milliseconds (default: 1000).
    pub tick_interval_ms: u64,

    pub ticker: TickerMode,

    /// Engine families allowed to share system audio (default: `["chromium"]`).
    pub allowed_engines: Vec<String>,

    /// Remembered microphone, or None for the platform default.
    pub mic_device_id: Option<String>,

    pub mic_auto_gain_control: bool,

    /// Initial system volume in percent (default: 100).
    pub initial_system_volume: u8,

    /// Initial microphone volume in percent (default: 100).
    pub initial_mic_volume: u8,

    /// Seconds of audio each graph input may buffer before dropping the oldest frames.
    pub buffer_secs: f64,

    /// MIME type for a blob whose first slice reports none.
    pub fallback_mime_type: String,
}

impl SessionConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate <= 0.0 || !self.sample_rate.is_finite() {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.timeslice_ms == 0 {
            return Err("timeslice must be at least 1 ms".into());
        }
        if self.tick_interval_ms == 0 {
            return Err("tick interval must be at least 1 ms".into());
        }
        if self.allowed_engines.is_empty() {
            return Err("at least one engine must be allowed".into());
        }
        if self.initial_system_volume > 100 || self.initial_mic_volume > 100 {
            return Err("volumes are percentages in 0..=100".into());
        }
        if self.buffer_secs <= 0.0 {
            return Err("buffer length must be positive".into());
        }
        if self.fallback_mime_type.trim().is_empty() {
            return Err("fallback MIME type must not be empty".into());
        }
        Ok(())
    }

    pub fn initial_volumes(&self) -> Volumes {
        Volumes::new(self.initial_system_volume, self.initial_mic_volume)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("invalid configuration: {}", e)))?;
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::ConfigurationFailed(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            channels: 2,
            timeslice_ms: 1000,
            tick_interval_ms: 1000,
            ticker: TickerMode::Background,
            allowed_engines: vec!["chromium".into()],
            mic_device_id: None,
            mic_auto_gain_control: true,
            initial_system_volume: 100,
            initial_mic_volume: 100,
            buffer_secs: 5.0,
            fallback_mime_type: "audio/webm".into(),
        }
    }
}
