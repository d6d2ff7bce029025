use crate::defaults;
use crate::error::{MeetscribeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub session: SessionConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub model: String,
    /// Language hint passed to the recognizer ("auto" = detect).
    pub language: String,
    /// Explicit model file path; overrides `model` name resolution.
    pub model_path: Option<PathBuf>,
}

/// Session pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Segment duration bound in milliseconds.
    pub segment_duration_ms: u32,
    /// Trailing partials shorter than this are discarded on stop.
    pub min_segment_ms: u32,
    /// Number of concurrent recognition workers.
    pub workers: usize,
    /// How long `stop` waits for in-flight segments before truncating.
    pub drain_timeout_ms: u64,
    /// Bound of the segment queue between segmenter and workers.
    pub segment_queue_depth: usize,
    /// Optional hard cap on recording duration in seconds.
    pub max_duration_secs: Option<u64>,
    /// Directory for WAV archival of the captured session audio.
    pub archive_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            model_path: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            segment_duration_ms: defaults::SEGMENT_DURATION_MS,
            min_segment_ms: defaults::MIN_SEGMENT_MS,
            workers: defaults::WORKER_POOL_SIZE,
            drain_timeout_ms: defaults::DRAIN_TIMEOUT_MS,
            segment_queue_depth: defaults::SEGMENT_QUEUE_DEPTH,
            max_duration_secs: None,
            archive_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MeetscribeError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                MeetscribeError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file is missing.
    ///
    /// Invalid TOML is still an error; only absence falls back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(MeetscribeError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - MEETSCRIBE_MODEL → stt.model
    /// - MEETSCRIBE_LANGUAGE → stt.language
    /// - MEETSCRIBE_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("MEETSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("MEETSCRIBE_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Ok(device) = std::env::var("MEETSCRIBE_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        self
    }

    /// Validate the configuration once, at session start.
    ///
    /// Every pipeline knob is checked here so nothing reads environment or
    /// file state implicitly later.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(MeetscribeError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.session.workers == 0 {
            return Err(MeetscribeError::ConfigInvalidValue {
                key: "session.workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.session.segment_duration_ms == 0 {
            return Err(MeetscribeError::ConfigInvalidValue {
                key: "session.segment_duration_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.session.min_segment_ms > self.session.segment_duration_ms {
            return Err(MeetscribeError::ConfigInvalidValue {
                key: "session.min_segment_ms".to_string(),
                message: "must not exceed segment_duration_ms".to_string(),
            });
        }
        if self.session.segment_queue_depth == 0 {
            return Err(MeetscribeError::ConfigInvalidValue {
                key: "session.segment_queue_depth".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.session.drain_timeout_ms == 0 {
            return Err(MeetscribeError::ConfigInvalidValue {
                key: "session.drain_timeout_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/meetscribe/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("meetscribe").join("config.toml"))
    }
}
