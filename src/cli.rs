//! Command-line interface definitions.
//!
//! Argument parsing and config merging only; command execution lives in
//! the binary.

use crate::config::Config;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "meetscribe",
    version = crate::version_string(),
    about = "Live meeting transcription: streaming capture to an ordered transcript"
)]
pub struct Cli {
    /// Path to the configuration file (default: ~/.config/meetscribe/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record and transcribe until interrupted (the default)
    Record(RecordArgs),
    /// List available audio input devices
    Devices,
}

#[derive(Args, Debug, Default)]
pub struct RecordArgs {
    /// Audio input device name (see `meetscribe devices`)
    #[arg(long)]
    pub device: Option<String>,

    /// Whisper model name (tiny, base, small, medium, large)
    #[arg(long)]
    pub model: Option<String>,

    /// Explicit path to a ggml model file, overriding --model resolution
    #[arg(long)]
    pub model_path: Option<PathBuf>,

    /// Language hint, e.g. "en" ("auto" detects)
    #[arg(long)]
    pub language: Option<String>,

    /// Stop automatically after this long, e.g. "90s" or "30m"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub max_duration: Option<Duration>,

    /// Archive the captured session audio as a WAV file in this directory
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,
}

impl RecordArgs {
    /// Fold the command-line overrides into a loaded configuration.
    /// Precedence: CLI flags over environment over file over defaults.
    pub fn apply(self, config: &mut Config) {
        if self.device.is_some() {
            config.audio.device = self.device;
        }
        if let Some(model) = self.model {
            config.stt.model = model;
        }
        if self.model_path.is_some() {
            config.stt.model_path = self.model_path;
        }
        if let Some(language) = self.language {
            config.stt.language = language;
        }
        if let Some(max) = self.max_duration {
            config.session.max_duration_secs = Some(max.as_secs().max(1));
        }
        if self.archive_dir.is_some() {
            config.session.archive_dir = self.archive_dir;
        }
    }
}

/// Resolve the model file path from the configuration.
///
/// An explicit `stt.model_path` wins; otherwise the model name maps to
/// `<data dir>/meetscribe/models/ggml-<name>.bin`.
pub fn resolve_model_path(config: &Config) -> PathBuf {
    if let Some(path) = &config.stt.model_path {
        return path.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("meetscribe")
        .join("models")
        .join(format!("ggml-{}.bin", config.stt.model))
}
