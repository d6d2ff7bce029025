//! meetscribe binary: record from a microphone and print the transcript
//! as it accumulates.

use anyhow::Result;
use clap::Parser;
use meetscribe::audio::capture::{self, CpalAudioSource};
use meetscribe::audio::source::AudioSourceConfig;
use meetscribe::cli::{Cli, Command, RecordArgs, resolve_model_path};
use meetscribe::config::Config;
use meetscribe::observer::StderrObserver;
use meetscribe::session::Session;
use meetscribe::stt::recognizer::RecognizerConfig;
use meetscribe::stt::whisper::WhisperRecognizer;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Devices) => devices(),
        Some(Command::Record(args)) => record(cli.config, args).await,
        None => record(cli.config, RecordArgs::default()).await,
    }
}

fn devices() -> Result<()> {
    let names = capture::list_devices()?;
    if names.is_empty() {
        println!("no usable input devices found");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = match path.or_else(Config::default_path) {
        Some(path) => Config::load_or_default(&path)?,
        None => Config::default(),
    };
    Ok(config.with_env_overrides())
}

async fn record(config_path: Option<PathBuf>, args: RecordArgs) -> Result<()> {
    let mut config = load_config(config_path)?;
    args.apply(&mut config);

    let model_path = resolve_model_path(&config);
    eprintln!(
        "meetscribe {}: loading model {}",
        meetscribe::version_string(),
        model_path.display()
    );
    let recognizer = Arc::new(WhisperRecognizer::new(RecognizerConfig {
        model_path,
        language: config.stt.language.clone(),
        threads: None,
    })?);

    let source = CpalAudioSource::new(
        config.audio.device.as_deref(),
        AudioSourceConfig {
            sample_rate: config.audio.sample_rate,
        },
    )?;

    let max_duration = config.session.max_duration();
    let session = Session::new(config, recognizer, Arc::new(StderrObserver))?;
    session.start(source).await?;
    eprintln!("meetscribe: recording; press Ctrl-C to stop");

    let mut revisions = session.subscribe();
    let mut printed = 0usize;
    let deadline = async {
        match max_duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                printed = print_new_text(&session.transcript(), printed);
            }
        }
    }

    let transcript = session.stop().await?;
    print_new_text(&transcript, printed);
    println!();
    Ok(())
}

/// Print the portion of the transcript beyond what is already on screen.
/// Returns the new printed length.
fn print_new_text(text: &str, printed: usize) -> usize {
    if text.len() > printed && text.is_char_boundary(printed) {
        print!("{}", &text[printed..]);
        let _ = std::io::stdout().flush();
        text.len()
    } else {
        printed.min(text.len())
    }
}
