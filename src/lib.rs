//! meetscribe: live meeting transcription.
//!
//! Captures audio from a microphone, segments the stream into bounded
//! chunks, transcribes them on a concurrent worker pool, and accumulates
//! the results into a transcript in strict capture order. Readers can
//! snapshot the transcript at any moment while recording; once stopped,
//! the transcript is final and editable.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use meetscribe::config::Config;
//! use meetscribe::observer::StderrObserver;
//! use meetscribe::session::Session;
//! use meetscribe::stt::recognizer::MockRecognizer;
//! use meetscribe::audio::source::MockAudioSource;
//!
//! # async fn run() -> meetscribe::error::Result<()> {
//! let recognizer = Arc::new(MockRecognizer::new("base"));
//! let session = Session::new(Config::default(), recognizer, Arc::new(StderrObserver))?;
//!
//! let source = MockAudioSource::new().with_chunks(vec![vec![0i16; 16000]]);
//! session.start(source).await?;
//! let transcript = session.stop().await?;
//! println!("{}", transcript);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod session;
pub mod stt;
pub mod transcript;

pub use config::Config;
pub use error::{MeetscribeError, Result};
pub use session::{Session, SessionState};
pub use transcript::TranscriptBuffer;

/// Version string including the git hash when built from a checkout.
pub fn version_string() -> String {
    match option_env!("GIT_HASH") {
        Some(hash) => format!("{} ({})", env!("CARGO_PKG_VERSION"), hash),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_starts_with_package_version() {
        assert!(version_string().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
