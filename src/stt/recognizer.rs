use crate::defaults;
use crate::error::{MeetscribeError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Trait for speech-to-text recognition.
///
/// This trait allows swapping implementations (real Whisper vs mock).
/// Recognition is synchronous and potentially slow relative to segment
/// duration; the worker pool runs it on blocking threads.
pub trait Recognizer: Send + Sync {
    /// Recognize audio samples as text.
    ///
    /// # Arguments
    /// * `audio` - 16-bit PCM mono samples at the session sample rate
    ///
    /// # Returns
    /// Recognized text (possibly empty on silence) or an error
    fn recognize(&self, audio: &[i16]) -> Result<String>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the recognizer is ready to accept audio
    fn is_ready(&self) -> bool;
}

/// Implement Recognizer for Arc<T> to allow sharing across workers.
impl<T: Recognizer> Recognizer for Arc<T> {
    fn recognize(&self, audio: &[i16]) -> Result<String> {
        (**self).recognize(audio)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Configuration for recognizer initialization
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    pub model_path: PathBuf,
    /// Language hint ("auto" = detect).
    pub language: String,
    /// Number of inference threads (None = auto-detect).
    pub threads: Option<usize>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(""),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

/// Mock recognizer for testing
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    model_name: String,
    response: String,
    latency: Duration,
    should_fail: bool,
}

impl MockRecognizer {
    /// Create a new mock recognizer with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock recognition".to_string(),
            latency: Duration::ZERO,
            should_fail: false,
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to sleep before answering, simulating inference
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Configure the mock to fail on recognize
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Recognizer for MockRecognizer {
    fn recognize(&self, _audio: &[i16]) -> Result<String> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if self.should_fail {
            Err(MeetscribeError::Recognition {
                message: "mock recognition failure".to_string(),
            })
        } else {
            Ok(self.response.clone())
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}
