//! Speech-to-text: the pluggable recognition seam and its backends.

pub mod recognizer;
pub mod whisper;

pub use recognizer::{MockRecognizer, Recognizer, RecognizerConfig};
pub use whisper::WhisperRecognizer;
