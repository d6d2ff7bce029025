//! Audio input: device abstraction, CPAL capture, and WAV archival.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod source;
pub mod wav;

pub use source::{AudioSource, AudioSourceConfig, MockAudioSource};
