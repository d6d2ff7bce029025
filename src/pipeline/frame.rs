//! Data types that flow between pipeline stations.

use std::time::{Duration, Instant};

/// Raw PCM block delivered by the capture thread.
///
/// Ephemeral: consumed by the segmenter and discarded.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Sequence number for ordering frames.
    pub sequence: u64,
    /// Timestamp when the audio was captured.
    pub captured_at: Instant,
    /// Sample rate of the samples.
    pub sample_rate: u32,
    /// Audio samples as 16-bit PCM mono.
    pub samples: Vec<i16>,
}

impl AudioFrame {
    /// Creates a new audio frame stamped with the current time.
    pub fn new(sequence: u64, sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sequence,
            captured_at: Instant::now(),
            sample_rate,
            samples,
        }
    }

    /// Returns the duration of this frame in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        (self.samples.len() as u64 * 1000 / self.sample_rate as u64) as u32
    }
}

/// A bounded-duration slice of captured audio, ready for recognition.
///
/// Sequence numbers start at 0 and are strictly increasing and gap-free
/// for the session; segments are contiguous and non-overlapping in time.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Segment sequence number, assigned at segmentation time.
    pub sequence: u64,
    /// Sequence of the first audio frame in this segment.
    pub first_frame: u64,
    /// Sequence of the last audio frame in this segment.
    pub last_frame: u64,
    /// Capture timestamp of the first contributing frame.
    pub captured_at: Instant,
    /// Concatenated samples.
    pub samples: Vec<i16>,
}

impl AudioSegment {
    /// Returns the duration of this segment in milliseconds.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        (self.samples.len() as u64 * 1000 / sample_rate as u64) as u32
    }
}

/// Result of recognizing one segment, possibly out of order.
#[derive(Debug, Clone)]
pub struct RecognitionOutcome {
    /// Sequence number of the recognized segment.
    pub sequence: u64,
    /// Recognized text; empty on silence or failure.
    pub text: String,
    /// Wall-clock recognition latency.
    pub latency: Duration,
    /// False if recognition failed; the transcript carries a gap block.
    pub ok: bool,
}

impl RecognitionOutcome {
    /// Successful recognition (text may still be empty on silence).
    pub fn success(sequence: u64, text: String, latency: Duration) -> Self {
        Self {
            sequence,
            text,
            latency,
            ok: true,
        }
    }

    /// Failed recognition; contributes a gap block at this position.
    pub fn failure(sequence: u64, latency: Duration) -> Self {
        Self {
            sequence,
            text: String::new(),
            latency,
            ok: false,
        }
    }
}
