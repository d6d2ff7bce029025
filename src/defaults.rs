//! Default configuration constants for meetscribe.
//!
//! Shared across configuration types to keep the pipeline knobs consistent
//! between the config file, the CLI, and the test fixtures.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default segment duration bound in milliseconds.
///
/// Segments in the 1–2 second range keep recognition latency low while
/// giving the model enough context to produce usable text.
pub const SEGMENT_DURATION_MS: u32 = 1500;

/// Minimum useful segment duration in milliseconds.
///
/// A trailing partial segment shorter than this is dropped on stop;
/// recognition of such a sliver produces noise, not words.
pub const MIN_SEGMENT_MS: u32 = 200;

/// Default recognition worker pool size.
///
/// Two workers absorb recognition latency that exceeds the segment duration
/// on typical hardware. Increase for slower models.
pub const WORKER_POOL_SIZE: usize = 2;

/// Default drain timeout in milliseconds.
///
/// Bounds how long `stop` waits for in-flight segments before declaring the
/// session Stopped with a truncation notice.
pub const DRAIN_TIMEOUT_MS: u64 = 10_000;

/// Bound of the segment queue between the segmenter and the worker pool.
///
/// When full, the segmenter blocks rather than dropping audio, applying
/// backpressure all the way back to capture.
pub const SEGMENT_QUEUE_DEPTH: usize = 8;

/// Bound of the frame channel between capture and the segmenter.
pub const FRAME_CHANNEL_DEPTH: usize = 1000;

/// Polling interval for the capture thread when no samples are available (ms).
pub const POLL_INTERVAL_MS: u64 = 10;

/// Default Whisper model name.
pub const DEFAULT_MODEL: &str = "base";

/// Default language hint for recognition.
///
/// "auto" lets the recognizer detect the spoken language.
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Marker inserted into the transcript where a segment failed recognition.
pub const GAP_MARKER: &str = "[gap]";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_bounds_are_consistent() {
        assert!(MIN_SEGMENT_MS < SEGMENT_DURATION_MS);
        assert!(WORKER_POOL_SIZE >= 1);
        assert!(SEGMENT_QUEUE_DEPTH >= 1);
    }

    #[test]
    fn sample_rate_is_whisper_native() {
        assert_eq!(SAMPLE_RATE, 16000);
    }
}
