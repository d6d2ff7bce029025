//! Streaming transcription pipeline.
//!
//! Stations connected by bounded channels:
//! ```text
//! ┌─────────────┐    ┌───────────┐    ┌────────────┐    ┌─────────┐    ┌────────────┐
//! │   Capture   │───▶│ Segmenter │───▶│ Recognizer │───▶│ Ordered │───▶│ Transcript │
//! │  (thread)   │    │           │    │    pool    │    │  merge  │    │   buffer   │
//! └─────────────┘    └───────────┘    └────────────┘    └─────────┘    └────────────┘
//!      frames          segments        outcomes (out      strict
//!                    (seq 0,1,2…)      of order)          seq order
//! ```
//!
//! The segment queue is bounded; a full queue blocks the segmenter and,
//! through the frame channel, the capture thread. Audio is never dropped.
//! Workers complete in arbitrary order; the merge stage restores sequence
//! order before anything reaches the transcript.

pub mod capture;
pub mod frame;
pub mod merge;
pub mod segmenter;
pub mod workers;

pub use capture::{CaptureConfig, CaptureHandle, CaptureStation};
pub use frame::{AudioFrame, AudioSegment, RecognitionOutcome};
pub use merge::OrderedMerge;
pub use segmenter::{SegmenterConfig, SegmenterStation};
pub use workers::RecognizerPool;
