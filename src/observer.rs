//! Pipeline event reporting.
//!
//! Per-segment recognition failures never abort the session; they are
//! absorbed locally and surfaced to an external observer instead. The same
//! channel carries state transitions and drain diagnostics so a UI or log
//! sink can follow the session without polling.

use crate::session::SessionState;

/// Events emitted by the pipeline and session state machine.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Session state machine transition.
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// A segment failed recognition; the transcript carries a gap block.
    RecognitionFailed { sequence: u64, message: String },
    /// The audio device failed mid-recording; capture has ended and no
    /// further frames will arrive. The session stays active so already
    /// dispatched segments can still drain through `stop`.
    CaptureFailed { message: String },
    /// A trailing partial below the minimum-useful bound was dropped on stop.
    TrailingAudioDropped { duration_ms: u32 },
    /// A dispatched segment never reached the transcript (drain timeout or
    /// a result stranded behind a missing sequence).
    SegmentDiscarded { sequence: u64 },
    /// Draining timed out; the transcript was truncated.
    DrainTimedOut { outstanding: u64 },
    /// An internal invariant was violated; indicates a pipeline defect.
    InternalError { message: String },
    /// WAV archival of the session audio failed.
    ArchiveFailed { message: String },
}

/// Trait for observing pipeline events.
pub trait Observer: Send + Sync {
    /// Called for every pipeline event. Must not block.
    fn notify(&self, event: &PipelineEvent);
}

/// Observer that logs events to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrObserver;

impl Observer for StderrObserver {
    fn notify(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StateChanged { from, to } => {
                eprintln!("meetscribe: session {} -> {}", from, to);
            }
            PipelineEvent::RecognitionFailed { sequence, message } => {
                eprintln!("meetscribe: segment {} failed recognition: {}", sequence, message);
            }
            PipelineEvent::CaptureFailed { message } => {
                eprintln!("meetscribe: audio capture failed: {}", message);
            }
            PipelineEvent::TrailingAudioDropped { duration_ms } => {
                eprintln!("meetscribe: dropped {}ms trailing partial segment", duration_ms);
            }
            PipelineEvent::SegmentDiscarded { sequence } => {
                eprintln!("meetscribe: segment {} discarded", sequence);
            }
            PipelineEvent::DrainTimedOut { outstanding } => {
                eprintln!(
                    "meetscribe: drain timed out, {} segments discarded",
                    outstanding
                );
            }
            PipelineEvent::InternalError { message } => {
                eprintln!("meetscribe: internal error (pipeline defect): {}", message);
            }
            PipelineEvent::ArchiveFailed { message } => {
                eprintln!("meetscribe: failed to archive session audio: {}", message);
            }
        }
    }
}

/// Observer that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn notify(&self, _event: &PipelineEvent) {}
}
