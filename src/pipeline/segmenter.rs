//! Segmenter station: frames in, bounded segments out.
//!
//! Accumulates capture frames and cuts a segment whenever the pending
//! audio reaches the duration bound. Segments are contiguous and
//! non-overlapping; their sequence numbers are assigned here and are
//! gap-free for the life of the session. Sending on a full segment queue
//! blocks, which is what propagates backpressure to the capture thread.

use crate::observer::{Observer, PipelineEvent};
use crate::pipeline::frame::{AudioFrame, AudioSegment};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;

/// Configuration for the segmenter station.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Sample rate of incoming frames.
    pub sample_rate: u32,
    /// Target segment duration in milliseconds.
    pub segment_duration_ms: u32,
    /// Minimum useful duration for the trailing partial segment.
    pub min_segment_ms: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::defaults::SAMPLE_RATE,
            segment_duration_ms: crate::defaults::SEGMENT_DURATION_MS,
            min_segment_ms: crate::defaults::MIN_SEGMENT_MS,
        }
    }
}

impl SegmenterConfig {
    fn bound_samples(&self) -> usize {
        (self.sample_rate as u64 * self.segment_duration_ms as u64 / 1000) as usize
    }

    fn min_samples(&self) -> usize {
        (self.sample_rate as u64 * self.min_segment_ms as u64 / 1000) as usize
    }
}

/// Segmenter station.
pub struct SegmenterStation {
    config: SegmenterConfig,
    observer: Arc<dyn Observer>,
    /// Count of segments handed to the worker queue, shared with the
    /// drain logic so stop knows how many results to wait for.
    dispatched: Arc<AtomicU64>,
}

impl SegmenterStation {
    pub fn new(config: SegmenterConfig, observer: Arc<dyn Observer>) -> Self {
        Self {
            config,
            observer,
            dispatched: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared counter of segments dispatched so far.
    pub fn dispatched(&self) -> Arc<AtomicU64> {
        self.dispatched.clone()
    }

    /// Runs the station until the frame channel closes.
    ///
    /// On close, a pending partial at or above the minimum-useful bound is
    /// flushed as a final (shorter) segment; anything below it is dropped
    /// and reported to the observer. The segment sender drops on return,
    /// closing the queue toward the worker pool.
    pub async fn run(
        self,
        mut frames: mpsc::Receiver<AudioFrame>,
        segments: mpsc::Sender<AudioSegment>,
    ) {
        let bound = self.config.bound_samples().max(1);
        let min = self.config.min_samples();

        let mut pending: Vec<i16> = Vec::with_capacity(bound);
        let mut pending_start: Option<(u64, Instant)> = None;
        let mut last_frame = 0u64;
        let mut next_sequence = 0u64;

        while let Some(frame) = frames.recv().await {
            if pending_start.is_none() {
                pending_start = Some((frame.sequence, frame.captured_at));
            }
            last_frame = frame.sequence;
            pending.extend_from_slice(&frame.samples);

            // A single frame can carry more than one segment's worth of
            // audio (e.g. the final capture drain).
            while pending.len() >= bound {
                let samples: Vec<i16> = pending.drain(..bound).collect();
                let (first_frame, captured_at) = match pending_start {
                    Some(start) => start,
                    None => (frame.sequence, frame.captured_at),
                };
                let segment = AudioSegment {
                    sequence: next_sequence,
                    first_frame,
                    last_frame,
                    captured_at,
                    samples,
                };
                next_sequence += 1;
                if pending.is_empty() {
                    pending_start = None;
                } else {
                    pending_start = Some((frame.sequence, frame.captured_at));
                }
                self.dispatched.fetch_add(1, Ordering::SeqCst);
                if segments.send(segment).await.is_err() {
                    return;
                }
            }
        }

        // Flush the trailing partial.
        if !pending.is_empty() {
            if pending.len() >= min {
                let (first_frame, captured_at) =
                    pending_start.unwrap_or((last_frame, Instant::now()));
                let segment = AudioSegment {
                    sequence: next_sequence,
                    first_frame,
                    last_frame,
                    captured_at,
                    samples: pending,
                };
                self.dispatched.fetch_add(1, Ordering::SeqCst);
                let _ = segments.send(segment).await;
            } else {
                let duration_ms =
                    (pending.len() as u64 * 1000 / self.config.sample_rate as u64) as u32;
                self.observer
                    .notify(&PipelineEvent::TrailingAudioDropped { duration_ms });
            }
        }
    }
}
