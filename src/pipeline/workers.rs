//! Recognition worker pool.
//!
//! Recognition is CPU-bound and synchronous, so each segment runs on a
//! blocking thread via `spawn_blocking`; a semaphore caps concurrency at
//! the pool size. Outcomes are emitted in completion order, which may
//! differ from segment order; restoring order is the merge stage's job.
//!
//! A failed recognition is absorbed here: it becomes a failure outcome
//! (later a gap block in the transcript) and an observer event, never a
//! session-fatal error.

use crate::observer::{Observer, PipelineEvent};
use crate::pipeline::frame::{AudioSegment, RecognitionOutcome};
use crate::stt::recognizer::Recognizer;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::spawn_blocking;

/// Pool of recognition workers sharing one recognizer.
pub struct RecognizerPool<R: Recognizer + 'static> {
    recognizer: Arc<R>,
    pool_size: usize,
    observer: Arc<dyn Observer>,
}

impl<R: Recognizer + 'static> RecognizerPool<R> {
    pub fn new(recognizer: Arc<R>, pool_size: usize, observer: Arc<dyn Observer>) -> Self {
        Self {
            recognizer,
            pool_size: pool_size.max(1),
            observer,
        }
    }

    /// Runs the pool until the segment queue closes and all in-flight
    /// recognitions finish. The outcome sender drops on return.
    pub async fn run(
        self,
        mut segments: mpsc::Receiver<AudioSegment>,
        outcomes: mpsc::Sender<RecognitionOutcome>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.pool_size));

        while let Some(segment) = segments.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let recognizer = self.recognizer.clone();
            let observer = self.observer.clone();
            let outcomes = outcomes.clone();

            tokio::spawn(async move {
                let sequence = segment.sequence;
                let started = Instant::now();
                let result =
                    spawn_blocking(move || recognizer.recognize(&segment.samples)).await;
                let latency = started.elapsed();

                let outcome = match result {
                    Ok(Ok(text)) => RecognitionOutcome::success(sequence, text, latency),
                    Ok(Err(e)) => {
                        observer.notify(&PipelineEvent::RecognitionFailed {
                            sequence,
                            message: e.to_string(),
                        });
                        RecognitionOutcome::failure(sequence, latency)
                    }
                    Err(e) => {
                        // Worker panic: contain it as a per-segment failure.
                        observer.notify(&PipelineEvent::RecognitionFailed {
                            sequence,
                            message: format!("worker panicked: {}", e),
                        });
                        RecognitionOutcome::failure(sequence, latency)
                    }
                };
                let _ = outcomes.send(outcome).await;
                drop(permit);
            });
        }

        // Wait for every in-flight worker before closing the outcome
        // channel; stop's drain depends on all dispatched segments
        // producing an outcome.
        let _ = semaphore.acquire_many(self.pool_size as u32).await;
    }
}
