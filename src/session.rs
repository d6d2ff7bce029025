//! Recording session lifecycle.
//!
//! One session object manages one recording at a time through a small
//! state machine:
//!
//! ```text
//! Idle ──start──▶ Recording ──stop──▶ Stopping ──drain──▶ Stopped
//!   ▲                │                                       │
//!   └────cancel──────┘               reset ◀─────────────────┘
//! ```
//!
//! `start` wires the full pipeline (capture thread, segmenter, worker
//! pool, ordered merge) and hands ownership of the transcript buffer to
//! the merge stage. `stop` signals capture, then waits for the pipeline
//! to drain end to end; every segment dispatched before stop either
//! reaches the transcript or is accounted for by a truncation notice.

use crate::audio::source::AudioSource;
use crate::audio::wav;
use crate::config::Config;
use crate::error::{MeetscribeError, Result};
use crate::observer::{Observer, PipelineEvent};
use crate::pipeline::capture::{CaptureConfig, CaptureHandle, CaptureStation};
use crate::pipeline::merge::OrderedMerge;
use crate::pipeline::segmenter::{SegmenterConfig, SegmenterStation};
use crate::pipeline::workers::RecognizerPool;
use crate::stt::recognizer::Recognizer;
use crate::transcript::TranscriptBuffer;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No recording; the transcript is empty.
    Idle,
    /// Capturing and transcribing.
    Recording,
    /// Stop requested; draining in-flight segments.
    Stopping,
    /// Drain complete; the transcript is final and editable.
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "Idle",
            SessionState::Recording => "Recording",
            SessionState::Stopping => "Stopping",
            SessionState::Stopped => "Stopped",
        };
        write!(f, "{}", name)
    }
}

struct ActiveSession {
    capture: CaptureHandle,
    dispatched: Arc<AtomicU64>,
    segmenter_task: JoinHandle<()>,
    pool_task: JoinHandle<()>,
    merge_task: JoinHandle<()>,
}

/// A recording session.
///
/// Thread-safe; all operations take `&self`. The recognizer is shared
/// across recordings (model loading is expensive), the audio source is
/// consumed per recording.
pub struct Session<R: Recognizer + 'static> {
    config: Config,
    recognizer: Arc<R>,
    observer: Arc<dyn Observer>,
    state: std::sync::Mutex<SessionState>,
    active: tokio::sync::Mutex<Option<ActiveSession>>,
    transcript: std::sync::Mutex<Arc<TranscriptBuffer>>,
}

impl<R: Recognizer + 'static> Session<R> {
    /// Creates a session. The configuration is validated once here;
    /// nothing later reads file or environment state.
    pub fn new(config: Config, recognizer: Arc<R>, observer: Arc<dyn Observer>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            recognizer,
            observer,
            state: std::sync::Mutex::new(SessionState::Idle),
            active: tokio::sync::Mutex::new(None),
            transcript: std::sync::Mutex::new(Arc::new(TranscriptBuffer::new())),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn set_state(&self, guard: &mut SessionState, to: SessionState) {
        let from = *guard;
        *guard = to;
        self.observer
            .notify(&PipelineEvent::StateChanged { from, to });
    }

    fn buffer(&self) -> Arc<TranscriptBuffer> {
        match self.transcript.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_buffer(&self) -> Arc<TranscriptBuffer> {
        let fresh = Arc::new(TranscriptBuffer::new());
        match self.transcript.lock() {
            Ok(mut guard) => *guard = fresh.clone(),
            Err(poisoned) => *poisoned.into_inner() = fresh.clone(),
        }
        fresh
    }

    /// Point-in-time snapshot of the transcript text.
    ///
    /// Readable in every state: growing while Recording, final once
    /// Stopped, empty after reset.
    pub fn transcript(&self) -> String {
        self.buffer().read_all()
    }

    /// Watch channel that ticks whenever the transcript changes.
    ///
    /// Tied to the current recording's buffer; subscribe again after
    /// `start` or `reset`.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.buffer().subscribe()
    }

    /// Starts recording from the given source.
    ///
    /// Consumes the source; a fresh one is needed per recording. Fails
    /// without a state change if the device cannot start.
    ///
    /// # Errors
    /// `AlreadyRecording` unless the session is Idle (a Stopped session
    /// must be `reset` first); device errors from the source.
    pub async fn start<A: AudioSource + 'static>(&self, source: A) -> Result<()> {
        let mut active = self.active.lock().await;
        {
            let state = self.lock_state();
            if *state != SessionState::Idle {
                return Err(MeetscribeError::AlreadyRecording);
            }
        }

        let transcript = self.replace_buffer();
        let sample_rate = self.config.audio.sample_rate;

        let capture_config = CaptureConfig {
            sample_rate,
            archive: self.config.session.archive_dir.is_some(),
            max_duration: self.config.session.max_duration(),
            ..CaptureConfig::default()
        };
        let segmenter_config = SegmenterConfig {
            sample_rate,
            segment_duration_ms: self.config.session.segment_duration_ms,
            min_segment_ms: self.config.session.min_segment_ms,
        };

        let station =
            CaptureStation::with_config(source, capture_config).with_observer(self.observer.clone());
        let (frames, capture) = station.start()?;

        let segmenter = SegmenterStation::new(segmenter_config, self.observer.clone());
        let dispatched = segmenter.dispatched();
        let pool = RecognizerPool::new(
            self.recognizer.clone(),
            self.config.session.workers,
            self.observer.clone(),
        );
        let merge = OrderedMerge::new();

        let (seg_tx, seg_rx) = tokio::sync::mpsc::channel(self.config.session.segment_queue_depth);
        let (out_tx, out_rx) = tokio::sync::mpsc::channel(self.config.session.segment_queue_depth);

        let segmenter_task = tokio::spawn(segmenter.run(frames, seg_tx));
        let pool_task = tokio::spawn(pool.run(seg_rx, out_tx));
        let merge_task = tokio::spawn(merge.run(out_rx, transcript, self.observer.clone()));

        *active = Some(ActiveSession {
            capture,
            dispatched,
            segmenter_task,
            pool_task,
            merge_task,
        });
        self.set_state(&mut self.lock_state(), SessionState::Recording);
        Ok(())
    }

    /// Stops recording and waits for the pipeline to drain.
    ///
    /// Returns the final transcript. Idempotent while Stopping or
    /// Stopped: concurrent and repeated calls observe the same terminal
    /// transcript. If draining exceeds the configured timeout, the
    /// session still reaches Stopped and the transcript carries a
    /// truncation notice.
    ///
    /// # Errors
    /// `InvalidStateTransition` if the session is Idle.
    pub async fn stop(&self) -> Result<String> {
        {
            let mut state = self.lock_state();
            match *state {
                SessionState::Idle => {
                    return Err(MeetscribeError::InvalidStateTransition {
                        operation: "stop".to_string(),
                        state: state.to_string(),
                    });
                }
                SessionState::Recording => {
                    self.set_state(&mut state, SessionState::Stopping);
                }
                SessionState::Stopping => {}
                SessionState::Stopped => return Ok(self.transcript()),
            }
        }

        let mut active = self.active.lock().await;
        if let Some(session) = active.take() {
            self.drain(session).await;
        }
        // If the drain was performed by a concurrent stop, the state is
        // already Stopped by the time the lock is released.
        Ok(self.transcript())
    }

    async fn drain(&self, session: ActiveSession) {
        session.capture.stop();

        let timeout = self.config.session.drain_timeout();
        let transcript = self.buffer();
        let merge_abort = session.merge_task.abort_handle();
        let drained = tokio::time::timeout(timeout, session.merge_task).await;

        match drained {
            Ok(_) => {
                // Merge finished, which implies segmenter and pool did too.
                let _ = session.segmenter_task.await;
                let _ = session.pool_task.await;
            }
            Err(_) => {
                merge_abort.abort();
                session.segmenter_task.abort();
                session.pool_task.abort();
                let dispatched = session.dispatched.load(Ordering::SeqCst);
                let outstanding = dispatched.saturating_sub(transcript.block_count() as u64);
                self.observer
                    .notify(&PipelineEvent::DrainTimedOut { outstanding });
                transcript.note_truncation(outstanding);
            }
        }

        transcript.seal();
        self.archive(&session.capture);
        self.set_state(&mut self.lock_state(), SessionState::Stopped);
    }

    fn archive(&self, capture: &CaptureHandle) {
        let Some(dir) = self.config.session.archive_dir.as_deref() else {
            return;
        };
        let Some(samples) = capture.take_archive() else {
            return;
        };
        if samples.is_empty() {
            return;
        }
        if let Err(e) = wav::archive_recording(dir, &samples, self.config.audio.sample_rate) {
            // Archival failure never affects the transcript.
            self.observer.notify(&PipelineEvent::ArchiveFailed {
                message: e.to_string(),
            });
        }
    }

    /// Forces the session back to Idle from any state, discarding the
    /// transcript and any in-flight work. No drain is performed. No-op
    /// when already Idle.
    pub async fn cancel(&self) {
        if self.state() == SessionState::Idle {
            return;
        }

        let mut active = self.active.lock().await;
        if let Some(session) = active.take() {
            session.capture.stop();
            session.segmenter_task.abort();
            session.pool_task.abort();
            session.merge_task.abort();
        }
        self.replace_buffer();
        let mut state = self.lock_state();
        if *state != SessionState::Idle {
            self.set_state(&mut state, SessionState::Idle);
        }
    }

    /// Returns a Stopped session to Idle, clearing the transcript.
    /// No-op when already Idle.
    ///
    /// # Errors
    /// `InvalidStateTransition` while Recording or Stopping.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock_state();
        match *state {
            SessionState::Idle => Ok(()),
            SessionState::Stopped => {
                self.replace_buffer();
                self.set_state(&mut state, SessionState::Idle);
                Ok(())
            }
            SessionState::Recording | SessionState::Stopping => {
                Err(MeetscribeError::InvalidStateTransition {
                    operation: "reset".to_string(),
                    state: state.to_string(),
                })
            }
        }
    }

    /// Replaces the final transcript text. Only legal once Stopped; the
    /// pipeline no longer writes, so the edit cannot race an append.
    pub fn edit_transcript(&self, text: String) -> Result<()> {
        {
            let state = self.lock_state();
            if *state != SessionState::Stopped {
                return Err(MeetscribeError::InvalidStateTransition {
                    operation: "edit".to_string(),
                    state: state.to_string(),
                });
            }
        }
        self.buffer().apply_edit(text)
    }

}
