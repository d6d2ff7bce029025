//! Capture station: device thread producing the frame stream.
//!
//! Owns the audio source exclusively for the session. A dedicated thread
//! polls the device buffer and emits numbered frames into a bounded
//! channel; `blocking_send` on a full channel is the backpressure path
//! that ultimately slows segmentation, never drops audio.

use crate::audio::source::AudioSource;
use crate::error::Result;
use crate::observer::{NullObserver, Observer, PipelineEvent};
use crate::pipeline::frame::AudioFrame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Configuration for the capture station.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate stamped onto emitted frames.
    pub sample_rate: u32,
    /// Frame channel bound.
    pub channel_depth: usize,
    /// Polling interval when no samples are available.
    pub poll_interval: Duration,
    /// Retain all captured samples for WAV archival.
    pub archive: bool,
    /// Stop capture on its own after this long, as if `stop` were called.
    pub max_duration: Option<Duration>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::defaults::SAMPLE_RATE,
            channel_depth: crate::defaults::FRAME_CHANNEL_DEPTH,
            poll_interval: Duration::from_millis(crate::defaults::POLL_INTERVAL_MS),
            archive: false,
            max_duration: None,
        }
    }
}

/// Capture station wrapping an audio source.
pub struct CaptureStation<A: AudioSource> {
    source: A,
    config: CaptureConfig,
    observer: Arc<dyn Observer>,
    running: Arc<AtomicBool>,
}

impl<A: AudioSource + 'static> CaptureStation<A> {
    /// Creates a capture station with default configuration.
    pub fn new(source: A) -> Self {
        Self::with_config(source, CaptureConfig::default())
    }

    /// Creates a capture station with custom configuration.
    pub fn with_config(source: A, config: CaptureConfig) -> Self {
        Self {
            source,
            config,
            observer: Arc::new(NullObserver),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reports device failures during capture to the given observer.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Starts the capture thread.
    ///
    /// Returns the frame receiver and a handle for stopping. The thread
    /// runs until `stop()` is called, the receiver is dropped, a finite
    /// source is exhausted, or `max_duration` elapses. On stop, the device
    /// buffer is drained one final time so every frame captured before
    /// stop completion is delivered exactly once; the channel then closes.
    pub fn start(mut self) -> Result<(mpsc::Receiver<AudioFrame>, CaptureHandle)> {
        let (tx, rx) = mpsc::channel(self.config.channel_depth);
        let running = self.running.clone();
        let archive = self
            .config
            .archive
            .then(|| Arc::new(Mutex::new(Vec::<i16>::new())));

        self.source.start()?;
        running.store(true, Ordering::SeqCst);

        let handle = CaptureHandle {
            running: running.clone(),
            archive: archive.clone(),
        };

        let sample_rate = self.config.sample_rate;
        let poll_interval = self.config.poll_interval;
        let max_duration = self.config.max_duration;
        let observer = self.observer;

        thread::spawn(move || {
            let started = Instant::now();
            let mut sequence = 0u64;

            let deliver = |samples: Vec<i16>, sequence: &mut u64| -> bool {
                if let Some(ref archive) = archive
                    && let Ok(mut buf) = archive.lock()
                {
                    buf.extend_from_slice(&samples);
                }
                let frame = AudioFrame::new(*sequence, sample_rate, samples);
                *sequence += 1;
                tx.blocking_send(frame).is_ok()
            };

            while running.load(Ordering::SeqCst) {
                if let Some(max) = max_duration
                    && started.elapsed() >= max
                {
                    break;
                }

                match self.source.read_samples() {
                    Ok(samples) if !samples.is_empty() => {
                        if !deliver(samples, &mut sequence) {
                            break;
                        }
                    }
                    Ok(_) => {
                        if self.source.is_finite() {
                            break;
                        }
                        thread::sleep(poll_interval);
                    }
                    Err(e) => {
                        observer.notify(&PipelineEvent::CaptureFailed {
                            message: e.to_string(),
                        });
                        break;
                    }
                }
            }
            running.store(false, Ordering::SeqCst);

            // Final drain: frames captured before stop completed are still
            // delivered, exactly once.
            if let Ok(samples) = self.source.read_samples()
                && !samples.is_empty()
            {
                let _ = deliver(samples, &mut sequence);
            }

            let _ = self.source.stop();
            // tx drops here; the closed channel signals end-of-stream.
        });

        Ok((rx, handle))
    }
}

/// Handle to control a running capture station.
#[derive(Clone)]
pub struct CaptureHandle {
    running: Arc<AtomicBool>,
    archive: Option<Arc<Mutex<Vec<i16>>>>,
}

impl CaptureHandle {
    /// Signals the capture thread to stop and release the device.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Returns true if capture is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Takes the archived session audio, if archival was enabled.
    pub fn take_archive(&self) -> Option<Vec<i16>> {
        let archive = self.archive.as_ref()?;
        let mut buf = archive.lock().ok()?;
        Some(std::mem::take(&mut *buf))
    }
}
