use crate::defaults;
use crate::error::{MeetscribeError, Result};

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
/// The device is exclusively owned by the capture stage for the lifetime of
/// a session.
pub trait AudioSource: Send + Sync {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source and release the device.
    ///
    /// Samples already captured remain readable until the final
    /// `read_samples` drain.
    fn stop(&mut self) -> Result<()>;

    /// Read and consume all audio samples buffered since the last read.
    ///
    /// # Returns
    /// Vector of 16-bit PCM audio samples, or an error
    fn read_samples(&mut self) -> Result<Vec<i16>>;

    /// Returns true if the source produces a finite amount of audio and is
    /// exhausted once `read_samples` returns empty. Live devices return false.
    fn is_finite(&self) -> bool {
        false
    }
}

/// Configuration for audio source initialization
#[derive(Debug, Clone)]
pub struct AudioSourceConfig {
    pub sample_rate: u32,
}

impl Default for AudioSourceConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

/// Mock audio source for testing.
///
/// Yields scripted chunks in order, one per `read_samples` call, then
/// reports exhaustion. A repeating variant mimics a live device.
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    chunks: Vec<Vec<i16>>,
    position: usize,
    repeat: bool,
    should_fail_start: bool,
    fail_after_reads: Option<usize>,
    reads: usize,
    error_message: String,
}

impl MockAudioSource {
    /// Create an empty mock source.
    pub fn new() -> Self {
        Self {
            is_started: false,
            chunks: Vec::new(),
            position: 0,
            repeat: false,
            should_fail_start: false,
            fail_after_reads: None,
            reads: 0,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Configure the mock to yield the given chunks, one per read, then end.
    pub fn with_chunks(mut self, chunks: Vec<Vec<i16>>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Configure the mock to yield the same chunk on every read, like a
    /// live device that never runs out of audio.
    pub fn with_repeating_chunk(mut self, chunk: Vec<i16>) -> Self {
        self.chunks = vec![chunk];
        self.repeat = true;
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to error on every read after the first `reads`
    /// successful ones, like a device vanishing mid-recording.
    pub fn with_read_failure_after(mut self, reads: usize) -> Self {
        self.fail_after_reads = Some(reads);
        self
    }

    /// Returns true once every scripted chunk has been read.
    pub fn is_exhausted(&self) -> bool {
        !self.repeat && self.position >= self.chunks.len()
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(MeetscribeError::DeviceUnavailable {
                message: self.error_message.clone(),
            });
        }
        self.is_started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if !self.is_started {
            return Ok(Vec::new());
        }
        if let Some(limit) = self.fail_after_reads
            && self.reads >= limit
        {
            return Err(MeetscribeError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        self.reads += 1;
        if self.repeat {
            return Ok(self.chunks.first().cloned().unwrap_or_default());
        }
        if self.position >= self.chunks.len() {
            return Ok(Vec::new());
        }
        let chunk = self.chunks[self.position].clone();
        self.position += 1;
        Ok(chunk)
    }

    fn is_finite(&self) -> bool {
        !self.repeat
    }
}
