//! Ordered transcript accumulation.
//!
//! The transcript is a sequence of per-segment blocks appended in strict
//! segment order by the merge stage. Readers take a point-in-time snapshot
//! at any moment; after the session is sealed, the text becomes editable
//! as a whole (the edit overlays the rendered blocks, it does not rewrite
//! them).

use crate::defaults::GAP_MARKER;
use crate::error::{MeetscribeError, Result};
use std::sync::Mutex;
use tokio::sync::watch;

/// Prefix of the notice appended to snapshots when draining timed out
/// and results were discarded.
pub const TRUNCATION_MARKER: &str = "[transcript truncated:";

/// One transcript block, corresponding to exactly one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Recognized text; may be empty for silent segments.
    Text(String),
    /// Recognition failed for this segment.
    Gap,
}

#[derive(Debug, Default)]
struct Inner {
    blocks: Vec<Block>,
    next_sequence: u64,
    sealed: bool,
    truncated: Option<u64>,
    edited: Option<String>,
}

/// Shared, thread-safe transcript buffer.
///
/// Appends are guarded by sequence number: only the next expected segment
/// may land, which turns any merge-stage ordering defect into a loud error
/// instead of a silently scrambled transcript.
#[derive(Debug)]
pub struct TranscriptBuffer {
    inner: Mutex<Inner>,
    revision: watch::Sender<u64>,
}

impl Default for TranscriptBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Mutex::new(Inner::default()),
            revision,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned transcript mutex means a panic mid-append; the data
        // is still a valid prefix, so recover it.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    /// Appends the block for segment `sequence`.
    ///
    /// # Errors
    /// `OutOfOrderAppend` if `sequence` is not the next expected segment;
    /// `InvalidStateTransition` if the buffer is already sealed.
    pub fn append(&self, sequence: u64, block: Block) -> Result<()> {
        {
            let mut inner = self.lock();
            if inner.sealed {
                return Err(MeetscribeError::InvalidStateTransition {
                    operation: "append".to_string(),
                    state: "sealed".to_string(),
                });
            }
            if sequence != inner.next_sequence {
                return Err(MeetscribeError::OutOfOrderAppend {
                    expected: inner.next_sequence,
                    got: sequence,
                });
            }
            inner.blocks.push(block);
            inner.next_sequence += 1;
        }
        self.bump();
        Ok(())
    }

    /// Appends recognized text for segment `sequence`.
    pub fn append_text(&self, sequence: u64, text: String) -> Result<()> {
        self.append(sequence, Block::Text(text))
    }

    /// Appends a gap block for a segment that failed recognition.
    pub fn append_gap(&self, sequence: u64) -> Result<()> {
        self.append(sequence, Block::Gap)
    }

    /// Sequence number the next append must carry.
    pub fn next_sequence(&self) -> u64 {
        self.lock().next_sequence
    }

    /// Number of blocks accumulated so far.
    pub fn block_count(&self) -> usize {
        self.lock().blocks.len()
    }

    /// Marks the transcript as truncated; the snapshot carries a notice
    /// naming the number of segments lost.
    pub fn note_truncation(&self, outstanding: u64) {
        self.lock().truncated = Some(outstanding);
        self.bump();
    }

    /// Seals the transcript: no further appends, edits become legal.
    pub fn seal(&self) {
        self.lock().sealed = true;
        self.bump();
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    /// Replaces the rendered text wholesale. Only legal once sealed; the
    /// pipeline no longer writes, so the edit cannot race an append.
    pub fn apply_edit(&self, text: String) -> Result<()> {
        {
            let mut inner = self.lock();
            if !inner.sealed {
                return Err(MeetscribeError::InvalidStateTransition {
                    operation: "edit".to_string(),
                    state: "recording".to_string(),
                });
            }
            inner.edited = Some(text);
        }
        self.bump();
        Ok(())
    }

    /// Point-in-time snapshot of the transcript text.
    ///
    /// Non-empty text blocks are joined with single spaces; failed segments
    /// render as a gap marker; silent segments contribute nothing. A
    /// post-seal edit replaces all of the above.
    pub fn read_all(&self) -> String {
        let inner = self.lock();
        if let Some(ref edited) = inner.edited {
            return edited.clone();
        }

        let mut out = String::new();
        for block in &inner.blocks {
            let piece = match block {
                Block::Text(text) => text.trim(),
                Block::Gap => GAP_MARKER,
            };
            if piece.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(piece);
        }
        if let Some(outstanding) = inner.truncated {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!(
                "{} {} segments not transcribed]",
                TRUNCATION_MARKER, outstanding
            ));
        }
        out
    }

    /// Watch channel that ticks on every append, seal, or edit.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
