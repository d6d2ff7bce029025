//! Ordered merge: completion order in, segment order out.
//!
//! Workers finish in arbitrary order; this stage holds early arrivals in
//! a reorder buffer keyed by sequence and releases only the contiguous
//! run starting at the next expected sequence. Nothing reaches the
//! transcript out of order, and nothing is skipped.

use crate::observer::{Observer, PipelineEvent};
use crate::pipeline::frame::RecognitionOutcome;
use crate::transcript::TranscriptBuffer;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Noise annotations some models emit for non-speech audio.
const NOISE_MARKERS: [&str; 5] = ["BLANK_AUDIO", "MUSIC", "NOISE", "SILENCE", "INAUDIBLE"];

/// Strips bracketed noise annotations like `[BLANK_AUDIO]` or `(music)`
/// and collapses the surrounding whitespace.
pub fn clean_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find(['[', '(']) {
        let close_char = if rest.as_bytes()[open] == b'[' { ']' } else { ')' };
        let Some(close) = rest[open..].find(close_char) else {
            break;
        };
        let inner = rest[open + 1..open + close].trim();
        let is_marker = NOISE_MARKERS
            .iter()
            .any(|m| inner.eq_ignore_ascii_case(m) || inner.replace(' ', "_").eq_ignore_ascii_case(m));
        if is_marker {
            out.push_str(&rest[..open]);
            // A space where the marker was, so its neighbors stay apart.
            out.push(' ');
        } else {
            out.push_str(&rest[..open + close + 1]);
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reorder buffer with a next-expected cursor.
#[derive(Debug, Default)]
pub struct OrderedMerge {
    pending: BTreeMap<u64, RecognitionOutcome>,
    next_sequence: u64,
}

impl OrderedMerge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts one outcome and returns every outcome now releasable in
    /// strict sequence order (possibly none, possibly several).
    pub fn offer(&mut self, outcome: RecognitionOutcome) -> Vec<RecognitionOutcome> {
        self.pending.insert(outcome.sequence, outcome);

        let mut released = Vec::new();
        while let Some(next) = self.pending.remove(&self.next_sequence) {
            self.next_sequence += 1;
            released.push(next);
        }
        released
    }

    /// Sequence the next release is waiting on.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Outcomes held back behind a missing sequence.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Runs the merge stage until the outcome channel closes, appending
    /// released results to the transcript.
    ///
    /// Successful outcomes append their cleaned text; failed outcomes
    /// append a gap block. A rejected append aborts the stage: an
    /// ordering violation is a pipeline defect and is reported as such,
    /// while an append against an already-sealed transcript (the drain
    /// timed out underneath us) just discards the segment.
    pub async fn run(
        mut self,
        mut outcomes: mpsc::Receiver<RecognitionOutcome>,
        transcript: Arc<TranscriptBuffer>,
        observer: Arc<dyn Observer>,
    ) {
        while let Some(outcome) = outcomes.recv().await {
            for released in self.offer(outcome) {
                let result = if released.ok {
                    transcript.append_text(released.sequence, clean_markers(&released.text))
                } else {
                    transcript.append_gap(released.sequence)
                };
                if let Err(e) = result {
                    if e.is_internal() {
                        observer.notify(&PipelineEvent::InternalError {
                            message: e.to_string(),
                        });
                    } else {
                        observer.notify(&PipelineEvent::SegmentDiscarded {
                            sequence: released.sequence,
                        });
                    }
                    return;
                }
            }
        }

        // Results stranded behind a sequence that never arrived.
        for sequence in self.pending.keys() {
            observer.notify(&PipelineEvent::SegmentDiscarded {
                sequence: *sequence,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;
    use std::sync::Mutex;
    use std::time::Duration;

    fn outcome(sequence: u64, text: &str) -> RecognitionOutcome {
        RecognitionOutcome::success(sequence, text.to_string(), Duration::ZERO)
    }

    #[test]
    fn test_in_order_offers_release_immediately() {
        let mut merge = OrderedMerge::new();
        for i in 0..3 {
            let released = merge.offer(outcome(i, "x"));
            assert_eq!(released.len(), 1);
            assert_eq!(released[0].sequence, i);
        }
        assert_eq!(merge.pending_count(), 0);
    }

    #[test]
    fn test_early_arrival_is_held_until_contiguous() {
        let mut merge = OrderedMerge::new();

        assert!(merge.offer(outcome(2, "c")).is_empty());
        assert!(merge.offer(outcome(1, "b")).is_empty());
        assert_eq!(merge.pending_count(), 2);

        let released = merge.offer(outcome(0, "a"));
        let sequences: Vec<u64> = released.iter().map(|o| o.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(merge.pending_count(), 0);
        assert_eq!(merge.next_sequence(), 3);
    }

    #[test]
    fn test_arbitrary_permutation_releases_in_order() {
        let permutation = [3u64, 0, 4, 1, 2];
        let mut merge = OrderedMerge::new();
        let mut released = Vec::new();
        for &seq in &permutation {
            released.extend(merge.offer(outcome(seq, "x")));
        }

        let sequences: Vec<u64> = released.iter().map(|o| o.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_clean_markers_strips_noise_annotations() {
        assert_eq!(clean_markers("[BLANK_AUDIO]"), "");
        assert_eq!(clean_markers("hello [MUSIC] world"), "hello world");
        assert_eq!(clean_markers("(music) start"), "start");
        assert_eq!(clean_markers("[ Blank Audio ]"), "");
        assert_eq!(clean_markers("keep [this] text"), "keep [this] text");
        assert_eq!(clean_markers("  spaced   out  "), "spaced out");
    }

    #[test]
    fn test_clean_markers_separates_words_joined_by_a_marker() {
        assert_eq!(clean_markers("hello[MUSIC]world"), "hello world");
        assert_eq!(clean_markers("a(noise)b[SILENCE]c"), "a b c");
        assert_eq!(clean_markers("x[BLANK_AUDIO][MUSIC]y"), "x y");
    }

    #[tokio::test]
    async fn test_run_appends_out_of_order_results_in_order() {
        let (tx, rx) = mpsc::channel(16);
        let transcript = Arc::new(TranscriptBuffer::new());
        let merge = OrderedMerge::new();

        let task = tokio::spawn(merge.run(rx, transcript.clone(), Arc::new(NullObserver)));

        for seq in [2u64, 0, 1] {
            tx.send(outcome(seq, &format!("S{}", seq))).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();

        assert_eq!(transcript.read_all(), "S0 S1 S2");
    }

    #[tokio::test]
    async fn test_run_appends_gap_for_failed_outcome() {
        let (tx, rx) = mpsc::channel(16);
        let transcript = Arc::new(TranscriptBuffer::new());
        let merge = OrderedMerge::new();

        let task = tokio::spawn(merge.run(rx, transcript.clone(), Arc::new(NullObserver)));

        tx.send(outcome(0, "before")).await.unwrap();
        tx.send(RecognitionOutcome::failure(1, Duration::ZERO))
            .await
            .unwrap();
        tx.send(outcome(2, "after")).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(transcript.read_all(), "before [gap] after");
    }

    struct Collecting(Mutex<Vec<PipelineEvent>>);
    impl Observer for Collecting {
        fn notify(&self, event: &PipelineEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[tokio::test]
    async fn test_ordering_violation_is_reported_as_internal_defect() {
        let (tx, rx) = mpsc::channel(16);
        let transcript = Arc::new(TranscriptBuffer::new());
        // The transcript already holds sequence 0, so the merge stage's
        // own append of 0 violates the ordering guard.
        transcript.append_text(0, "pre".to_string()).unwrap();
        let observer = Arc::new(Collecting(Mutex::new(Vec::new())));
        let merge = OrderedMerge::new();

        let task = tokio::spawn(merge.run(rx, transcript.clone(), observer.clone()));
        tx.send(outcome(0, "dup")).await.unwrap();
        drop(tx);
        task.await.unwrap();

        let events = observer.0.lock().unwrap();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PipelineEvent::InternalError { .. })),
            "ordering violation not flagged as a defect: {:?}",
            events
        );
        assert_eq!(transcript.read_all(), "pre");
    }

    #[tokio::test]
    async fn test_sealed_transcript_discards_instead_of_flagging_defect() {
        let (tx, rx) = mpsc::channel(16);
        let transcript = Arc::new(TranscriptBuffer::new());
        transcript.seal();
        let observer = Arc::new(Collecting(Mutex::new(Vec::new())));
        let merge = OrderedMerge::new();

        let task = tokio::spawn(merge.run(rx, transcript.clone(), observer.clone()));
        tx.send(outcome(0, "late")).await.unwrap();
        drop(tx);
        task.await.unwrap();

        let events = observer.0.lock().unwrap();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PipelineEvent::SegmentDiscarded { sequence: 0 }))
        );
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, PipelineEvent::InternalError { .. }))
        );
    }

    #[tokio::test]
    async fn test_stranded_results_are_reported_discarded() {
        let (tx, rx) = mpsc::channel(16);
        let transcript = Arc::new(TranscriptBuffer::new());
        let observer = Arc::new(Collecting(Mutex::new(Vec::new())));
        let merge = OrderedMerge::new();

        let task = tokio::spawn(merge.run(rx, transcript.clone(), observer.clone()));

        // Sequence 0 never arrives; 1 and 2 are stranded
        tx.send(outcome(1, "b")).await.unwrap();
        tx.send(outcome(2, "c")).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(transcript.read_all(), "");
        let events = observer.0.lock().unwrap();
        let discarded: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::SegmentDiscarded { sequence } => Some(*sequence),
                _ => None,
            })
            .collect();
        assert_eq!(discarded, vec![1, 2]);
    }
}
