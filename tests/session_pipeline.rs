//! End-to-end pipeline tests: scripted audio through capture,
//! segmentation, concurrent recognition, and ordered accumulation.
//!
//! Segments are 100ms (1600 samples at 16kHz) and every scripted chunk
//! is exactly one segment long, so each chunk becomes one segment whose
//! first sample value identifies it. The scripted recognizer keys its
//! response (text, latency, failure) on that value, which makes worker
//! completion order controllable while segment order stays fixed.

use meetscribe::audio::source::MockAudioSource;
use meetscribe::config::Config;
use meetscribe::error::{MeetscribeError, Result};
use meetscribe::observer::{NullObserver, Observer, PipelineEvent};
use meetscribe::session::{Session, SessionState};
use meetscribe::stt::recognizer::Recognizer;
use meetscribe::transcript::TRUNCATION_MARKER;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SEGMENT_SAMPLES: usize = 1600; // 100ms at 16kHz

#[derive(Clone)]
struct Script {
    text: String,
    latency: Duration,
    fail: bool,
}

impl Script {
    fn ok(text: &str, latency_ms: u64) -> Self {
        Self {
            text: text.to_string(),
            latency: Duration::from_millis(latency_ms),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            text: String::new(),
            latency: Duration::ZERO,
            fail: true,
        }
    }
}

/// Recognizer that answers per segment, keyed by the segment's first
/// sample value.
struct ScriptedRecognizer {
    scripts: HashMap<i16, Script>,
}

impl ScriptedRecognizer {
    fn new(scripts: impl IntoIterator<Item = (i16, Script)>) -> Self {
        Self {
            scripts: scripts.into_iter().collect(),
        }
    }
}

impl Recognizer for ScriptedRecognizer {
    fn recognize(&self, audio: &[i16]) -> Result<String> {
        let key = audio.first().copied().unwrap_or(0);
        let script = self.scripts.get(&key).cloned().unwrap_or_else(|| Script {
            text: format!("unscripted-{}", key),
            latency: Duration::ZERO,
            fail: false,
        });
        if !script.latency.is_zero() {
            std::thread::sleep(script.latency);
        }
        if script.fail {
            Err(MeetscribeError::Recognition {
                message: format!("scripted failure for key {}", key),
            })
        } else {
            Ok(script.text)
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct CollectingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl Observer for CollectingObserver {
    fn notify(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

fn pipeline_config() -> Config {
    let mut config = Config::default();
    config.session.segment_duration_ms = 100;
    config.session.min_segment_ms = 50;
    config.session.workers = 3;
    config.session.drain_timeout_ms = 10_000;
    config
}

/// One chunk per segment; segment i carries the value (i + 1) * 100 in
/// every sample.
fn chunks(count: usize) -> Vec<Vec<i16>> {
    (0..count)
        .map(|i| vec![((i + 1) * 100) as i16; SEGMENT_SAMPLES])
        .collect()
}

fn key(segment: usize) -> i16 {
    ((segment + 1) * 100) as i16
}

#[tokio::test]
async fn transcript_order_matches_capture_order_despite_latency() {
    // Latencies chosen so completion order differs sharply from
    // dispatch order.
    let recognizer = ScriptedRecognizer::new([
        (key(0), Script::ok("S0", 300)),
        (key(1), Script::ok("S1", 50)),
        (key(2), Script::ok("S2", 200)),
        (key(3), Script::ok("S3", 10)),
        (key(4), Script::ok("S4", 100)),
    ]);
    let session = Session::new(
        pipeline_config(),
        Arc::new(recognizer),
        Arc::new(NullObserver),
    )
    .unwrap();

    let source = MockAudioSource::new().with_chunks(chunks(5));
    session.start(source).await.unwrap();

    let transcript = session.stop().await.unwrap();
    assert_eq!(transcript, "S0 S1 S2 S3 S4");
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn failed_segment_becomes_gap_and_session_continues() {
    let recognizer = ScriptedRecognizer::new([
        (key(0), Script::ok("S0", 20)),
        (key(1), Script::ok("S1", 5)),
        (key(2), Script::failing()),
        (key(3), Script::ok("S3", 10)),
        (key(4), Script::ok("S4", 0)),
    ]);
    let observer = Arc::new(CollectingObserver::default());
    let session =
        Session::new(pipeline_config(), Arc::new(recognizer), observer.clone()).unwrap();

    let source = MockAudioSource::new().with_chunks(chunks(5));
    session.start(source).await.unwrap();

    let transcript = session.stop().await.unwrap();
    assert_eq!(transcript, "S0 S1 [gap] S3 S4");

    let events = observer.events.lock().unwrap();
    let failures: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::RecognitionFailed { sequence, .. } => Some(*sequence),
            _ => None,
        })
        .collect();
    assert_eq!(failures, vec![2]);
}

#[tokio::test]
async fn stop_waits_for_every_dispatched_segment() {
    // Recognition far slower than capture: all segments are dispatched
    // long before any result lands.
    let scripts: Vec<(i16, Script)> = (0..8)
        .map(|i| (key(i), Script::ok(&format!("W{}", i), 40)))
        .collect();
    let session = Session::new(
        pipeline_config(),
        Arc::new(ScriptedRecognizer::new(scripts)),
        Arc::new(NullObserver),
    )
    .unwrap();

    let source = MockAudioSource::new().with_chunks(chunks(8));
    session.start(source).await.unwrap();

    let transcript = session.stop().await.unwrap();
    assert_eq!(transcript, "W0 W1 W2 W3 W4 W5 W6 W7");
    assert!(!transcript.contains(TRUNCATION_MARKER));
}

#[tokio::test]
async fn drain_timeout_truncates_but_still_stops() {
    let mut config = pipeline_config();
    config.session.drain_timeout_ms = 100;

    let recognizer = ScriptedRecognizer::new([
        (key(0), Script::ok("S0", 5)),
        // Far beyond the drain timeout
        (key(1), Script::ok("S1", 2000)),
    ]);
    let observer = Arc::new(CollectingObserver::default());
    let session = Session::new(config, Arc::new(recognizer), observer.clone()).unwrap();

    let source = MockAudioSource::new().with_chunks(chunks(2));
    session.start(source).await.unwrap();

    // Let segment 0 land before stopping
    tokio::time::sleep(Duration::from_millis(50)).await;

    let transcript = session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(transcript.contains(TRUNCATION_MARKER), "got: {}", transcript);
    assert!(transcript.starts_with("S0"), "got: {}", transcript);

    let events = observer.events.lock().unwrap();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, PipelineEvent::DrainTimedOut { .. }))
    );
}

#[tokio::test]
async fn stop_is_idempotent_and_returns_same_transcript() {
    let recognizer = ScriptedRecognizer::new([(key(0), Script::ok("only", 10))]);
    let session = Session::new(
        pipeline_config(),
        Arc::new(recognizer),
        Arc::new(NullObserver),
    )
    .unwrap();

    let source = MockAudioSource::new().with_chunks(chunks(1));
    session.start(source).await.unwrap();

    let first = session.stop().await.unwrap();
    let second = session.stop().await.unwrap();
    assert_eq!(first, "only");
    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stops_observe_the_same_terminal_transcript() {
    let recognizer = ScriptedRecognizer::new([
        (key(0), Script::ok("A", 50)),
        (key(1), Script::ok("B", 50)),
    ]);
    let session = Arc::new(
        Session::new(
            pipeline_config(),
            Arc::new(recognizer),
            Arc::new(NullObserver),
        )
        .unwrap(),
    );

    let source = MockAudioSource::new().with_chunks(chunks(2));
    session.start(source).await.unwrap();

    let s1 = session.clone();
    let s2 = session.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { s1.stop().await }),
        tokio::spawn(async move { s2.stop().await }),
    );
    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();

    assert_eq!(a, "A B");
    assert_eq!(a, b);
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn trailing_partial_below_minimum_is_dropped() {
    let recognizer = ScriptedRecognizer::new([(key(0), Script::ok("full", 0))]);
    let observer = Arc::new(CollectingObserver::default());
    let session =
        Session::new(pipeline_config(), Arc::new(recognizer), observer.clone()).unwrap();

    // One full segment plus a 25ms sliver (below the 50ms minimum)
    let mut input = chunks(1);
    input.push(vec![9000i16; 400]);
    let source = MockAudioSource::new().with_chunks(input);
    session.start(source).await.unwrap();

    let transcript = session.stop().await.unwrap();
    assert_eq!(transcript, "full");

    let events = observer.events.lock().unwrap();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, PipelineEvent::TrailingAudioDropped { duration_ms: 25 }))
    );
}

#[tokio::test]
async fn trailing_partial_above_minimum_is_transcribed() {
    let recognizer = ScriptedRecognizer::new([
        (key(0), Script::ok("full", 0)),
        (9000, Script::ok("tail", 0)),
    ]);
    let session = Session::new(
        pipeline_config(),
        Arc::new(recognizer),
        Arc::new(NullObserver),
    )
    .unwrap();

    // One full segment plus a 75ms tail (above the 50ms minimum)
    let mut input = chunks(1);
    input.push(vec![9000i16; 1200]);
    let source = MockAudioSource::new().with_chunks(input);
    session.start(source).await.unwrap();

    let transcript = session.stop().await.unwrap();
    assert_eq!(transcript, "full tail");
}

#[tokio::test]
async fn snapshot_during_recording_is_a_prefix_of_the_final_transcript() {
    let scripts: Vec<(i16, Script)> = (0..6)
        .map(|i| (key(i), Script::ok(&format!("P{}", i), 30)))
        .collect();
    let session = Session::new(
        pipeline_config(),
        Arc::new(ScriptedRecognizer::new(scripts)),
        Arc::new(NullObserver),
    )
    .unwrap();

    let source = MockAudioSource::new().with_chunks(chunks(6));
    session.start(source).await.unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;
    let mid = session.transcript();

    let final_transcript = session.stop().await.unwrap();
    assert!(
        final_transcript.starts_with(&mid),
        "mid {:?} is not a prefix of final {:?}",
        mid,
        final_transcript
    );
    assert_eq!(final_transcript, "P0 P1 P2 P3 P4 P5");
}

#[tokio::test]
async fn edit_after_stop_replaces_text_and_reset_clears_it() {
    let recognizer = ScriptedRecognizer::new([(key(0), Script::ok("raw words", 0))]);
    let session = Session::new(
        pipeline_config(),
        Arc::new(recognizer),
        Arc::new(NullObserver),
    )
    .unwrap();

    let source = MockAudioSource::new().with_chunks(chunks(1));
    session.start(source).await.unwrap();
    session.stop().await.unwrap();

    session.edit_transcript("Polished words.".to_string()).unwrap();
    assert_eq!(session.transcript(), "Polished words.");

    session.reset().unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.transcript(), "");
}

#[tokio::test]
async fn session_survives_two_recordings_with_reset_between() {
    let recognizer = ScriptedRecognizer::new([
        (key(0), Script::ok("first", 0)),
        (9000, Script::ok("second", 0)),
    ]);
    let session = Session::new(
        pipeline_config(),
        Arc::new(recognizer),
        Arc::new(NullObserver),
    )
    .unwrap();

    let source = MockAudioSource::new().with_chunks(chunks(1));
    session.start(source).await.unwrap();
    assert_eq!(session.stop().await.unwrap(), "first");

    session.reset().unwrap();

    let source = MockAudioSource::new().with_chunks(vec![vec![9000i16; SEGMENT_SAMPLES]]);
    session.start(source).await.unwrap();
    assert_eq!(session.stop().await.unwrap(), "second");
}

#[tokio::test]
async fn device_start_failure_leaves_session_idle() {
    let recognizer = ScriptedRecognizer::new(Vec::new());
    let session = Session::new(
        pipeline_config(),
        Arc::new(recognizer),
        Arc::new(NullObserver),
    )
    .unwrap();

    let source = MockAudioSource::new().with_start_failure();
    match session.start(source).await {
        Err(MeetscribeError::DeviceUnavailable { .. }) => {}
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Idle);

    // The session is still usable after the failed start
    let source = MockAudioSource::new().with_chunks(chunks(1));
    session.start(source).await.unwrap();
    session.stop().await.unwrap();
}

#[tokio::test]
async fn device_failure_mid_recording_is_reported_and_stop_still_drains() {
    let recognizer = ScriptedRecognizer::new([(key(0), Script::ok("partial", 0))]);
    let observer = Arc::new(CollectingObserver::default());
    let session =
        Session::new(pipeline_config(), Arc::new(recognizer), observer.clone()).unwrap();

    // The device delivers one segment, then errors on every later read
    let source = MockAudioSource::new()
        .with_chunks(chunks(2))
        .with_read_failure_after(1);
    session.start(source).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    // The failure reaches the observer while the session is still active,
    // so a frontend can tell the user capture has died
    {
        let events = observer.events.lock().unwrap();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PipelineEvent::CaptureFailed { .. })),
            "capture failure never reported: {:?}",
            events
        );
    }
    assert_eq!(session.state(), SessionState::Recording);

    // Audio captured before the failure still drains through stop
    let transcript = session.stop().await.unwrap();
    assert_eq!(transcript, "partial");
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn archived_audio_contains_the_full_recording() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = pipeline_config();
    config.session.archive_dir = Some(dir.path().to_path_buf());

    let recognizer = ScriptedRecognizer::new([
        (key(0), Script::ok("a", 0)),
        (key(1), Script::ok("b", 0)),
    ]);
    let session =
        Session::new(config, Arc::new(recognizer), Arc::new(NullObserver)).unwrap();

    let source = MockAudioSource::new().with_chunks(chunks(2));
    session.start(source).await.unwrap();
    session.stop().await.unwrap();

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1);

    let mut reader = hound::WavReader::open(&entries[0]).unwrap();
    assert_eq!(reader.spec().sample_rate, 16000);
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), SEGMENT_SAMPLES * 2);
    assert_eq!(samples[0], key(0));
    assert_eq!(samples[SEGMENT_SAMPLES], key(1));
}
