//! Session manager lifecycle tests against a scripted backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockBackend, StreamOutcome};
use mimic_bot::ai::manager::{SessionManager, SessionState};
use mimic_bot::ai::types::StreamChunk;
use mimic_bot::persona::{Persona, PersonaSource};
use mimic_bot::streamer::{ResponseStreamer, NO_RESPONSE_PLACEHOLDER};

fn manager(backend: Arc<MockBackend>) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        backend,
        PersonaSource::Fixed(Persona::from_parts("Test", "half one", "half two")),
    ))
}

/// Drain one response stream, returning every chunk it yielded.
async fn drain(manager: &Arc<SessionManager>, prompt: &str) -> Vec<StreamChunk> {
    let mut rx = Arc::clone(manager).response_stream(prompt.to_string());
    let mut chunks = Vec::new();
    while let Some(chunk) = rx.recv().await {
        chunks.push(chunk);
    }
    chunks
}

#[tokio::test]
async fn chunks_are_relayed_in_arrival_order() {
    let backend = MockBackend::new();
    backend.push(StreamOutcome::Chunks(vec![
        StreamChunk::text("He"),
        StreamChunk::text("Hello"),
        StreamChunk::text("Hello there"),
    ]));

    let m = manager(backend.clone());
    assert!(m.start_session().await);
    assert_eq!(m.state(), SessionState::Live);

    let chunks = drain(&m, "hi").await;
    let texts: Vec<&str> = chunks.iter().map(|c| c.message.as_str()).collect();
    assert_eq!(texts, vec!["He", "Hello", "Hello there"]);
    assert_eq!(m.error_count(), 0);
}

#[tokio::test]
async fn three_consecutive_failures_trigger_exactly_one_restart() {
    let backend = MockBackend::new();
    for _ in 0..3 {
        backend.push(StreamOutcome::FailOpen);
    }

    let m = manager(backend.clone());
    assert!(m.start_session().await);
    assert_eq!(backend.creates(), 1);

    for i in 1..=3 {
        let chunks = drain(&m, "hi").await;
        assert_eq!(chunks.len(), 1, "failure {i} should yield one error chunk");
        assert!(chunks[0].is_error());
    }

    // Initial create plus the single automatic restart at the threshold.
    assert_eq!(backend.creates(), 2);
    // The successful restart reset the counter.
    assert_eq!(m.error_count(), 0);
    assert_eq!(m.state(), SessionState::Live);
}

#[tokio::test]
async fn success_between_failures_prevents_restart() {
    let backend = MockBackend::new();
    backend.push(StreamOutcome::FailOpen);
    backend.push(StreamOutcome::FailOpen);
    backend.push(StreamOutcome::Chunks(vec![StreamChunk::text("fine")]));
    backend.push(StreamOutcome::FailOpen);

    let m = manager(backend.clone());
    assert!(m.start_session().await);

    drain(&m, "1").await;
    drain(&m, "2").await;
    assert_eq!(m.error_count(), 2);

    let ok = drain(&m, "3").await;
    assert!(!ok[0].is_error());
    assert_eq!(m.error_count(), 0);

    drain(&m, "4").await;
    assert_eq!(m.error_count(), 1);

    // Never reached the threshold, so only the initial create happened.
    assert_eq!(backend.creates(), 1);
}

#[tokio::test]
async fn mid_stream_failure_surfaces_partial_chunks_then_error() {
    let backend = MockBackend::new();
    backend.push(StreamOutcome::FailAfter(vec![
        StreamChunk::text("part"),
        StreamChunk::text("partial answ"),
    ]));

    let m = manager(backend.clone());
    assert!(m.start_session().await);

    let chunks = drain(&m, "hi").await;
    assert_eq!(chunks.len(), 3);
    assert!(!chunks[0].is_error());
    assert!(!chunks[1].is_error());
    assert!(chunks[2].is_error());
    assert_eq!(m.error_count(), 1);
}

#[tokio::test]
async fn empty_stream_finalizes_to_placeholder() {
    let backend = MockBackend::new();
    backend.push(StreamOutcome::Chunks(Vec::new()));

    let m = manager(backend.clone());
    assert!(m.start_session().await);

    let mut rx = Arc::clone(&m).response_stream("hi".to_string());
    let streamer = ResponseStreamer::new(Duration::from_millis(700), 1000, "refusal");
    let mut last = None;
    while let Some(chunk) = rx.recv().await {
        last = Some(chunk);
    }

    let finalized = streamer.finalize(last.as_ref());
    assert_eq!(finalized.content, NO_RESPONSE_PLACEHOLDER);
}

#[tokio::test]
async fn failed_restart_yields_error_chunk_then_recovers_lazily() {
    let backend = MockBackend::new();
    backend.set_fail_creates(true);

    let m = manager(backend.clone());
    assert!(!m.start_session().await);
    assert_eq!(m.state(), SessionState::Failed);

    // No handle: the lazy inline restart fails and the stream carries a
    // single error chunk.
    let chunks = drain(&m, "hi").await;
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].is_error());

    // Backend comes back; the next request restarts lazily and succeeds.
    backend.set_fail_creates(false);
    backend.push(StreamOutcome::Chunks(vec![StreamChunk::text("back")]));

    let chunks = drain(&m, "hi").await;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].message, "back");
    assert_eq!(m.state(), SessionState::Live);
}

#[tokio::test]
async fn restart_with_no_stream_active_ends_live_or_failed() {
    let backend = MockBackend::new();
    let m = manager(backend.clone());

    assert!(m.restart_session().await);
    assert_eq!(m.state(), SessionState::Live);

    backend.set_fail_creates(true);
    assert!(!m.restart_session().await);
    assert_eq!(m.state(), SessionState::Failed);

    backend.set_fail_creates(false);
    assert!(m.restart_session().await);
    assert_eq!(m.state(), SessionState::Live);
}

#[tokio::test]
async fn restart_resets_both_health_counters() {
    let backend = MockBackend::new();
    backend.push(StreamOutcome::FailOpen);

    let m = manager(backend.clone());
    assert!(m.start_session().await);

    drain(&m, "boom").await;
    m.record_refusal();
    assert_eq!(m.error_count(), 1);
    assert_eq!(m.refusal_count(), 1);

    assert!(m.restart_session().await);
    assert_eq!(m.error_count(), 0);
    assert_eq!(m.refusal_count(), 0);
}

#[tokio::test]
async fn concurrent_requests_serialize_on_the_session() {
    let backend = MockBackend::new();
    backend.push(StreamOutcome::Chunks(vec![StreamChunk::text("first")]));
    backend.push(StreamOutcome::Chunks(vec![StreamChunk::text("second")]));

    let m = manager(backend.clone());
    assert!(m.start_session().await);

    let m1 = Arc::clone(&m);
    let m2 = Arc::clone(&m);
    let (a, b) = tokio::join!(
        async move { drain(&m1, "one").await },
        async move { drain(&m2, "two").await },
    );

    // Both exchanges completed intact; the lock kept them whole.
    let mut texts = vec![a[0].message.clone(), b[0].message.clone()];
    texts.sort();
    assert_eq!(texts, vec!["first", "second"]);
}
