// Session registry lifecycle: idempotent start, stop semantics, buffer reads,
// push events, late advisory results for stopped sessions.

mod common;

use common::*;
use livecoach::session::{PushEvent, SessionOptions};
use livecoach::transcript::ConnectionStatus;
use std::time::Duration;
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn start_session_is_idempotent() {
    let source = FakeSource::new();
    let advisor = FakeAdvisor::silent();
    let registry = make_registry(&source, &advisor, quiet_supervisor(), test_limits());

    let (first_id, first_created) = registry.start_session("t1", SessionOptions::default()).await;
    let (second_id, second_created) = registry.start_session("t1", SessionOptions::default()).await;

    assert_eq!(first_id, second_id);
    assert!(first_created);
    assert!(!second_created, "repeat start must not create a second session");
    assert_eq!(registry.session_count().await, 1);

    // Give the first (and only) supervisor time to open its subscription.
    stream_sender(&source).await;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(
        source.subscription_count(),
        1,
        "exactly one connection for a doubly-started session"
    );
}

#[tokio::test]
async fn sessions_for_different_transcripts_are_independent() {
    let source = FakeSource::new();
    let advisor = FakeAdvisor::silent();
    let registry = make_registry(&source, &advisor, quiet_supervisor(), test_limits());

    let (id1, _) = registry.start_session("t1", SessionOptions::default()).await;
    let (id2, _) = registry.start_session("t2", SessionOptions::default()).await;

    assert_ne!(id1, id2);
    assert_eq!(registry.session_count().await, 2);
}

#[tokio::test]
async fn stop_unknown_session_reports_not_found() {
    let source = FakeSource::new();
    let advisor = FakeAdvisor::silent();
    let registry = make_registry(&source, &advisor, quiet_supervisor(), test_limits());

    assert!(!registry.stop_session("session_nope").await);
}

#[tokio::test]
async fn stopped_session_disappears_immediately() {
    let source = FakeSource::new();
    let advisor = FakeAdvisor::silent();
    let registry = make_registry(&source, &advisor, quiet_supervisor(), test_limits());

    let (session_id, _) = registry.start_session("t1", SessionOptions::default()).await;
    assert!(registry.stop_session(&session_id).await);

    assert!(registry.read_since(&session_id, None).await.is_none());
    assert!(registry.get(&session_id).await.is_none());
    assert!(!registry.stop_session(&session_id).await, "second stop is not found");
}

#[tokio::test]
async fn segments_flow_into_buffers_with_speaker_default() {
    let source = FakeSource::new();
    let advisor = FakeAdvisor::silent();
    let registry = make_registry(&source, &advisor, quiet_supervisor(), test_limits());

    let (session_id, _) = registry.start_session("t1", SessionOptions::default()).await;
    let tx = stream_sender(&source).await;

    tx.send(chunk_from("c1", None, "  who said this  ")).await.unwrap();
    tx.send(chunk_from("c2", Some("Candidate"), "   ")).await.unwrap(); // dropped
    tx.send(chunk_from("c3", Some("Candidate"), "a real answer")).await.unwrap();
    sleep(Duration::from_millis(200)).await;

    let readout = registry.read_since(&session_id, None).await.unwrap();
    assert_eq!(readout.segments.len(), 2, "blank segment never enters a buffer");
    assert_eq!(readout.segments[0].speaker, "Unknown");
    assert_eq!(readout.segments[0].text, "who said this");
    assert_eq!(readout.segments[1].text, "a real answer");
}

#[tokio::test]
async fn duplicate_chunks_reach_state_once() {
    let source = FakeSource::new();
    let advisor = FakeAdvisor::silent();
    let registry = make_registry(&source, &advisor, quiet_supervisor(), test_limits());

    let (session_id, _) = registry.start_session("t1", SessionOptions::default()).await;
    let tx = stream_sender(&source).await;

    tx.send(chunk("c1", "Candidate", "same words")).await.unwrap();
    tx.send(chunk("c1", "Candidate", "same words")).await.unwrap();
    tx.send(chunk("c1", "Candidate", "same words, revised")).await.unwrap();
    sleep(Duration::from_millis(200)).await;

    let readout = registry.read_since(&session_id, None).await.unwrap();
    assert_eq!(readout.segments.len(), 2, "identical id+text delivered once");
}

#[tokio::test]
async fn read_since_watermark_filters_older_events() {
    let source = FakeSource::new();
    let advisor = FakeAdvisor::silent();
    let registry = make_registry(&source, &advisor, quiet_supervisor(), test_limits());

    let (session_id, _) = registry.start_session("t1", SessionOptions::default()).await;
    let tx = stream_sender(&source).await;

    tx.send(chunk("c1", "Recruiter", "first remark")).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    tx.send(chunk("c2", "Candidate", "second remark")).await.unwrap();
    sleep(Duration::from_millis(200)).await;

    let all = registry.read_since(&session_id, None).await.unwrap();
    assert_eq!(all.segments.len(), 2);

    let watermark = all.segments[0].received_at;
    let newer = registry.read_since(&session_id, Some(watermark)).await.unwrap();
    assert_eq!(newer.segments.len(), 1);
    assert_eq!(newer.segments[0].text, "second remark");
}

#[tokio::test]
async fn push_channel_carries_segments_and_status() {
    let source = FakeSource::new();
    let advisor = FakeAdvisor::silent();
    let registry = make_registry(&source, &advisor, quiet_supervisor(), test_limits());

    let (session_id, _) = registry.start_session("t1", SessionOptions::default()).await;
    let session = registry.get(&session_id).await.unwrap();
    let mut events = session.subscribe();

    let tx = stream_sender(&source).await;
    tx.send(chunk("c1", "Candidate", "pushed downstream")).await.unwrap();

    let event = timeout(Duration::from_secs(1), async {
        loop {
            match events.recv().await.unwrap() {
                PushEvent::Segment(segment) => return segment,
                _ => continue,
            }
        }
    })
    .await
    .expect("no segment pushed");
    assert_eq!(event.text, "pushed downstream");
}

#[tokio::test]
async fn late_hint_for_stopped_session_is_discarded() {
    let source = FakeSource::new();
    let advisor = FakeAdvisor::replying("a hint that must never surface");
    advisor.set_delay(Duration::from_millis(300));
    let registry = make_registry(&source, &advisor, quiet_supervisor(), test_limits());

    let (session_id, _) = registry.start_session("t1", SessionOptions::default()).await;
    let session = registry.get(&session_id).await.unwrap();
    let mut events = session.subscribe();

    let tx = stream_sender(&source).await;
    tx.send(chunk("c1", "Candidate", "a remark long enough to trigger the advisor"))
        .await
        .unwrap();

    // Stop while the advisory call is still in flight.
    sleep(Duration::from_millis(100)).await;
    assert!(registry.stop_session(&session_id).await);
    assert_eq!(advisor.call_count(), 1);

    // Drain the push channel for long enough that a late hint would show up.
    let got_hint = timeout(Duration::from_millis(600), async {
        loop {
            match events.recv().await {
                Ok(PushEvent::Hint(_)) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(!got_hint, "a stopped session's in-flight result is discarded");
}

#[tokio::test]
async fn shutdown_closes_every_session() {
    let source = FakeSource::new();
    let advisor = FakeAdvisor::silent();
    let registry = make_registry(&source, &advisor, quiet_supervisor(), test_limits());

    registry.start_session("t1", SessionOptions::default()).await;
    registry.start_session("t2", SessionOptions::default()).await;
    assert_eq!(registry.session_count().await, 2);

    registry.shutdown().await;
    assert_eq!(registry.session_count().await, 0);
}

#[test]
fn push_events_serialize_with_kind_tag() {
    let event = PushEvent::Status {
        status: ConnectionStatus::Listening,
    };
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"kind\":\"status\""));
    assert!(json.contains("\"listening\""));

    let event = PushEvent::Hint(livecoach::session::HintEvent {
        hint: "ask about testing".to_string(),
        timestamp: chrono::Utc::now(),
    });
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"kind\":\"hint\""));
    assert!(json.contains("ask about testing"));
}
