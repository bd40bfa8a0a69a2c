//! Correlation of shots and answers seen through a session channel,
//! including late, lost, and out-of-order delivery.

use std::sync::Arc;
use std::time::Duration;

use quizcam::bus::{EventBus, EventKind, MemoryBus};
use quizcam::correlation::{countdown_secs, Correlator, ShotEvent, MIN_RETAIN};
use quizcam::dispatch::{DispatchSettings, Dispatcher};
use quizcam::job::{Job, Session};
use quizcam::scoring::{AnswerKind, MockScorer};

fn shot_payload(session: &Session, job_id: &str, ts: i64) -> serde_json::Value {
    serde_json::json!({
        "sessionId": session.id().to_string(),
        "jobId": job_id,
        "ts": ts,
        "intervalSec": 10
    })
}

fn answer_payload(job_id: &str, answer: &str) -> serde_json::Value {
    serde_json::json!({
        "jobId": job_id,
        "kind": "MC",
        "answer": answer,
        "confidence": 0.9
    })
}

#[test]
fn test_viewer_tracks_pending_until_answer() {
    let bus = MemoryBus::new();
    let session = Session::new();
    let channel = session.channel();
    let viewer = Correlator::default();
    let _subscription = viewer.attach(&bus, &channel);

    bus.publish(&channel, EventKind::Shot, shot_payload(&session, "job-00000001", 1_000))
        .unwrap();
    bus.publish(&channel, EventKind::Shot, shot_payload(&session, "job-00000002", 2_000))
        .unwrap();
    assert_eq!(viewer.pending_count(), 2);
    assert_eq!(viewer.next_capture_in(2_000), Some(10));

    bus.publish(&channel, EventKind::Answer, answer_payload("job-00000001", "D"))
        .unwrap();
    let view = viewer.view();
    assert_eq!(view.pending.len(), 1);
    assert_eq!(view.pending[0].job_id, "job-00000002");
    assert_eq!(view.results.len(), 1);
    assert_eq!(view.results[0].label(), "D");
}

#[test]
fn test_answer_before_shot_is_logged_and_shot_stays_pending() {
    let bus = MemoryBus::new();
    let session = Session::new();
    let channel = session.channel();
    let viewer = Correlator::default();
    let _subscription = viewer.attach(&bus, &channel);

    bus.publish(&channel, EventKind::Answer, answer_payload("job-early01", "A"))
        .unwrap();
    bus.publish(&channel, EventKind::Shot, shot_payload(&session, "job-early01", 5))
        .unwrap();

    assert_eq!(viewer.result_count(), 1);
    assert!(viewer.is_pending("job-early01"));
}

#[test]
fn test_lost_answer_leaves_shot_pending() {
    // Every second publish is lost: the answer never arrives.
    let bus = MemoryBus::new().with_drop_every(2);
    let session = Session::new();
    let channel = session.channel();
    let viewer = Correlator::default();
    let _subscription = viewer.attach(&bus, &channel);

    bus.publish(&channel, EventKind::Shot, shot_payload(&session, "job-lost0001", 1))
        .unwrap();
    bus.publish(&channel, EventKind::Answer, answer_payload("job-lost0001", "B"))
        .unwrap();

    assert!(viewer.is_pending("job-lost0001"));
    assert_eq!(viewer.result_count(), 0);
}

#[test]
fn test_other_sessions_are_not_seen() {
    let bus = MemoryBus::new();
    let mine = Session::new();
    let theirs = Session::new();
    let viewer = Correlator::default();
    let _subscription = viewer.attach(&bus, &mine.channel());

    bus.publish(
        &theirs.channel(),
        EventKind::Shot,
        shot_payload(&theirs, "job-theirs01", 1),
    )
    .unwrap();
    assert_eq!(viewer.pending_count(), 0);
}

#[test]
fn test_dropping_subscription_stops_updates() {
    let bus = MemoryBus::new();
    let session = Session::new();
    let channel = session.channel();
    let viewer = Correlator::default();
    let subscription = viewer.attach(&bus, &channel);
    assert_eq!(bus.subscriber_count(&channel), 1);

    drop(subscription);
    assert_eq!(bus.subscriber_count(&channel), 0);
    bus.publish(&channel, EventKind::Shot, shot_payload(&session, "job-after001", 1))
        .unwrap();
    assert_eq!(viewer.pending_count(), 0);
}

#[test]
fn test_malformed_payloads_are_ignored() {
    let bus = MemoryBus::new();
    let session = Session::new();
    let channel = session.channel();
    let viewer = Correlator::default();
    let _subscription = viewer.attach(&bus, &channel);

    bus.publish(&channel, EventKind::Shot, serde_json::json!({"ts": "yesterday"}))
        .unwrap();
    bus.publish(&channel, EventKind::Answer, serde_json::json!("not an object"))
        .unwrap();
    bus.publish(
        &channel,
        EventKind::Answer,
        serde_json::json!({"answer": "B", "confidence": 7.0}),
    )
    .unwrap();

    assert_eq!(viewer.pending_count(), 0);
    assert_eq!(viewer.result_count(), 0);
}

#[test]
fn test_extreme_timestamps_do_not_break_countdown() {
    let bus = MemoryBus::new();
    let session = Session::new();
    let channel = session.channel();
    let viewer = Correlator::default();
    let _subscription = viewer.attach(&bus, &channel);
    let now = quizcam::job::now_millis();

    bus.publish(&channel, EventKind::Shot, shot_payload(&session, "job-farfutur", i64::MAX))
        .unwrap();
    assert_eq!(viewer.pending_count(), 1);
    let far = viewer.next_capture_in(now).unwrap();
    assert!(far > 1_000_000_000);
    assert_eq!(
        viewer.view().next_capture_in(i64::MIN),
        Some(i64::MAX.unsigned_abs().div_ceil(1000))
    );

    bus.publish(&channel, EventKind::Shot, shot_payload(&session, "job-farpast1", i64::MIN))
        .unwrap();
    assert_eq!(viewer.next_capture_in(now), Some(0));
    assert_eq!(viewer.next_capture_in(i64::MAX), Some(0));
}

#[test]
fn test_shots_breaking_announcement_rules_are_ignored() {
    let bus = MemoryBus::new();
    let session = Session::new();
    let channel = session.channel();
    let viewer = Correlator::default();
    let _subscription = viewer.attach(&bus, &channel);

    bus.publish(&channel, EventKind::Shot, shot_payload(&session, "short", 1))
        .unwrap();
    bus.publish(
        &channel,
        EventKind::Shot,
        serde_json::json!({"jobId": "job-nointv1", "ts": 1, "intervalSec": 0}),
    )
    .unwrap();

    assert_eq!(viewer.pending_count(), 0);
    assert_eq!(viewer.next_capture_in(0), None);
}

#[test]
fn test_result_log_is_bounded() {
    let viewer = Correlator::new(MIN_RETAIN);
    for n in 0..=MIN_RETAIN {
        viewer.record_failure(&format!("job-{:05}", n), "down");
    }
    let view = viewer.view();
    assert_eq!(view.results.len(), MIN_RETAIN);
    assert_eq!(view.results[0].job_id(), Some("job-00001"));
}

#[test]
fn test_countdown_follows_latest_shot() {
    let shot = ShotEvent {
        job_id: "job-count001".to_string(),
        captured_at_millis: 50_000,
        interval_seconds: 5,
    };
    let ticks: Vec<u64> = (0..=6).map(|s| countdown_secs(&shot, 50_000 + s * 1000)).collect();
    assert_eq!(ticks, vec![5, 4, 3, 2, 1, 0, 0]);
}

#[tokio::test]
async fn test_delayed_delivery_eventually_correlates() {
    let bus = MemoryBus::new().with_delay(Duration::from_millis(50));
    let session = Session::new();
    let viewer = Correlator::default();
    let _subscription = viewer.attach(&bus, &session.channel());

    let local = Correlator::default();
    let dispatcher = Dispatcher::start(
        DispatchSettings {
            session,
            interval_secs: 10,
            mode: AnswerKind::TrueFalse,
        },
        Arc::new(MockScorer::new()),
        Arc::new(bus.clone()),
        local.clone(),
    );

    let id = dispatcher.enqueue(Job::new(b"is the sky green".to_vec()));
    dispatcher.wait_idle().await;

    // The local view is updated immediately; the viewer lags behind the bus.
    assert_eq!(local.result_count(), 1);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while viewer.result_count() == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let view = viewer.view();
    assert_eq!(view.results.len(), 1);
    assert_eq!(view.results[0].job_id(), Some(id.to_string().as_str()));
    assert_eq!(view.last_shot.map(|s| s.job_id), Some(id.to_string()));

    let expected = MockScorer::verdict(b"is the sky green", AnswerKind::TrueFalse);
    assert_eq!(view.results[0].label(), expected.answer);
    // Delayed events may land in either order; the shot is pending only if
    // it arrived after the answer.
    assert!(view.pending.len() <= 1);
}
