//! End-to-end session flow tests
//!
//! Drives a playback session against the scriptable FakeEngine:
//! - Load sequencing and teardown ordering against the engine adapter
//! - Completion detection via position, finished flag, and polling
//! - Repeat-one restarts, queue exhaustion, and recovery from Ended
//! - Error state entry and navigation past broken tracks

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{
    create_test_tracks, drain_events, fast_tuning, wait_for_event, wait_for_state, wait_for_track,
    EngineCall, FakeEngine,
};
use maestro::events::{EventBus, SessionEvent};
use maestro::playback::PlaybackSession;
use maestro::{Command, SessionHandle, SessionState};

async fn start_session(track_count: usize) -> (SessionHandle, Arc<FakeEngine>, EventBus) {
    let engine = FakeEngine::new(60_000);
    let bus = EventBus::new(100);
    let session = PlaybackSession::spawn(engine.clone(), bus.clone(), fast_tuning());
    session
        .open(create_test_tracks(track_count), 0)
        .await
        .expect("open failed");
    (session, engine, bus)
}

#[tokio::test]
async fn test_load_sequence_orders_engine_calls() {
    let (_session, engine, _bus) = start_session(1).await;

    let calls = engine.calls().await;
    assert_eq!(
        calls,
        vec![
            EngineCall::Unload,
            EngineCall::Load("sim://1".to_string()),
            EngineCall::SetVolume(0.8),
            EngineCall::Play,
        ]
    );
}

#[tokio::test]
async fn test_end_position_advances_to_next_track() {
    let (session, engine, _bus) = start_session(3).await;

    // Report a position inside the end tolerance and push it
    engine.set_position(59_800).await;
    engine.push_current(false).await;

    wait_for_track(&session, "t2").await;
    assert_eq!(engine.loads().await, vec!["sim://1", "sim://2"]);
}

#[tokio::test]
async fn test_finished_flag_advances_even_mid_track() {
    let (session, engine, _bus) = start_session(2).await;

    engine.set_position(10_000).await;
    engine.push_current(true).await;

    wait_for_track(&session, "t2").await;
}

#[tokio::test]
async fn test_poll_detects_completion_without_pushes() {
    let (session, engine, _bus) = start_session(2).await;

    // No push at all; the next poll tick has to notice on its own
    engine.set_position(60_000).await;

    wait_for_track(&session, "t2").await;
}

#[tokio::test]
async fn test_duplicate_end_signals_cause_single_advance() {
    let (session, engine, _bus) = start_session(3).await;

    engine.push_end_of_track().await;
    engine.push_end_of_track().await;

    wait_for_track(&session, "t2").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.track.unwrap().id, "t2");
    assert_eq!(engine.loads().await, vec!["sim://1", "sim://2"]);
}

#[tokio::test]
async fn test_repeat_one_restarts_without_reload() {
    let (session, engine, _bus) = start_session(2).await;
    session.apply(Command::ToggleRepeat).await.unwrap();

    engine.push_end_of_track().await;

    // Restart means seek to zero and play again, not a fresh load
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !engine.calls().await.contains(&EngineCall::Seek(0)) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "no restart seek observed"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(engine.loads().await, vec!["sim://1"]);
    assert_eq!(
        session.snapshot().await.unwrap().state,
        SessionState::Playing
    );
    assert_eq!(
        session.snapshot().await.unwrap().track.unwrap().id,
        "t1"
    );
}

#[tokio::test]
async fn test_queue_exhaustion_enters_ended_and_unloads() {
    let (session, engine, mut rx) = {
        let (session, engine, bus) = start_session(2).await;
        let rx = bus.subscribe();
        (session, engine, rx)
    };

    session.apply(Command::Next).await.unwrap();
    engine.push_end_of_track().await;

    wait_for_state(&session, SessionState::Ended).await;
    assert!(!engine.status().await.is_loaded);
    assert_eq!(engine.calls().await.last(), Some(&EngineCall::Unload));

    let ended = wait_for_event(
        &mut rx,
        |e| matches!(e, SessionEvent::QueueEnded { .. }),
        "QueueEnded",
    )
    .await;
    match ended {
        SessionEvent::QueueEnded { track_id, .. } => assert_eq!(track_id, "t2"),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_ended_session_recovers_with_repeat_all_and_next() {
    let (session, engine, _bus) = start_session(2).await;

    session.apply(Command::Next).await.unwrap();
    engine.push_end_of_track().await;
    wait_for_state(&session, SessionState::Ended).await;

    // Off -> One -> All, then Next wraps to the front of the queue
    session.apply(Command::ToggleRepeat).await.unwrap();
    session.apply(Command::ToggleRepeat).await.unwrap();
    session.apply(Command::Next).await.unwrap();

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Playing);
    assert_eq!(snapshot.track.unwrap().id, "t1");
}

#[tokio::test]
async fn test_failed_advance_enters_error_and_next_skips_past() {
    let (session, engine, mut rx) = {
        let (session, engine, bus) = start_session(3).await;
        let rx = bus.subscribe();
        (session, engine, rx)
    };
    engine.fail_uri("sim://2").await;

    engine.push_end_of_track().await;
    wait_for_state(&session, SessionState::Error).await;

    let feedback = wait_for_event(
        &mut rx,
        |e| matches!(e, SessionEvent::Feedback { .. }),
        "load failure feedback",
    )
    .await;
    match feedback {
        SessionEvent::Feedback { message, .. } => assert_eq!(message, "Could not play Song 2"),
        other => panic!("unexpected event: {:?}", other),
    }

    session.apply(Command::Next).await.unwrap();
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Playing);
    assert_eq!(snapshot.track.unwrap().id, "t3");
}

#[tokio::test]
async fn test_seek_past_end_is_clamped_to_duration() {
    let (session, engine, _bus) = start_session(2).await;
    session.apply(Command::Pause).await.unwrap();

    session.apply(Command::SeekTo(999_999)).await.unwrap();
    assert!(engine.calls().await.contains(&EngineCall::Seek(60_000)));
}

#[tokio::test]
async fn test_progress_events_carry_engine_positions() {
    let (_session, engine, bus) = start_session(1).await;
    let mut rx = bus.subscribe();
    drain_events(&mut rx);

    engine.set_position(5_000).await;

    let progress = wait_for_event(
        &mut rx,
        |e| matches!(e, SessionEvent::Progress { position_ms: 5_000, .. }),
        "progress at 5000ms",
    )
    .await;
    match progress {
        SessionEvent::Progress {
            track_id,
            duration_ms,
            playing,
            ..
        } => {
            assert_eq!(track_id, "t1");
            assert_eq!(duration_ms, 60_000);
            assert!(playing);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_shuffled_queue_plays_every_track_exactly_once() {
    let engine = FakeEngine::new(60_000);
    let bus = EventBus::new(100);
    let mut rx = bus.subscribe();
    let session = PlaybackSession::spawn(engine.clone(), bus.clone(), fast_tuning());
    session.open(create_test_tracks(4), 0).await.unwrap();

    session.apply(Command::ToggleShuffle).await.unwrap();

    let mut started = Vec::new();
    let first = wait_for_event(
        &mut rx,
        |e| matches!(e, SessionEvent::TrackStarted { .. }),
        "first track",
    )
    .await;
    if let SessionEvent::TrackStarted { track, .. } = first {
        started.push(track.id);
    }

    for _ in 0..3 {
        engine.push_end_of_track().await;
        let event = wait_for_event(
            &mut rx,
            |e| matches!(e, SessionEvent::TrackStarted { .. }),
            "next shuffled track",
        )
        .await;
        if let SessionEvent::TrackStarted { track, .. } = event {
            started.push(track.id);
        }
    }

    engine.push_end_of_track().await;
    wait_for_state(&session, SessionState::Ended).await;

    // Anchored bijection: four starts, no repeats, nothing skipped
    assert_eq!(started.len(), 4);
    started.sort();
    started.dedup();
    assert_eq!(started, vec!["t1", "t2", "t3", "t4"]);
}

#[tokio::test]
async fn test_concurrent_commands_are_both_applied() {
    let (session, _engine, _bus) = start_session(3).await;

    let s1 = session.clone();
    let s2 = session.clone();
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { s1.apply(Command::Next).await }),
        tokio::spawn(async move { s2.apply(Command::Next).await }),
    );
    r1.unwrap().unwrap();
    r2.unwrap().unwrap();

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.track.unwrap().id, "t3");
}

#[tokio::test]
async fn test_dropping_all_handles_unloads_engine() {
    let (session, engine, _bus) = start_session(1).await;
    assert!(engine.status().await.is_loaded);

    drop(session);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(engine.calls().await.last(), Some(&EngineCall::Unload));
    assert!(!engine.status().await.is_loaded);
}

#[tokio::test]
async fn test_close_after_error_still_unloads() {
    let (session, engine, _bus) = start_session(2).await;
    engine.fail_uri("sim://2").await;
    session.apply(Command::Next).await.unwrap();
    wait_for_state(&session, SessionState::Error).await;

    session.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.calls().await.last(), Some(&EngineCall::Unload));
}
