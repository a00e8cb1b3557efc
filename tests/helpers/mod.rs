//! Test helpers for maestro integration tests
//!
//! Provides reusable test infrastructure:
//! - FakeEngine: scriptable engine adapter that records every call
//! - ScriptedPipeline / RecordingSpeech: voice collaborators
//! - Snapshot and event polling utilities with deadlines

// Each test binary compiles its own copy and uses a different subset
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use maestro::config::Tuning;
use maestro::engine::{AudioEngine, EngineError, EngineStatus, StatusUpdate};
use maestro::events::SessionEvent;
use maestro::input::{SpeechSynthesizer, VoiceError, VoicePipeline};
use maestro::playback::session::SessionSnapshot;
use maestro::playback::{SessionHandle, SessionState, Track};

/// Engine calls recorded by [`FakeEngine`], in order
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load(String),
    Play,
    Pause,
    Seek(u64),
    SetVolume(f32),
    Unload,
}

/// Scriptable engine adapter
///
/// Unlike the simulator, positions never move on their own: tests set the
/// reported status explicitly and push updates when they choose, which
/// makes completion timing deterministic.
pub struct FakeEngine {
    default_duration_ms: u64,
    calls: Mutex<Vec<EngineCall>>,
    status: Mutex<EngineStatus>,
    failing: Mutex<HashSet<String>>,
    tx: broadcast::Sender<StatusUpdate>,
}

impl FakeEngine {
    pub fn new(default_duration_ms: u64) -> Arc<Self> {
        let (tx, _) = broadcast::channel(32);
        Arc::new(Self {
            default_duration_ms,
            calls: Mutex::new(Vec::new()),
            status: Mutex::new(EngineStatus::unloaded()),
            failing: Mutex::new(HashSet::new()),
            tx,
        })
    }

    /// Make subsequent loads of this URI fail
    pub async fn fail_uri(&self, uri: &str) {
        self.failing.lock().await.insert(uri.to_string());
    }

    /// Everything the session asked the engine to do, in order
    pub async fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().await.clone()
    }

    /// Just the loaded URIs, in order
    pub async fn loads(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                EngineCall::Load(uri) => Some(uri.clone()),
                _ => None,
            })
            .collect()
    }

    /// Overwrite the reported playback position
    pub async fn set_position(&self, position_ms: u64) {
        self.status.lock().await.position_ms = position_ms;
    }

    /// Current reported status
    pub async fn status(&self) -> EngineStatus {
        *self.status.lock().await
    }

    /// Push one status update through the push channel
    pub fn push(&self, status: EngineStatus, finished: bool) {
        let _ = self.tx.send(StatusUpdate { status, finished });
    }

    /// Push the stored status, optionally flagged as finished
    pub async fn push_current(&self, finished: bool) {
        let status = *self.status.lock().await;
        self.push(status, finished);
    }

    /// Set position to the end of the media and push the update
    pub async fn push_end_of_track(&self) {
        let status = {
            let mut status = self.status.lock().await;
            status.position_ms = status.duration_ms;
            *status
        };
        self.push(status, false);
    }

    async fn record(&self, call: EngineCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn load(&self, uri: &str) -> Result<(), EngineError> {
        self.record(EngineCall::Load(uri.to_string())).await;
        if self.failing.lock().await.contains(uri) {
            return Err(EngineError::Unplayable(format!("Cannot open {}", uri)));
        }
        *self.status.lock().await = EngineStatus {
            position_ms: 0,
            duration_ms: self.default_duration_ms,
            is_playing: false,
            is_loaded: true,
        };
        Ok(())
    }

    async fn play(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Play).await;
        self.status.lock().await.is_playing = true;
        Ok(())
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Pause).await;
        self.status.lock().await.is_playing = false;
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<(), EngineError> {
        self.record(EngineCall::Seek(position_ms)).await;
        let mut status = self.status.lock().await;
        status.position_ms = position_ms.min(status.duration_ms);
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<(), EngineError> {
        self.record(EngineCall::SetVolume(volume)).await;
        Ok(())
    }

    async fn get_status(&self) -> EngineStatus {
        *self.status.lock().await
    }

    fn status_updates(&self) -> broadcast::Receiver<StatusUpdate> {
        self.tx.subscribe()
    }

    async fn unload(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Unload).await;
        *self.status.lock().await = EngineStatus::unloaded();
        Ok(())
    }
}

/// Voice pipeline that replays scripted capture results
pub struct ScriptedPipeline {
    deny_permission: bool,
    transcripts: Mutex<VecDeque<Result<String, VoiceError>>>,
}

impl ScriptedPipeline {
    pub fn with_transcript(text: &str) -> Arc<Self> {
        Self::with_results(vec![Ok(text.to_string())])
    }

    pub fn with_results(results: Vec<Result<String, VoiceError>>) -> Arc<Self> {
        Arc::new(Self {
            deny_permission: false,
            transcripts: Mutex::new(results.into()),
        })
    }

    /// A pipeline whose every capture attempt is denied by the platform
    pub fn denied() -> Arc<Self> {
        Arc::new(Self {
            deny_permission: true,
            transcripts: Mutex::new(VecDeque::new()),
        })
    }
}

#[async_trait]
impl VoicePipeline for ScriptedPipeline {
    async fn start_capture(&self) -> Result<(), VoiceError> {
        if self.deny_permission {
            return Err(VoiceError::PermissionDenied);
        }
        Ok(())
    }

    async fn finish_capture(&self) -> Result<String, VoiceError> {
        match self.transcripts.lock().await.pop_front() {
            Some(result) => result,
            None => Err(VoiceError::Transcription("no transcript queued".to_string())),
        }
    }
}

/// Synthesizer that records what it was asked to say
#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn spoken(&self) -> Vec<String> {
        self.spoken.lock().await.clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSpeech {
    async fn speak(&self, text: &str) {
        self.spoken.lock().await.push(text.to_string());
    }
}

/// Tracks named t1..tn with sim:// URIs
pub fn create_test_tracks(n: usize) -> Vec<Track> {
    (1..=n)
        .map(|i| Track {
            id: format!("t{}", i),
            uri: format!("sim://{}", i),
            name: format!("Song {}", i),
            artist_name: "Tester".to_string(),
            album_image_uri: None,
        })
        .collect()
}

/// Tuning with every window shrunk for test runtimes
pub fn fast_tuning() -> Tuning {
    Tuning {
        poll_interval_ms: 25,
        completion_tolerance_ms: 250,
        completion_holdoff_ms: 300,
        gesture_sample_interval_ms: 20,
        gesture_min_gap_ms: 60,
        voice_capture_window_ms: 10,
        voice_timeout_ms: 500,
        ..Tuning::default()
    }
}

/// Poll snapshots until the predicate passes or two seconds elapse
pub async fn wait_for<F>(session: &SessionHandle, predicate: F, what: &str) -> SessionSnapshot
where
    F: Fn(&SessionSnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let snapshot = session
            .snapshot()
            .await
            .unwrap_or_else(|_| panic!("session closed while waiting for {}", what));
        if predicate(&snapshot) {
            return snapshot;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "Timed out waiting for {} (state {:?}, track {:?})",
                what,
                snapshot.state,
                snapshot.track.map(|t| t.id)
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_state(session: &SessionHandle, state: SessionState) -> SessionSnapshot {
    wait_for(session, |s| s.state == state, &format!("state {:?}", state)).await
}

pub async fn wait_for_track(session: &SessionHandle, id: &str) -> SessionSnapshot {
    wait_for(
        session,
        |s| s.track.as_ref().map(|t| t.id.as_str()) == Some(id),
        &format!("track {}", id),
    )
    .await
}

/// Receive events until one matches, with a two second deadline
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<SessionEvent>,
    mut predicate: F,
    what: &str,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if predicate(&event) {
                        return event;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("event bus closed while waiting for {}", what)
                }
            }
        }
    })
    .await;

    match result {
        Ok(event) => event,
        Err(_) => panic!("Timed out waiting for event: {}", what),
    }
}

/// Everything currently buffered in the receiver
pub fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
