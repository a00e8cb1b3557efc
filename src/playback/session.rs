//! Playback session state machine
//!
//! All mutable session state lives inside one task. Requests arrive over an
//! mpsc channel and are applied one at a time in arrival order; engine
//! status observations (pushed and polled) interleave between requests,
//! never during one. Commands issued while an earlier command is still
//! being applied wait in the channel rather than being dropped.
//!
//! The task owns the engine adapter for its lifetime: every track change
//! releases the previous engine resource before loading the next, and every
//! exit path unloads whatever is still held.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Tuning;
use crate::engine::{AudioEngine, EngineError, EngineStatus, StatusUpdate};
use crate::error::{Error, Result};
use crate::events::{EventBus, SessionEvent};
use crate::input::Command;
use crate::playback::completion::CompletionDetector;
use crate::playback::queue::{CompletionAdvance, PlayQueue, RepeatMode, Track};

/// Lifecycle state of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No queue open
    Idle,
    /// A load was requested and has not resolved yet
    Loading,
    /// The engine is playing the current track
    Playing,
    /// A track is loaded and paused
    Paused,
    /// The queue played out with repeat off; the engine holds nothing
    Ended,
    /// The most recent load failed; navigation can move past it
    Error,
}

/// Point-in-time view of the session, for shells and tests
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Current track, None while no queue is open
    pub track: Option<Track>,
    /// Queue index of the current track
    pub queue_index: Option<usize>,
    pub queue_len: usize,
    pub shuffled: bool,
    pub repeat: RepeatMode,
    pub volume: f32,
    /// Position from the most recent engine observation
    pub position_ms: u64,
    /// Duration from the most recent engine observation
    pub duration_ms: u64,
}

enum SessionRequest {
    Open {
        tracks: Vec<Track>,
        start_index: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    Apply {
        command: Command,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle for driving a playback session task
///
/// Cheap to clone; all clones address the same task. Methods resolve once
/// the session has fully applied the request, so a caller that awaits
/// `apply` observes its own command's effects in the next `snapshot`.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
}

impl SessionHandle {
    /// Open a queue and start playing at `start_index`
    ///
    /// Replaces any queue already open. Returns an error for an empty track
    /// list or an out-of-bounds start index, leaving existing state alone.
    /// A queue that opens but whose first track fails to load reports `Ok`
    /// and moves the session to [`SessionState::Error`].
    pub async fn open(&self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Open {
                tracks,
                start_index,
                reply,
            })
            .await
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Apply one normalized command
    pub async fn apply(&self, command: Command) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Apply { command, reply })
            .await
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Current session state
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Snapshot { reply })
            .await
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    /// Stop the session task, unloading whatever the engine holds
    ///
    /// Closing an already closed session is a no-op.
    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SessionRequest::Close { reply }).await.is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }
}

/// The session task: queue, state, completion detection, engine ownership
pub struct PlaybackSession {
    engine: Arc<dyn AudioEngine>,
    bus: EventBus,
    rx: mpsc::Receiver<SessionRequest>,

    state: SessionState,
    queue: Option<PlayQueue>,
    volume: f32,
    last_status: EngineStatus,
    detector: CompletionDetector,

    push_rx: broadcast::Receiver<StatusUpdate>,
    /// Cleared when the push channel closes so the loop stops polling it
    push_open: bool,
    poll: Interval,
}

impl PlaybackSession {
    /// Requests queued during a busy window before senders start waiting
    const REQUEST_CAPACITY: usize = 32;

    /// Start a session task and return its handle
    pub fn spawn(engine: Arc<dyn AudioEngine>, bus: EventBus, tuning: Tuning) -> SessionHandle {
        let (tx, rx) = mpsc::channel(Self::REQUEST_CAPACITY);

        let push_rx = engine.status_updates();
        let mut poll = interval(tuning.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let session = Self {
            engine,
            bus,
            rx,
            state: SessionState::Idle,
            queue: None,
            volume: tuning.initial_volume.clamp(0.0, 1.0),
            last_status: EngineStatus::unloaded(),
            detector: CompletionDetector::new(
                tuning.completion_tolerance_ms,
                tuning.completion_holdoff(),
            ),
            push_rx,
            push_open: true,
            poll,
        };

        tokio::spawn(session.run());
        SessionHandle { tx }
    }

    async fn run(mut self) {
        info!("Playback session started");

        loop {
            tokio::select! {
                request = self.rx.recv() => match request {
                    Some(request) => {
                        if !self.handle_request(request).await {
                            break;
                        }
                    }
                    None => {
                        debug!("All session handles dropped");
                        break;
                    }
                },
                update = self.push_rx.recv(), if self.push_open => match update {
                    Ok(update) => self.observe(update.status, update.finished).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Status updates lagged, {} skipped", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Status push channel closed, polling only");
                        self.push_open = false;
                    }
                },
                _ = self.poll.tick() => {
                    if self.state == SessionState::Playing || self.state == SessionState::Paused {
                        let status = self.engine.get_status().await;
                        self.observe(status, false).await;
                    }
                }
            }
        }

        self.teardown().await;
        info!("Playback session stopped");
    }

    /// Apply one request; returns false when the session should stop
    async fn handle_request(&mut self, request: SessionRequest) -> bool {
        match request {
            SessionRequest::Open {
                tracks,
                start_index,
                reply,
            } => {
                let _ = reply.send(self.open_queue(tracks, start_index).await);
                true
            }
            SessionRequest::Apply { command, reply } => {
                let _ = reply.send(self.apply(command).await);
                true
            }
            SessionRequest::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
                true
            }
            SessionRequest::Close { reply } => {
                info!("Close command received");
                let _ = reply.send(());
                false
            }
        }
    }

    async fn open_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        info!(
            "Open command received: {} tracks, starting at {}",
            tracks.len(),
            start_index
        );

        let mut queue = PlayQueue::new(tracks, start_index)?;
        // Repeat mode and volume are user settings that outlive the queue;
        // the play order does not.
        if let Some(previous) = &self.queue {
            queue.set_repeat(previous.repeat_mode());
        }

        self.bus.emit_lossy(SessionEvent::QueueOpened {
            length: queue.len(),
            start_index,
            timestamp: chrono::Utc::now(),
        });

        self.queue = Some(queue);
        self.load_current().await;
        Ok(())
    }

    async fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::TogglePlay => self.toggle_play().await,
            Command::Pause => self.pause().await,
            Command::Next => self.next().await,
            Command::Previous => self.previous().await,
            Command::Restart => self.restart().await,
            Command::SeekTo(position_ms) => self.seek_to(position_ms).await,
            Command::AdjustVolume(delta) => self.change_volume(self.volume + delta).await,
            Command::SetVolume(volume) => self.change_volume(volume).await,
            Command::ToggleShuffle => self.toggle_shuffle(),
            Command::ToggleRepeat => self.toggle_repeat(),
            Command::Unrecognized => {
                debug!("Unrecognized command, nothing to apply");
                Ok(())
            }
        }
    }

    async fn toggle_play(&mut self) -> Result<()> {
        info!("Toggle play command received");
        match self.state {
            SessionState::Playing => {
                self.engine.pause().await?;
                self.set_state(SessionState::Paused);
                Ok(())
            }
            SessionState::Paused => {
                self.engine.play().await?;
                self.set_state(SessionState::Playing);
                Ok(())
            }
            _ => {
                debug!("Toggle play ignored in {:?}", self.state);
                Ok(())
            }
        }
    }

    async fn pause(&mut self) -> Result<()> {
        info!("Pause command received");
        if self.state == SessionState::Playing {
            self.engine.pause().await?;
            self.set_state(SessionState::Paused);
        } else {
            debug!("Pause ignored in {:?}", self.state);
        }
        Ok(())
    }

    async fn next(&mut self) -> Result<()> {
        info!("Next command received");
        let advanced = match self.queue.as_mut() {
            Some(queue) => queue.advance_next(),
            None => {
                debug!("Next ignored with no queue open");
                return Ok(());
            }
        };

        match advanced {
            Some(index) => {
                debug!("Advancing to queue index {}", index);
                self.load_current().await;
            }
            None => debug!("Next at the queue edge with repeat off"),
        }
        Ok(())
    }

    async fn previous(&mut self) -> Result<()> {
        info!("Previous command received");
        let moved = match self.queue.as_mut() {
            Some(queue) => queue.advance_previous(),
            None => {
                debug!("Previous ignored with no queue open");
                return Ok(());
            }
        };

        match moved {
            Some(index) => {
                debug!("Moving back to queue index {}", index);
                self.load_current().await;
            }
            None => debug!("Previous at the queue edge with repeat off"),
        }
        Ok(())
    }

    async fn restart(&mut self) -> Result<()> {
        info!("Restart command received");
        match self.state {
            SessionState::Playing | SessionState::Paused => {
                self.engine.seek(0).await?;
                self.engine.play().await?;
                self.set_state(SessionState::Playing);
                Ok(())
            }
            _ => {
                debug!("Restart ignored in {:?}", self.state);
                Ok(())
            }
        }
    }

    async fn seek_to(&mut self, position_ms: u64) -> Result<()> {
        info!("Seek command received: {} ms", position_ms);
        match self.state {
            SessionState::Playing | SessionState::Paused => {
                let duration_ms = self.last_status.duration_ms;
                let target = if duration_ms > 0 {
                    position_ms.min(duration_ms)
                } else {
                    // Duration unknown (streaming); the engine clamps itself
                    position_ms
                };
                self.engine.seek(target).await?;
                self.last_status = self.engine.get_status().await;
                Ok(())
            }
            _ => {
                debug!("Seek ignored in {:?}", self.state);
                Ok(())
            }
        }
    }

    async fn change_volume(&mut self, target: f32) -> Result<()> {
        let new_volume = target.clamp(0.0, 1.0);
        let old_volume = self.volume;
        self.volume = new_volume;

        // With nothing loaded the session value alone changes; it reaches
        // the engine at the next load.
        if self.last_status.is_loaded {
            self.engine.set_volume(new_volume).await?;
        }

        if (new_volume - old_volume).abs() > f32::EPSILON {
            debug!("Volume changed: {:.2} -> {:.2}", old_volume, new_volume);
            self.bus.emit_lossy(SessionEvent::VolumeChanged {
                old_volume,
                new_volume,
                timestamp: chrono::Utc::now(),
            });
        }
        Ok(())
    }

    fn toggle_shuffle(&mut self) -> Result<()> {
        info!("Toggle shuffle command received");
        match self.queue.as_mut() {
            Some(queue) => {
                let enabled = queue.toggle_shuffle(&mut rand::thread_rng());
                info!("Shuffle {}", if enabled { "enabled" } else { "disabled" });
                self.bus.emit_lossy(SessionEvent::ShuffleChanged {
                    enabled,
                    timestamp: chrono::Utc::now(),
                });
                Ok(())
            }
            None => {
                debug!("Toggle shuffle ignored with no queue open");
                Ok(())
            }
        }
    }

    fn toggle_repeat(&mut self) -> Result<()> {
        info!("Toggle repeat command received");
        match self.queue.as_mut() {
            Some(queue) => {
                let mode = queue.cycle_repeat();
                info!("Repeat mode now {:?}", mode);
                self.bus.emit_lossy(SessionEvent::RepeatChanged {
                    mode,
                    timestamp: chrono::Utc::now(),
                });
                Ok(())
            }
            None => {
                debug!("Toggle repeat ignored with no queue open");
                Ok(())
            }
        }
    }

    /// Fold one engine observation into the session
    ///
    /// Observations only count toward completion while a track is active;
    /// anything the engine reports in other states is stale.
    async fn observe(&mut self, status: EngineStatus, finished: bool) {
        if self.state != SessionState::Playing && self.state != SessionState::Paused {
            return;
        }

        self.last_status = status;

        if status.is_loaded {
            if let Some(queue) = self.queue.as_ref() {
                self.bus.emit_lossy(SessionEvent::Progress {
                    track_id: queue.current_track().id.clone(),
                    position_ms: status.position_ms,
                    duration_ms: status.duration_ms,
                    playing: status.is_playing,
                    timestamp: chrono::Utc::now(),
                });
            }
        }

        if self.detector.observe(&status, finished, Instant::now()) {
            self.complete_current().await;
        }
    }

    /// The current track reached its end; advance per repeat mode
    async fn complete_current(&mut self) {
        let advance = match self.queue.as_mut() {
            Some(queue) => queue.advance_on_completion(),
            None => return,
        };

        match advance {
            CompletionAdvance::RestartCurrent => {
                debug!("Track completed, repeat-one restarts it");
                if let Err(e) = self.restart_for_repeat().await {
                    error!("Restart after completion failed: {}", e);
                    self.enter_error("Could not restart track".to_string()).await;
                }
            }
            CompletionAdvance::LoadTrack(index) => {
                debug!("Track completed, advancing to queue index {}", index);
                self.load_current().await;
            }
            CompletionAdvance::QueueExhausted => {
                info!("Queue exhausted, ending session");
                let track_id = match self.queue.as_ref() {
                    Some(queue) => queue.current_track().id.clone(),
                    None => String::new(),
                };

                if let Err(e) = self.engine.unload().await {
                    warn!("Unload at queue end failed: {}", e);
                }
                self.last_status = EngineStatus::unloaded();
                self.detector.reset();

                self.bus.emit_lossy(SessionEvent::QueueEnded {
                    track_id,
                    timestamp: chrono::Utc::now(),
                });
                self.set_state(SessionState::Ended);
            }
        }
    }

    async fn restart_for_repeat(&mut self) -> std::result::Result<(), EngineError> {
        self.engine.seek(0).await?;
        self.engine.play().await?;
        Ok(())
    }

    /// Load and start the queue's current track
    ///
    /// Engine failures surface as the Error state plus feedback; the queue
    /// position stays on the failed track so Next can move past it.
    async fn load_current(&mut self) {
        let (track, index) = match self.queue.as_ref() {
            Some(queue) => (queue.current_track().clone(), queue.current_index()),
            None => return,
        };

        if let Err(e) = self.engine.unload().await {
            warn!("Unload before load failed: {}", e);
        }

        // A fresh receiver sees only updates for the track loaded below
        self.push_rx = self.engine.status_updates();
        self.push_open = true;
        self.poll.reset();
        self.detector.reset();

        self.set_state(SessionState::Loading);
        debug!("Loading track '{}' ({})", track.name, track.uri);

        match self.load_and_start(&track.uri).await {
            Ok(()) => {
                self.last_status = self.engine.get_status().await;
                self.bus.emit_lossy(SessionEvent::TrackStarted {
                    track,
                    index,
                    timestamp: chrono::Utc::now(),
                });
                self.set_state(SessionState::Playing);
            }
            Err(e) => {
                error!("Failed to start '{}': {}", track.name, e);
                self.last_status = EngineStatus::unloaded();
                self.enter_error(format!("Could not play {}", track.name)).await;
            }
        }
    }

    async fn load_and_start(&self, uri: &str) -> std::result::Result<(), EngineError> {
        self.engine.load(uri).await?;
        self.engine.set_volume(self.volume).await?;
        self.engine.play().await?;
        Ok(())
    }

    async fn enter_error(&mut self, feedback: String) {
        self.bus.emit_lossy(SessionEvent::Feedback {
            message: feedback,
            timestamp: chrono::Utc::now(),
        });
        self.set_state(SessionState::Error);
    }

    fn set_state(&mut self, new_state: SessionState) {
        if self.state == new_state {
            return;
        }
        let old_state = self.state;
        self.state = new_state;

        info!("Playback state changed: {:?} -> {:?}", old_state, new_state);
        self.bus.emit_lossy(SessionEvent::StateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }

    fn snapshot(&self) -> SessionSnapshot {
        let (track, queue_index, queue_len, shuffled, repeat) = match self.queue.as_ref() {
            Some(queue) => (
                Some(queue.current_track().clone()),
                Some(queue.current_index()),
                queue.len(),
                queue.is_shuffled(),
                queue.repeat_mode(),
            ),
            None => (None, None, 0, false, RepeatMode::Off),
        };

        SessionSnapshot {
            state: self.state,
            track,
            queue_index,
            queue_len,
            shuffled,
            repeat,
            volume: self.volume,
            position_ms: self.last_status.position_ms,
            duration_ms: self.last_status.duration_ms,
        }
    }

    async fn teardown(&mut self) {
        if let Err(e) = self.engine.unload().await {
            warn!("Unload during close failed: {}", e);
        }
        self.queue = None;
        self.last_status = EngineStatus::unloaded();
        self.set_state(SessionState::Idle);
    }
}
