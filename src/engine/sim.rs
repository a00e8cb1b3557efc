//! Simulated audio engine
//!
//! Clock-driven stand-in for a real transport, used by the demo binary and
//! the integration tests. Position is derived from elapsed play time, so the
//! simulator behaves like real media without decoding anything: it stops at
//! the end of the track, publishes push status updates on a short interval
//! while a resource is loaded, and raises its `finished` flag exactly once
//! per completed playthrough.
//!
//! Failure injection (`fail_uri`) and push suppression (`push_updates:
//! false`) exist so tests can exercise the session's error path and the
//! poll-only completion path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio::time::interval;
use tracing::debug;

use super::{AudioEngine, EngineError, EngineStatus, StatusUpdate};

/// Push channel capacity; small because updates are ephemeral
const UPDATE_CHANNEL_CAPACITY: usize = 32;

/// Construction options for [`SimulatedEngine`]
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Duration assigned to tracks without an explicit entry
    pub default_duration_ms: u64,
    /// Cadence of push status updates while a resource is loaded
    pub push_interval: Duration,
    /// Whether push updates are published at all
    pub push_updates: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            default_duration_ms: 30_000,
            push_interval: Duration::from_millis(250),
            push_updates: true,
        }
    }
}

/// The resource currently held by the simulator
struct Loaded {
    uri: String,
    duration_ms: u64,
    /// Position accumulated before the current play stretch
    base_position_ms: u64,
    /// Set while playing; position grows from `base_position_ms`
    playing_since: Option<Instant>,
    /// Playback ran into the end of the media
    end_reached: bool,
    /// The one-shot `finished` push flag was already delivered
    finished_sent: bool,
}

impl Loaded {
    fn position_ms(&self, now: Instant) -> u64 {
        let pos = match self.playing_since {
            Some(started) => {
                self.base_position_ms + now.duration_since(started).as_millis() as u64
            }
            None => self.base_position_ms,
        };
        pos.min(self.duration_ms)
    }
}

struct SimState {
    loaded: Option<Loaded>,
    volume: f32,
    durations: HashMap<String, u64>,
    failing: HashSet<String>,
    options: SimOptions,
}

impl SimState {
    /// Compute the current snapshot, folding a finished playthrough into a
    /// stopped transport.
    fn snapshot(&mut self, now: Instant) -> EngineStatus {
        match &mut self.loaded {
            None => EngineStatus::unloaded(),
            Some(loaded) => {
                let position_ms = loaded.position_ms(now);
                if position_ms >= loaded.duration_ms && loaded.playing_since.is_some() {
                    loaded.base_position_ms = loaded.duration_ms;
                    loaded.playing_since = None;
                    loaded.end_reached = true;
                }
                EngineStatus {
                    position_ms,
                    duration_ms: loaded.duration_ms,
                    is_playing: loaded.playing_since.is_some(),
                    is_loaded: true,
                }
            }
        }
    }

    /// One-shot `finished` flag for the push path.
    fn take_finished(&mut self) -> bool {
        match &mut self.loaded {
            Some(loaded) if loaded.end_reached && !loaded.finished_sent => {
                loaded.finished_sent = true;
                true
            }
            _ => false,
        }
    }
}

/// Clock-driven [`AudioEngine`] implementation
pub struct SimulatedEngine {
    state: Arc<Mutex<SimState>>,
    tx: broadcast::Sender<StatusUpdate>,
}

impl SimulatedEngine {
    /// Create a simulator with default options
    pub fn new() -> Self {
        Self::with_options(SimOptions::default())
    }

    /// Create a simulator with explicit options
    pub fn with_options(options: SimOptions) -> Self {
        let (tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let state = Arc::new(Mutex::new(SimState {
            loaded: None,
            volume: 1.0,
            durations: HashMap::new(),
            failing: HashSet::new(),
            options: options.clone(),
        }));

        // Push ticker; exits once the engine itself is dropped
        let weak = Arc::downgrade(&state);
        let push_tx = tx.clone();
        tokio::spawn(async move {
            let mut tick = interval(options.push_interval);
            loop {
                tick.tick().await;
                let state = match weak.upgrade() {
                    Some(state) => state,
                    None => break,
                };
                let mut state = state.lock().await;
                if !state.options.push_updates || state.loaded.is_none() {
                    continue;
                }
                let status = state.snapshot(Instant::now());
                let finished = state.take_finished();
                let _ = push_tx.send(StatusUpdate { status, finished });
            }
        });

        Self { state, tx }
    }

    /// Register a track duration for a uri
    pub async fn add_track(&self, uri: &str, duration_ms: u64) {
        let mut state = self.state.lock().await;
        state.durations.insert(uri.to_string(), duration_ms);
    }

    /// Make subsequent loads of `uri` fail with an unplayable-media error
    pub async fn fail_uri(&self, uri: &str) {
        let mut state = self.state.lock().await;
        state.failing.insert(uri.to_string());
    }

    /// Current output volume (test observability)
    pub async fn volume(&self) -> f32 {
        self.state.lock().await.volume
    }

    /// Uri of the loaded resource, if any (test observability)
    pub async fn loaded_uri(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.loaded.as_ref().map(|l| l.uri.clone())
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioEngine for SimulatedEngine {
    async fn load(&self, uri: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        if state.failing.contains(uri) {
            return Err(EngineError::Unplayable(uri.to_string()));
        }
        if state.loaded.is_some() {
            debug!("Replacing loaded resource without explicit unload");
        }
        let duration_ms = state
            .durations
            .get(uri)
            .copied()
            .unwrap_or(state.options.default_duration_ms);
        state.loaded = Some(Loaded {
            uri: uri.to_string(),
            duration_ms,
            base_position_ms: 0,
            playing_since: None,
            end_reached: false,
            finished_sent: false,
        });
        Ok(())
    }

    async fn play(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        match &mut state.loaded {
            None => Err(EngineError::NotLoaded),
            Some(loaded) => {
                if loaded.playing_since.is_none() && loaded.base_position_ms < loaded.duration_ms {
                    loaded.playing_since = Some(Instant::now());
                }
                Ok(())
            }
        }
    }

    async fn pause(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        match &mut state.loaded {
            None => Err(EngineError::NotLoaded),
            Some(loaded) => {
                let now = Instant::now();
                loaded.base_position_ms = loaded.position_ms(now);
                loaded.playing_since = None;
                Ok(())
            }
        }
    }

    async fn seek(&self, position_ms: u64) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        match &mut state.loaded {
            None => Err(EngineError::NotLoaded),
            Some(loaded) => {
                let target = position_ms.min(loaded.duration_ms);
                loaded.base_position_ms = target;
                if loaded.playing_since.is_some() {
                    loaded.playing_since = Some(Instant::now());
                }
                if target < loaded.duration_ms {
                    // Seeking off the end re-arms the finished flag
                    loaded.end_reached = false;
                    loaded.finished_sent = false;
                }
                Ok(())
            }
        }
    }

    async fn set_volume(&self, volume: f32) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        state.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    async fn get_status(&self) -> EngineStatus {
        let mut state = self.state.lock().await;
        state.snapshot(Instant::now())
    }

    fn status_updates(&self) -> broadcast::Receiver<StatusUpdate> {
        self.tx.subscribe()
    }

    async fn unload(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        state.loaded = None;
        Ok(())
    }
}
