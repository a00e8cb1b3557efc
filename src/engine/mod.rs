//! Audio engine contract
//!
//! The session drives playback through the [`AudioEngine`] trait and never
//! touches an audio device itself. Engines are external: the crate ships a
//! simulated implementation (`sim`) for the demo binary and tests, and any
//! real transport (native player, remote renderer) plugs in behind the same
//! trait.
//!
//! Status flows back on two paths with the same shape: push (a broadcast
//! subscription the engine feeds asynchronously) and pull (`get_status`).
//! The push path additionally carries the engine's own end-of-media flag,
//! which is not guaranteed to arrive for every track end.

pub mod sim;

pub use sim::SimulatedEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors surfaced by an audio engine implementation
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Media could not be fetched or decoded
    #[error("Unplayable media: {0}")]
    Unplayable(String),

    /// Device or resource failure during a transport call
    #[error("Device error: {0}")]
    Device(String),

    /// Transport call issued with no loaded resource
    #[error("No resource loaded")]
    NotLoaded,
}

/// Read-only snapshot of the engine transport state
///
/// An unloaded engine reports all-zero/false.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Current playback position (milliseconds)
    pub position_ms: u64,
    /// Total duration of the loaded media (milliseconds); 0 while unknown
    pub duration_ms: u64,
    /// Whether the transport is actively playing
    pub is_playing: bool,
    /// Whether a resource is loaded
    pub is_loaded: bool,
}

impl EngineStatus {
    /// Snapshot of an engine with nothing loaded
    pub fn unloaded() -> Self {
        Self {
            position_ms: 0,
            duration_ms: 0,
            is_playing: false,
            is_loaded: false,
        }
    }
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self::unloaded()
    }
}

/// One push notification from the engine
#[derive(Debug, Clone, Copy)]
pub struct StatusUpdate {
    /// Transport snapshot at the time of the update
    pub status: EngineStatus,
    /// Engine's own end-of-media signal; false unless the engine knows the
    /// media just finished. Skipped by some engines under load or in the
    /// background, which is why the session also polls.
    pub finished: bool,
}

/// Audio transport consumed by the playback session
///
/// Implementations must be internally synchronized: all methods take
/// `&self` and may be called from one task while a ticker inside the engine
/// publishes status updates.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Load `uri`, leaving the transport paused at position 0.
    ///
    /// Fails with [`EngineError::Unplayable`] on unreachable or undecodable
    /// media. Callers release any previous resource via [`unload`] first;
    /// `load` on an engine that still holds one may fail.
    ///
    /// [`unload`]: AudioEngine::unload
    async fn load(&self, uri: &str) -> Result<(), EngineError>;

    /// Start or resume playback of the loaded resource.
    async fn play(&self) -> Result<(), EngineError>;

    /// Pause playback, keeping the resource loaded.
    async fn pause(&self) -> Result<(), EngineError>;

    /// Move the playback position. Engines clamp positions past the end of
    /// the media themselves; the session clamps before calling.
    async fn seek(&self, position_ms: u64) -> Result<(), EngineError>;

    /// Set the output volume, 0.0 to 1.0.
    async fn set_volume(&self, volume: f32) -> Result<(), EngineError>;

    /// Snapshot the transport state. Never fails; an unloaded engine
    /// reports [`EngineStatus::unloaded`].
    async fn get_status(&self) -> EngineStatus;

    /// Subscribe to push status updates.
    ///
    /// Each call returns a fresh receiver that only observes updates
    /// published after the call, so re-subscribing on track change discards
    /// anything buffered for the previous track.
    fn status_updates(&self) -> broadcast::Receiver<StatusUpdate>;

    /// Stop playback and release the loaded resource.
    ///
    /// Idempotent: safe to call with nothing loaded.
    async fn unload(&self) -> Result<(), EngineError>;
}
