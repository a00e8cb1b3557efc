//! # Maestro Playback Session Library
//!
//! Core playback session controller: queue and shuffle/repeat bookkeeping,
//! multi-modal input normalization (touch, camera gestures, voice), and a
//! debounced track-completion detector, all serialized through a single
//! session task.
//!
//! **Architecture:** One tokio task owns all session state and an engine
//! adapter ([`engine::AudioEngine`]); shells drive it through a
//! [`SessionHandle`] and observe it through the [`events::EventBus`].

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod input;
pub mod playback;

pub use engine::{AudioEngine, EngineStatus, SimulatedEngine};
pub use error::{Error, Result};
pub use events::{EventBus, SessionEvent};
pub use input::{Command, ControlSignal, NormalizedInput};
pub use playback::{RepeatMode, SessionHandle, SessionState, Track};
