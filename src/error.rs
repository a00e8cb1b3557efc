//! Error types for maestro
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

use crate::engine::EngineError;
use crate::input::gesture::GestureError;
use crate::input::voice::VoiceError;

/// Main error type for maestro
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Voice pipeline errors
    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    /// Gesture recognizer errors
    #[error("Gesture error: {0}")]
    Gesture(#[from] GestureError),

    /// Queue construction or navigation errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The session task has exited and no longer accepts requests
    #[error("Session closed")]
    SessionClosed,

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using maestro Error
pub type Result<T> = std::result::Result<T, Error>;
