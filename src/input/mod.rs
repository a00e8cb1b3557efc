//! Input normalization
//!
//! Three modalities feed the session: touch gestures, camera-inferred
//! gesture labels, and voice transcripts. Each is normalized into the
//! closed [`Command`] vocabulary (or a [`ControlSignal`]) before the state
//! machine ever inspects it, so the state machine carries no knowledge of
//! where an instruction came from.

pub mod gesture;
pub mod touch;
pub mod voice;

pub use gesture::{GestureError, GestureRecognizer, GestureSampler, ScriptedRecognizer};
pub use touch::{TouchEvent, TouchNormalizer};
pub use voice::{SpeechSynthesizer, VoiceControl, VoiceError, VoicePipeline};

use serde::{Deserialize, Serialize};

/// Canonical playback instruction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Flip between playing and paused
    TogglePlay,
    /// Pause if playing, otherwise nothing
    Pause,
    /// Move to the following track in the active order
    Next,
    /// Move to the preceding track in the active order
    Previous,
    /// Restart the current track from position 0
    Restart,
    /// Absolute seek in milliseconds; clamped to the duration on apply
    SeekTo(u64),
    /// Relative volume change; the result is clamped to [0, 1]
    AdjustVolume(f32),
    /// Absolute volume; clamped to [0, 1]
    SetVolume(f32),
    /// Enable or disable the shuffle permutation
    ToggleShuffle,
    /// Cycle repeat Off → One → All → Off
    ToggleRepeat,
    /// Input no mapping matched; a defined no-op with feedback
    Unrecognized,
}

/// Session-scoped control outcome that is not a playback command
///
/// The surrounding shell handles these; the state machine never sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Navigate to the track details view
    ShowDetails,
    /// Stop accepting camera gesture input for this session
    DisableGestureInput,
    /// Leave the playback screen
    Exit,
}

/// What one input event resolves to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalizedInput {
    /// Dispatch to the playback session
    Playback(Command),
    /// Handle in the shell
    Control(ControlSignal),
}

/// Input modality, named in permission feedback and modality disables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputModality {
    Touch,
    CameraGesture,
    Voice,
}
