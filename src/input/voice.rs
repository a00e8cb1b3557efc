//! Voice command input
//!
//! A voice round is capture, transcribe, dispatch, speak: record for a
//! fixed window, map the transcript to a command with ordered substring
//! matching, apply the command, and confirm the result through the speech
//! synthesizer. Capture and synthesis are platform collaborators behind
//! traits; everything else lives here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{Command, InputModality};
use crate::config::Tuning;
use crate::error::{Error, Result};
use crate::events::{EventBus, SessionEvent};
use crate::playback::session::{SessionHandle, SessionState};

/// Transcript substituted when capture or transcription fails
///
/// Feeding the parser a fixed non-matching phrase turns every capture
/// failure into the same "Command not recognized" round a user would get
/// for silence.
pub const NO_SPEECH: &str = "no speech detected";

/// Errors from the capture/transcription pipeline
#[derive(Error, Debug, Clone)]
pub enum VoiceError {
    /// Microphone access was denied by the platform
    #[error("Mic permission denied")]
    PermissionDenied,

    /// Recording succeeded but transcription did not
    #[error("Transcription failed: {0}")]
    Transcription(String),

    /// The capture round exceeded its overall deadline
    #[error("Voice capture timed out")]
    Timeout,
}

/// Records audio and produces a transcript
#[async_trait]
pub trait VoicePipeline: Send + Sync {
    /// Begin recording
    async fn start_capture(&self) -> std::result::Result<(), VoiceError>;

    /// Stop recording and return the transcript
    async fn finish_capture(&self) -> std::result::Result<String, VoiceError>;
}

/// Speaks feedback text back to the user
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak one message; synthesis failures are the implementation's to log
    async fn speak(&self, text: &str);
}

/// Map a transcript to a command
///
/// Ordered substring matching over the lowercased transcript, first match
/// wins: play, then stop/pause, then next, then back/previous. The order is
/// part of the contract ("play the next song" toggles play, it does not
/// skip).
pub fn parse_transcript(text: &str) -> Command {
    let text = text.to_lowercase();

    if text.contains("play") {
        Command::TogglePlay
    } else if text.contains("stop") || text.contains("pause") {
        Command::Pause
    } else if text.contains("next") {
        Command::Next
    } else if text.contains("back") || text.contains("previous") {
        Command::Previous
    } else {
        Command::Unrecognized
    }
}

/// Spoken confirmation for a voice round
///
/// Pause wording depends on whether anything was actually playing when the
/// command arrived, so the caller passes the pre-dispatch state.
fn feedback_for(command: Command, state_before: SessionState) -> String {
    let message = match command {
        Command::TogglePlay => "Playing music",
        Command::Pause => {
            if state_before == SessionState::Playing {
                "Music stopped"
            } else {
                "Already stopped"
            }
        }
        Command::Next => "Next song",
        Command::Previous => "Previous song",
        _ => "Command not recognized",
    };
    message.to_string()
}

/// Drives voice rounds against a playback session
///
/// One `listen_once` call is one complete round. The driver disables itself
/// for the rest of the session when the microphone permission is denied.
pub struct VoiceControl {
    pipeline: Arc<dyn VoicePipeline>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    session: SessionHandle,
    bus: EventBus,
    capture_window: Duration,
    deadline: Duration,
    enabled: AtomicBool,
}

impl VoiceControl {
    pub fn new(
        pipeline: Arc<dyn VoicePipeline>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        session: SessionHandle,
        bus: EventBus,
        tuning: &Tuning,
    ) -> Self {
        Self {
            pipeline,
            synthesizer,
            session,
            bus,
            capture_window: tuning.voice_capture_window(),
            deadline: tuning.voice_timeout(),
            enabled: AtomicBool::new(true),
        }
    }

    /// Whether the modality is still accepting rounds
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Run one capture round and return the command it resolved to
    ///
    /// Capture failures other than a permission denial degrade to the
    /// [`NO_SPEECH`] transcript rather than erroring, so the user always
    /// hears an outcome.
    pub async fn listen_once(&self) -> Result<Command> {
        if !self.is_enabled() {
            return Err(Error::InvalidState(
                "voice input is disabled for this session".to_string(),
            ));
        }

        let transcript = match self.capture().await {
            Ok(text) => text,
            Err(VoiceError::PermissionDenied) => {
                warn!("Microphone permission denied, disabling voice input");
                self.enabled.store(false, Ordering::SeqCst);
                self.bus.emit_lossy(SessionEvent::ModalityDisabled {
                    modality: InputModality::Voice,
                    reason: "Mic permission denied".to_string(),
                    timestamp: chrono::Utc::now(),
                });
                self.speak_and_publish("Mic permission denied").await;
                return Err(Error::Voice(VoiceError::PermissionDenied));
            }
            Err(e) => {
                debug!("Voice capture failed ({}), treating as silence", e);
                NO_SPEECH.to_string()
            }
        };

        let command = parse_transcript(&transcript);
        info!("Voice transcript '{}' -> {:?}", transcript, command);

        let before = self.session.snapshot().await?;
        self.session.apply(command).await?;

        let feedback = feedback_for(command, before.state);
        self.speak_and_publish(&feedback).await;

        Ok(command)
    }

    async fn capture(&self) -> std::result::Result<String, VoiceError> {
        let round = async {
            self.pipeline.start_capture().await?;
            tokio::time::sleep(self.capture_window).await;
            self.pipeline.finish_capture().await
        };

        match timeout(self.deadline, round).await {
            Ok(result) => result,
            Err(_) => Err(VoiceError::Timeout),
        }
    }

    async fn speak_and_publish(&self, message: &str) {
        self.bus.emit_lossy(SessionEvent::Feedback {
            message: message.to_string(),
            timestamp: chrono::Utc::now(),
        });
        self.synthesizer.speak(message).await;
    }
}
