//! Camera gesture input
//!
//! An external recognizer turns camera frames into string labels. This
//! module owns everything after that point: mapping labels to commands,
//! sampling the recognizer on a fixed cadence, and rate-limiting how often
//! a detection may be accepted.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Command, ControlSignal, InputModality, NormalizedInput};
use crate::config::Tuning;
use crate::events::{EventBus, SessionEvent};

/// Errors from the gesture recognizer backend
#[derive(Error, Debug, Clone)]
pub enum GestureError {
    /// Camera access was denied by the platform
    #[error("No access to camera")]
    PermissionDenied,

    /// Recognizer backend failure (model, capture, transport)
    #[error("Gesture recognizer error: {0}")]
    Recognizer(String),
}

/// Produces gesture labels from whatever source it wraps
///
/// `detect` is one recognition attempt: `Ok(None)` when no gesture is
/// currently visible, `Ok(Some(label))` for a detection. Label vocabulary
/// is open; unknown labels are ignored by [`normalize_label`].
#[async_trait]
pub trait GestureRecognizer: Send + Sync {
    async fn detect(&self) -> Result<Option<String>, GestureError>;
}

/// Map a recognizer label to its outcome
///
/// Unknown labels resolve to `None` and must not surface as
/// `Command::Unrecognized`; a camera pointed at an idle room produces a
/// stream of noise that the user never asked to be told about.
pub fn normalize_label(label: &str) -> Option<NormalizedInput> {
    match label {
        "wave_left" => Some(NormalizedInput::Playback(Command::Previous)),
        "wave_right" => Some(NormalizedInput::Playback(Command::Next)),
        "thumbs_up" => Some(NormalizedInput::Playback(Command::TogglePlay)),
        "three_fingers" => Some(NormalizedInput::Playback(Command::ToggleShuffle)),
        "open_palm" => Some(NormalizedInput::Control(ControlSignal::DisableGestureInput)),
        "two_fingers" => Some(NormalizedInput::Control(ControlSignal::Exit)),
        _ => None,
    }
}

/// Samples a [`GestureRecognizer`] on a fixed cadence
///
/// Accepted outcomes are forwarded over an mpsc channel to whoever routes
/// inputs (the shell in production, the test harness in tests). The sampler
/// stops on its own when the recognizer reports a permission error, when an
/// `open_palm` detection disables the modality, or when the receiving side
/// goes away; it stops on request via the [`CancellationToken`].
pub struct GestureSampler {
    recognizer: Arc<dyn GestureRecognizer>,
    outcomes: mpsc::Sender<NormalizedInput>,
    bus: EventBus,
    sample_interval: Duration,
    min_gap: Duration,
    cancel: CancellationToken,
}

impl GestureSampler {
    pub fn new(
        recognizer: Arc<dyn GestureRecognizer>,
        outcomes: mpsc::Sender<NormalizedInput>,
        bus: EventBus,
        tuning: &Tuning,
    ) -> Self {
        Self {
            recognizer,
            outcomes,
            bus,
            sample_interval: tuning.gesture_sample_interval(),
            min_gap: tuning.gesture_min_gap(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the sampling task when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start the sampling task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut ticker = interval(self.sample_interval);
        let mut last_accepted: Option<Instant> = None;

        info!(
            "Gesture sampling started (every {:?}, acceptance gate {:?})",
            self.sample_interval, self.min_gap
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Gesture sampling cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            // Within the acceptance gate the recognizer is not queried at
            // all, matching the debounce-at-source contract.
            if let Some(last) = last_accepted {
                if last.elapsed() < self.min_gap {
                    continue;
                }
            }

            match self.recognizer.detect().await {
                Ok(Some(label)) => match normalize_label(&label) {
                    Some(outcome) => {
                        last_accepted = Some(Instant::now());
                        debug!("Accepted gesture '{}' -> {:?}", label, outcome);

                        if self.outcomes.send(outcome).await.is_err() {
                            debug!("Gesture consumer gone, stopping sampler");
                            break;
                        }

                        if outcome == NormalizedInput::Control(ControlSignal::DisableGestureInput)
                        {
                            info!("Gesture input disabled by open palm");
                            self.bus.emit_lossy(SessionEvent::ModalityDisabled {
                                modality: InputModality::CameraGesture,
                                reason: "Disabled by open palm".to_string(),
                                timestamp: chrono::Utc::now(),
                            });
                            break;
                        }
                    }
                    None => debug!("Ignoring unknown gesture label '{}'", label),
                },
                Ok(None) => {}
                Err(GestureError::PermissionDenied) => {
                    warn!("Camera permission denied, disabling gesture input");
                    self.bus.emit_lossy(SessionEvent::ModalityDisabled {
                        modality: InputModality::CameraGesture,
                        reason: "No access to camera".to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                    self.bus.emit_lossy(SessionEvent::Feedback {
                        message: "No access to camera".to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                    break;
                }
                Err(e) => {
                    // Transient recognizer trouble; keep sampling
                    warn!("Gesture recognizer error: {}", e);
                }
            }
        }
    }
}

/// Recognizer that replays queued labels, one per `detect` call
///
/// Used by the demo shell and by tests. An empty queue reads as "no gesture
/// visible".
#[derive(Default)]
pub struct ScriptedRecognizer {
    labels: Mutex<VecDeque<String>>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: Mutex::new(labels.into_iter().map(Into::into).collect()),
        }
    }

    /// Queue a label for a future `detect` call
    pub async fn push(&self, label: &str) {
        self.labels.lock().await.push_back(label.to_string());
    }
}

#[async_trait]
impl GestureRecognizer for ScriptedRecognizer {
    async fn detect(&self) -> Result<Option<String>, GestureError> {
        Ok(self.labels.lock().await.pop_front())
    }
}
