//! Event types for the maestro session
//!
//! Provides the session event definitions and the EventBus used to fan them
//! out to observers (UI shells, loggers, tests).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::input::InputModality;
use crate::playback::queue::{RepeatMode, Track};
use crate::playback::session::SessionState;

/// Session event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to an external presentation layer. All session observers match on this
/// central enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Session state changed (Idle/Loading/Playing/Paused/Ended/Error)
    StateChanged {
        /// State before change
        old_state: SessionState,
        /// State after change
        new_state: SessionState,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new queue was opened
    QueueOpened {
        /// Number of tracks in the queue
        length: usize,
        /// Index of the first track to play
        start_index: usize,
        /// When the queue was opened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track was loaded and started playing
    TrackStarted {
        /// Full track metadata for display
        track: Track,
        /// Index of the track in the queue
        index: usize,
        /// When playback started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback progress update
    ///
    /// Emitted on every status observation (push callback or poll), so the
    /// cadence follows the poll interval while pushes are quiet.
    Progress {
        /// Id of the current track
        track_id: String,
        /// Current playback position (milliseconds)
        position_ms: u64,
        /// Total track duration (milliseconds)
        duration_ms: u64,
        /// Whether the engine reports active playback
        playing: bool,
        /// Progress update timestamp
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Volume changed
    VolumeChanged {
        /// Previous volume (0.0-1.0)
        old_volume: f32,
        /// New volume (0.0-1.0)
        new_volume: f32,
        /// When volume changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Shuffle was enabled or disabled
    ShuffleChanged {
        /// Whether a shuffled order is now active
        enabled: bool,
        /// When shuffle changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Repeat mode cycled
    RepeatChanged {
        /// The repeat mode now in effect
        mode: RepeatMode,
        /// When repeat changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The queue played out with repeat off
    QueueEnded {
        /// Id of the track that finished last
        track_id: String,
        /// When the queue ended
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An input modality was disabled for the rest of the session
    ModalityDisabled {
        /// Which modality was disabled
        modality: InputModality,
        /// Why it was disabled
        reason: String,
        /// When it was disabled
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User-facing feedback text
    Feedback {
        /// Message for presentation (spoken or displayed by the shell)
        message: String,
        /// When the feedback was produced
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast bus for session events
///
/// # Examples
///
/// ```
/// use maestro::events::{EventBus, SessionEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(SessionEvent::Feedback {
///     message: "Command not recognized".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// Subscribers that fall more than `capacity` events behind start
    /// dropping the oldest ones.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<SessionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Used for events where it is acceptable that no component is
    /// currently observing (progress ticks, feedback).
    pub fn emit_lossy(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_emitted_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(SessionEvent::Feedback {
            message: "Next song".to_string(),
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            SessionEvent::Feedback { message, .. } => assert_eq!(message, "Next song"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(16);
        let result = bus.emit(SessionEvent::QueueEnded {
            track_id: "t1".to_string(),
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_emit_lossy_without_subscribers_is_silent() {
        let bus = EventBus::new(16);
        bus.emit_lossy(SessionEvent::ShuffleChanged {
            enabled: true,
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_events_serialize_with_type_tag() {
        let event = SessionEvent::VolumeChanged {
            old_volume: 0.8,
            new_volume: 0.5,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"VolumeChanged\""));
        assert!(json.contains("\"new_volume\":0.5"));
    }
}
