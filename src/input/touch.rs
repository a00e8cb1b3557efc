//! Touch gesture normalization
//!
//! The platform recognizer delivers already-classified touch events; this
//! module only maps them to commands. Pan updates arrive as deltas since the
//! previous update, pan ends as totals for the whole pan.

use super::{Command, ControlSignal, NormalizedInput};
use crate::config::Tuning;
use tracing::trace;

/// Discrete touch events from the platform gesture recognizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchEvent {
    /// Single tap anywhere on the playback surface
    Tap,
    /// Press held past the platform's long-press threshold
    LongPress,
    /// Pan in progress; `dx`/`dy` are deltas since the last update
    PanUpdate { dx: f32, dy: f32 },
    /// Pan finished; `dx`/`dy` are totals for the whole pan
    PanEnd { dx: f32, dy: f32 },
    /// Two-finger pinch finished
    PinchEnd,
}

/// Maps touch events to normalized inputs
///
/// Swipe threshold and pan-to-volume scale come from [`Tuning`].
#[derive(Debug, Clone)]
pub struct TouchNormalizer {
    swipe_threshold_px: f32,
    pan_volume_scale: f32,
}

impl TouchNormalizer {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            swipe_threshold_px: tuning.swipe_threshold_px,
            pan_volume_scale: tuning.pan_volume_scale,
        }
    }

    /// Resolve one touch event
    ///
    /// Returns `None` for events with no mapping, such as a horizontal pan
    /// that ends inside the swipe threshold.
    pub fn normalize(&self, event: TouchEvent) -> Option<NormalizedInput> {
        let resolved = match event {
            TouchEvent::Tap => Some(NormalizedInput::Playback(Command::TogglePlay)),
            TouchEvent::LongPress => Some(NormalizedInput::Playback(Command::Restart)),
            // Upward pan (negative dy) raises volume
            TouchEvent::PanUpdate { dy, .. } => Some(NormalizedInput::Playback(
                Command::AdjustVolume(-dy * self.pan_volume_scale),
            )),
            TouchEvent::PanEnd { dx, .. } => {
                if dx < -self.swipe_threshold_px {
                    Some(NormalizedInput::Playback(Command::Next))
                } else if dx > self.swipe_threshold_px {
                    Some(NormalizedInput::Playback(Command::Previous))
                } else {
                    None
                }
            }
            TouchEvent::PinchEnd => Some(NormalizedInput::Control(ControlSignal::ShowDetails)),
        };

        trace!("Touch event {:?} -> {:?}", event, resolved);
        resolved
    }
}
