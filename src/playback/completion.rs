//! End-of-track detection
//!
//! The engine's own finished event is not reliable: it can be skipped when
//! the host loses focus or the push channel lags. Two independent signals
//! therefore feed the same detector: every push status update and a timed
//! poll of the engine while a track is loaded. Both apply one end condition,
//! and a hold-off latch keeps the pair from firing twice for the same track
//! boundary.
//!
//! The detector never reads the clock itself; callers pass the observation
//! time, which keeps latch behavior testable without sleeping.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::engine::EngineStatus;

/// Merges push and poll end-of-track signals into exactly one advance
#[derive(Debug)]
pub struct CompletionDetector {
    /// How close to the duration counts as the end
    tolerance_ms: u64,
    /// How long further detections are suppressed after a fire
    holdoff: Duration,
    /// Suppression deadline from the last fire
    latched_until: Option<Instant>,
}

impl CompletionDetector {
    pub fn new(tolerance_ms: u64, holdoff: Duration) -> Self {
        Self {
            tolerance_ms,
            holdoff,
            latched_until: None,
        }
    }

    /// Feed one status observation from either signal path
    ///
    /// Returns true when the caller should advance the queue: the track
    /// reached its end condition and no fire is latched. The end condition
    /// is position within the tolerance window of a known duration, or the
    /// engine's explicit finished flag; both require a loaded resource.
    pub fn observe(&mut self, status: &EngineStatus, finished: bool, now: Instant) -> bool {
        if !status.is_loaded {
            return false;
        }
        if !finished && !self.at_or_past_end(status) {
            return false;
        }
        if self.is_latched(now) {
            debug!(
                "Suppressing duplicate completion at {}ms/{}ms",
                status.position_ms, status.duration_ms
            );
            return false;
        }
        self.latched_until = Some(now + self.holdoff);
        true
    }

    /// Whether a fire is currently suppressing further detections
    pub fn is_latched(&self, now: Instant) -> bool {
        matches!(self.latched_until, Some(until) if now < until)
    }

    /// Clear the latch; called whenever a new track enters Loading
    pub fn reset(&mut self) {
        self.latched_until = None;
    }

    fn at_or_past_end(&self, status: &EngineStatus) -> bool {
        status.duration_ms > 0
            && status.position_ms >= status.duration_ms.saturating_sub(self.tolerance_ms)
    }
}
