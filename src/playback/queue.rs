//! Play queue
//!
//! Tracks the ordered track list, the active play order (linear or a shuffle
//! permutation), the repeat mode, and the current position. Navigation never
//! leaves the queue bounds: moves past either edge wrap under repeat-all and
//! are no-ops otherwise.
//!
//! Shuffle is anchored: enabling it builds a permutation whose first entry
//! is the track playing right now, so the audible track never changes when
//! the order does. Disabling it returns to linear order at that same track.

use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One playable item, supplied by the catalog collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Opaque catalog id
    pub id: String,
    /// Media location handed to the engine
    pub uri: String,
    /// Display title
    pub name: String,
    /// Display artist
    pub artist_name: String,
    /// Artwork location, if the catalog has one
    #[serde(default)]
    pub album_image_uri: Option<String>,
}

/// Repeat behavior at track and queue boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    /// Stop at the queue edges
    #[default]
    Off,
    /// Restart the current track on completion
    One,
    /// Wrap at the queue edges
    All,
}

impl RepeatMode {
    /// Explicit toggle order: Off → One → All → Off
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::One,
            RepeatMode::One => RepeatMode::All,
            RepeatMode::All => RepeatMode::Off,
        }
    }
}

/// Active navigation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOrder {
    /// Identity order over the track list
    Linear,
    /// A bijection over queue indices; element 0 is the track that was
    /// current when shuffle was enabled
    Shuffled(Vec<usize>),
}

impl PlayOrder {
    /// Whether a shuffle permutation is active
    pub fn is_shuffled(&self) -> bool {
        matches!(self, PlayOrder::Shuffled(_))
    }
}

/// Outcome of completing the current track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionAdvance {
    /// Repeat-one: stay on the track, restart from position 0
    RestartCurrent,
    /// Load the track at this queue index
    LoadTrack(usize),
    /// Nothing left to play; the session transitions to Ended
    QueueExhausted,
}

/// The session's queue: tracks, active order, position, repeat mode
#[derive(Debug, Clone)]
pub struct PlayQueue {
    tracks: Vec<Track>,
    order: PlayOrder,
    /// Index into the active order, always in `[0, tracks.len())`
    position: usize,
    repeat: RepeatMode,
}

impl PlayQueue {
    /// Create a queue positioned at `start_index` (a queue index, not an
    /// order position; the initial order is linear so the two coincide).
    pub fn new(tracks: Vec<Track>, start_index: usize) -> Result<Self> {
        if tracks.is_empty() {
            return Err(Error::Queue("Cannot open an empty queue".to_string()));
        }
        if start_index >= tracks.len() {
            return Err(Error::Queue(format!(
                "Start index {} out of bounds for queue of {}",
                start_index,
                tracks.len()
            )));
        }
        Ok(Self {
            tracks,
            order: PlayOrder::Linear,
            position: start_index,
            repeat: RepeatMode::default(),
        })
    }

    /// Number of tracks in the queue
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Always false after construction; present for API completeness
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Queue index of the track at an order position
    fn index_at(&self, position: usize) -> usize {
        match &self.order {
            PlayOrder::Linear => position,
            PlayOrder::Shuffled(permutation) => permutation[position],
        }
    }

    /// Queue index of the current track
    pub fn current_index(&self) -> usize {
        self.index_at(self.position)
    }

    /// The current track
    pub fn current_track(&self) -> &Track {
        &self.tracks[self.current_index()]
    }

    /// Track at a queue index
    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Position in the active order
    pub fn position(&self) -> usize {
        self.position
    }

    /// The active order
    pub fn order(&self) -> &PlayOrder {
        &self.order
    }

    /// Whether a shuffle permutation is active
    pub fn is_shuffled(&self) -> bool {
        self.order.is_shuffled()
    }

    /// Current repeat mode
    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    /// Cycle the repeat mode and return the new one
    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycle();
        self.repeat
    }

    /// Set the repeat mode directly
    ///
    /// Used when a fresh queue inherits the mode from the one it replaces.
    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    /// Build a shuffle permutation anchored at the current track
    ///
    /// All indices except the current one are shuffled (Fisher–Yates via
    /// `SliceRandom`), then the current index is prepended. The current
    /// track keeps playing; only future navigation order changes.
    pub fn enable_shuffle<R: Rng>(&mut self, rng: &mut R) {
        let current = self.current_index();
        let mut rest: Vec<usize> = (0..self.tracks.len()).filter(|&i| i != current).collect();
        rest.shuffle(rng);

        let mut permutation = Vec::with_capacity(self.tracks.len());
        permutation.push(current);
        permutation.extend(rest);

        self.order = PlayOrder::Shuffled(permutation);
        self.position = 0;
    }

    /// Discard the permutation and return to linear order at the track that
    /// was last playing
    pub fn disable_shuffle(&mut self) {
        let current = self.current_index();
        self.order = PlayOrder::Linear;
        self.position = current;
    }

    /// Flip shuffle; returns true if a shuffled order is now active
    pub fn toggle_shuffle<R: Rng>(&mut self, rng: &mut R) -> bool {
        if self.is_shuffled() {
            self.disable_shuffle();
            false
        } else {
            self.enable_shuffle(rng);
            true
        }
    }

    /// Order position that `Next` would move to, without moving
    ///
    /// None at the last position with repeat off or one; wraps to position 0
    /// under repeat-all.
    pub fn peek_next(&self) -> Option<usize> {
        if self.position + 1 < self.tracks.len() {
            Some(self.position + 1)
        } else if self.repeat == RepeatMode::All {
            Some(0)
        } else {
            None
        }
    }

    /// Order position that `Previous` would move to, without moving
    pub fn peek_previous(&self) -> Option<usize> {
        if self.position > 0 {
            Some(self.position - 1)
        } else if self.repeat == RepeatMode::All {
            Some(self.tracks.len() - 1)
        } else {
            None
        }
    }

    /// Apply `Next`; returns the queue index of the new current track, or
    /// None for the defined no-op at the queue edge
    pub fn advance_next(&mut self) -> Option<usize> {
        let next = self.peek_next()?;
        self.position = next;
        Some(self.current_index())
    }

    /// Apply `Previous`; returns the queue index of the new current track,
    /// or None for the defined no-op at the queue edge
    pub fn advance_previous(&mut self) -> Option<usize> {
        let previous = self.peek_previous()?;
        self.position = previous;
        Some(self.current_index())
    }

    /// Apply a completed track
    ///
    /// Repeat-one short-circuits to restarting the current track; otherwise
    /// the queue advances like `Next`, and an exhausted queue reports
    /// `QueueExhausted` so the caller can transition to Ended.
    pub fn advance_on_completion(&mut self) -> CompletionAdvance {
        if self.repeat == RepeatMode::One {
            return CompletionAdvance::RestartCurrent;
        }
        match self.advance_next() {
            Some(index) => CompletionAdvance::LoadTrack(index),
            None => CompletionAdvance::QueueExhausted,
        }
    }
}
