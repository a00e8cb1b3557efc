//! Playback session, queue, and completion detection

pub mod completion;
pub mod queue;
pub mod session;

pub use completion::CompletionDetector;
pub use queue::{PlayQueue, RepeatMode, Track};
pub use session::{PlaybackSession, SessionHandle, SessionSnapshot, SessionState};
