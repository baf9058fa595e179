//! Recorded source: log indexing, random-access cursor and paced player.
//!
//! - [`LogHandle`] is the immutable frame index of one log file.
//! - [`LogCursor`] is the synchronous core: it reads frames through the
//!   index, keeps the decoder context and reconstructs state on seek.
//! - [`LogPlayer`] drives a cursor from its own pacing thread and feeds
//!   a world model through a blocking queue.

mod cursor;
mod index;
mod player;

pub use cursor::LogCursor;
pub use index::{IndexEntry, LogHandle};
pub use player::{LogPlayer, PlaybackListener, PlaybackState, PlaybackStatus};
