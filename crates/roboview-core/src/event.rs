//! Items carried by the producer → render-thread queue.

use crate::command::Frame;

/// One item pushed by a frame source.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceEvent {
    /// A new session begins (connect, reconnect or new log).
    ///
    /// The consumer replaces its scene graph and game state wholesale.
    SessionStart,
    /// A decoded frame.
    Frame(Frame),
}

impl From<Frame> for SourceEvent {
    fn from(frame: Frame) -> Self {
        Self::Frame(frame)
    }
}
