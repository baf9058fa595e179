//! Error types for message decoding.

/// A message could not be decoded.
///
/// `offset` is the byte position of the offending token, relative to the
/// start of the message unless [`shifted`](Self::shifted) to a file offset.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("decode error at byte {offset}: {reason}")]
pub struct DecodeError {
    /// Byte offset of the failure.
    pub offset: u64,
    /// What went wrong.
    pub reason: DecodeErrorKind,
}

impl DecodeError {
    pub(crate) fn new(offset: usize, reason: DecodeErrorKind) -> Self {
        Self {
            offset: offset as u64,
            reason,
        }
    }

    /// The same error with `base` added to its offset.
    ///
    /// Used to report absolute positions inside a log file.
    pub fn shifted(mut self, base: u64) -> Self {
        self.offset += base;
        self
    }
}

/// Reason a message failed to decode.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DecodeErrorKind {
    /// The message ended in the middle of an expression.
    #[error("message truncated")]
    Truncated,
    /// The message is not valid UTF-8.
    #[error("invalid UTF-8")]
    InvalidUtf8,
    /// A token of the wrong shape was found.
    #[error("expected {0}")]
    Expected(&'static str),
    /// The frame kind is neither `full` nor `delta`.
    #[error("unknown frame kind `{0}`")]
    UnknownFrameKind(String),
    /// A command tag is not part of the protocol.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    /// A numeric field could not be parsed.
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    /// A numeric play mode arrived before any play-mode table.
    #[error("play mode index {0} received without a play-mode table")]
    NoPlayModeTable(usize),
    /// A numeric play mode is outside the current table.
    #[error("play mode index {index} outside table of {len}")]
    PlayModeOutOfRange {
        /// The received index.
        index: usize,
        /// Size of the current table.
        len: usize,
    },
    /// Bytes follow the closing parenthesis of the message.
    #[error("trailing data after message")]
    TrailingData,
}
