//! Error types for frame sources.

use std::io;
use std::path::PathBuf;

use roboview_protocol::DecodeError;

use crate::config::ConfigError;

/// A live connection attempt or stream failed.
///
/// Never surfaced to the render loop: the reader thread logs it, reports
/// it through [`ConnectionEvent`](crate::ConnectionEvent) and retries.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Connect, read or reset failure.
    #[error("connection i/o: {0}")]
    Io(#[from] io::Error),
    /// The server sent a message that does not decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The server closed the stream.
    #[error("server closed the connection")]
    Closed,
}

/// A recorded log could not be opened or read.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The file could not be opened.
    #[error("cannot open log {}: {source}", path.display())]
    Open {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The file holds no message at all.
    #[error("log {} is empty", path.display())]
    Empty {
        /// Path that was opened.
        path: PathBuf,
    },
    /// Read failure after opening.
    #[error("log i/o: {0}")]
    Io(#[from] io::Error),
    /// A message in the log is malformed. The offset is absolute.
    #[error("corrupt log: {0}")]
    Corrupt(#[from] DecodeError),
    /// Invalid player configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The playback thread could not be reached.
    #[error("playback thread has shut down")]
    Shutdown,
}

/// A producer could not be started.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// `start` was called on a running producer.
    #[error("source already started")]
    AlreadyStarted,
    /// `start` was called after `shutdown`.
    #[error("source has been shut down")]
    ShutDown,
    /// The worker thread could not be spawned.
    #[error("failed to spawn source thread: {0}")]
    Spawn(#[from] io::Error),
}

/// A session could not be opened or reset.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Invalid source configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Invalid world configuration.
    #[error(transparent)]
    World(#[from] roboview_scene::ConfigError),
    /// The log could not be opened.
    #[error(transparent)]
    Log(#[from] LogError),
    /// The source could not be started.
    #[error(transparent)]
    Source(#[from] SourceError),
}
