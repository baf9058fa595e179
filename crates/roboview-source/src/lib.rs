//! Frame sources for roboview: a live simulation server and recorded logs.
//!
//! Both sources run on their own thread, decode messages and push
//! [`SourceEvent`](roboview_core::SourceEvent)s onto a bounded queue that
//! the render thread drains through
//! [`WorldModel::update`](roboview_scene::WorldModel::update).
//!
//! # Architecture
//!
//! ```text
//! ServerConnection ── reader thread ──┐  DropOldest
//!                                     ├──> FrameQueue ──> WorldModel
//! LogPlayer ───────── pacing thread ──┘  Block
//! ```
//!
//! [`Session`] wires one source to one world and implements the
//! pause, drain, swap, resume protocol for replacing the world.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod backoff;
pub mod config;
pub mod connector;
pub mod error;
mod gate;
pub mod producer;
pub mod replay;
pub mod server;
pub mod session;

pub use backoff::Backoff;
pub use config::{
    BackoffConfig, ConfigError, PlayerConfig, ServerConfig, SessionConfig, SourceSelect,
};
pub use connector::{CloseHandle, Connector, TcpConnector};
pub use error::{ConnectionError, LogError, SessionError, SourceError};
pub use producer::{FrameProducer, SimulationSource};
pub use replay::{
    IndexEntry, LogCursor, LogHandle, LogPlayer, PlaybackListener, PlaybackState, PlaybackStatus,
};
pub use server::{ConnectionEvent, ConnectionListener, ConnectionState, ServerConnection};
pub use session::Session;
