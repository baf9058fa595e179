//! roboview: simulation-state ingestion and replay for 3D soccer
//! simulation viewers.
//!
//! This is the top-level facade crate that re-exports the public API of
//! the roboview sub-crates. A render layer usually depends on this crate
//! alone, opens a [`Session`](source::Session) and calls
//! [`update`](source::Session::update) once per tick.
//!
//! # Quick start
//!
//! ```rust
//! use roboview::prelude::*;
//!
//! let frame = roboview::protocol::decode(
//!     b"(delta 0.02 (new ball (pos 1 0 0.11)) (game (mode PlayOn) (score 1 0)))",
//! )
//! .unwrap();
//!
//! let mut graph = SceneGraph::new();
//! let mut game = GameState::default();
//! let diff = graph.apply_frame(&frame);
//! game.apply_frame(&frame);
//!
//! assert_eq!(diff.added.len(), 1);
//! assert_eq!(graph.node_by_path("ball").unwrap().transform().position.x, 1.0);
//! assert_eq!(game.score, (1, 0));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `roboview-core` | Frames, commands, ids, transforms, the event queue |
//! | [`protocol`] | `roboview-protocol` | Message decoding, encoding, framing, log writing |
//! | [`scene`] | `roboview-scene` | Scene graph, game state, world model |
//! | [`source`] | `roboview-source` | Live connection, log player, sessions |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Frames, commands, ids and the event queue (`roboview-core`).
pub use roboview_core as types;

/// Wire codec and log framing (`roboview-protocol`).
///
/// [`protocol::Decoder`] turns messages into frames;
/// [`protocol::LogWriter`] records frames to a log the player can read.
pub use roboview_protocol as protocol;

/// Scene graph, game state and the world model (`roboview-scene`).
pub use roboview_scene as scene;

/// Frame sources and sessions (`roboview-source`).
///
/// [`source::ServerConnection`] for a live server,
/// [`source::LogPlayer`] for recorded logs, [`source::Session`] to wire
/// either to a world model.
pub use roboview_source as source;

/// Common imports for typical roboview usage.
///
/// ```rust
/// use roboview::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use roboview_core::{Command, Frame, FrameKind, NodeFields, NodeId, SourceEvent, Transform};

    // Protocol
    pub use roboview_protocol::{DecodeError, Decoder, Framing};

    // Scene
    pub use roboview_scene::{
        GameState, SceneDiff, SceneGraph, SceneGraphListener, SceneNode, SourceMode, WorldConfig,
        WorldModel,
    };

    // Sources
    pub use roboview_source::{
        ConnectionEvent, ConnectionListener, ConnectionState, FrameProducer, LogPlayer,
        PlaybackListener, PlaybackState, PlaybackStatus, PlayerConfig, ServerConfig,
        ServerConnection, Session, SessionConfig, SimulationSource, SourceSelect,
    };

    // Errors
    pub use roboview_source::{LogError, SessionError};
}
