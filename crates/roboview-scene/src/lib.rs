//! Scene graph, game state and world model for roboview.
//!
//! The [`WorldModel`] is the authoritative owner of the scene: it drains
//! decoded frames from the active source's queue once per render tick
//! and applies them to its [`SceneGraph`] and [`GameState`]. Frame
//! application is single-threaded; producers never touch the graph.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod game_state;
pub mod graph;
pub mod listener;
pub mod node;
pub mod world;

pub use config::{ConfigError, WorldConfig};
pub use game_state::{BallState, GameState};
pub use graph::SceneGraph;
pub use listener::{SceneDiff, SceneGraphListener};
pub use node::SceneNode;
pub use world::{SourceMode, UpdateReport, WorldModel};
