//! Core types for the roboview scene ingestion and replay engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the codec, the scene graph and the frame
//! sources: node identifiers, transforms, decoded frames and their
//! commands, the bounded event queue between producer threads and the
//! render thread, and the observer registry used for notifications.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod command;
pub mod event;
pub mod id;
pub mod listener;
pub mod queue;
pub mod transform;

pub use command::{BallUpdate, Command, Frame, FrameKind, GameUpdate, NodeFields};
pub use event::SourceEvent;
pub use id::{Generation, NodeId, ROOT_PATH};
pub use listener::ListenerSet;
pub use queue::{
    FrameQueue, FrameReceiver, FrameSender, OverflowPolicy, SendError, TryPushError,
};
pub use transform::Transform;
