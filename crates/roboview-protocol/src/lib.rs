//! Scene-description wire codec for roboview.
//!
//! Decodes the S-expression scene protocol spoken by the simulation
//! server into [`Frame`](roboview_core::Frame)s, and encodes frames back
//! into the same textual form for recording.
//!
//! # Architecture
//!
//! - [`Decoder`] turns one message into a frame, carrying per-stream
//!   context (the play-mode table) between messages
//! - [`framing`] splits byte streams into messages (length-prefixed or
//!   newline-delimited)
//! - [`encode_frame`] and [`LogWriter`] produce logs the player can read
//!
//! # Format
//!
//! ```text
//! (delta 12.34 (upd ball (pos 1 0 0.11)) (game (mode 3) (score 1 0)))
//! ```
//!
//! Fields absent from a command leave the current value unchanged.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod framing;
mod lexer;
pub mod writer;

pub use decoder::{decode, peek_header, Decoder};
pub use encoder::encode_frame;
pub use error::{DecodeError, DecodeErrorKind};
pub use framing::{read_message, write_message, Framing, MessageReader, RawMessage, MAX_MESSAGE_LEN};
pub use writer::LogWriter;

/// Default TCP port of the simulation server's monitor interface.
pub const DEFAULT_PORT: u16 = 3200;
