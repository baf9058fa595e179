//! Benchmark profiles for roboview.
//!
//! - [`match_profile`]: a full 11-a-side match excerpt
//! - [`encoded`]: the same frames as wire messages

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use roboview_core::Frame;
use roboview_protocol::encode_frame;
use roboview_test_utils::moving_team;

/// Agents on the field in a full match.
pub const AGENTS: usize = 22;

/// `frames` frames of a full match, with a full frame every 50 frames
/// (one per simulated second).
pub fn match_profile(frames: usize) -> Vec<Frame> {
    moving_team(frames, AGENTS, 50)
}

/// Encode `frames` as wire messages.
pub fn encoded(frames: &[Frame]) -> Vec<String> {
    frames.iter().map(encode_frame).collect()
}
