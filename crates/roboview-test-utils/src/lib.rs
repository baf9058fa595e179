//! Test fixtures for roboview development.
//!
//! Canned frame sequences and helpers that write them to temporary log
//! files in either framing. Shared by the integration tests and benches
//! of every crate in the workspace.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::io::{self, Write};

use roboview_core::Frame;
use roboview_protocol::{Framing, LogWriter};
use tempfile::NamedTempFile;

pub use fixtures::{
    ball_scenario, moving_team, play_mode_table, walking_agent, TEAM_PLAY_MODES,
};

/// Write `frames` to a fresh temporary log file.
///
/// The file is deleted when the returned handle is dropped.
pub fn temp_log(frames: &[Frame], framing: Framing) -> io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    {
        let mut writer = LogWriter::new(file.as_file_mut(), framing);
        for frame in frames {
            writer.write_frame(frame)?;
        }
        writer.flush()?;
    }
    Ok(file)
}

/// Write raw bytes to a fresh temporary file, for corrupt-log tests.
pub fn temp_file_with(bytes: &[u8]) -> io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// Encode `frames` as a line-framed log in memory.
pub fn encode_lines(frames: &[Frame]) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut writer = LogWriter::new(&mut buf, Framing::Lines);
    for frame in frames {
        // Writing to a Vec only fails on embedded newlines, which the
        // encoder never produces.
        let _ = writer.write_frame(frame);
    }
    drop(writer);
    buf
}
