//! Frame index of a log file.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use roboview_core::FrameKind;
use roboview_protocol::{peek_header, DecodeError, DecodeErrorKind, Framing, MessageReader};

use crate::error::LogError;

/// Position and header of one frame in a log.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexEntry {
    /// Absolute byte offset of the message payload.
    pub offset: u64,
    /// Payload length in bytes.
    pub len: u32,
    /// Frame timestamp.
    pub time: f64,
    /// Delta or full.
    pub kind: FrameKind,
}

/// Immutable index of the frames in one log file.
///
/// Built by a single boundary scan that reads each message header but
/// decodes no commands. Scanning stops at the first message whose
/// framing or header is damaged; [`corrupt`](Self::corrupt) then holds
/// the error and every indexed frame lies before it.
#[derive(Clone, Debug)]
pub struct LogHandle {
    path: PathBuf,
    framing: Framing,
    entries: Vec<IndexEntry>,
    corrupt: Option<DecodeError>,
}

impl LogHandle {
    /// Open and scan the log at `path`.
    pub fn scan(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LogError::Open {
            path: path.to_owned(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let framing = detect_framing(&mut reader, path)?;
        Self::scan_reader(reader, framing, path)
    }

    /// Scan an already opened log positioned at its first byte.
    pub fn scan_reader<R: BufRead>(
        reader: R,
        framing: Framing,
        path: impl Into<PathBuf>,
    ) -> Result<Self, LogError> {
        let mut messages = MessageReader::new(reader, framing, 0);
        let mut entries = Vec::new();
        let mut corrupt = None;
        loop {
            let start = messages.offset();
            let msg = match messages.next_message() {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(e) if matches!(e.kind(), ErrorKind::UnexpectedEof | ErrorKind::InvalidData) => {
                    corrupt = Some(DecodeError {
                        offset: start,
                        reason: DecodeErrorKind::Truncated,
                    });
                    break;
                }
                Err(e) => return Err(LogError::Io(e)),
            };
            match peek_header(&msg.bytes) {
                Ok((kind, time)) => entries.push(IndexEntry {
                    offset: msg.offset,
                    // Messages are bounded by MAX_MESSAGE_LEN or by a line.
                    len: u32::try_from(msg.bytes.len()).unwrap_or(u32::MAX),
                    time,
                    kind,
                }),
                Err(e) => {
                    corrupt = Some(e.shifted(msg.offset));
                    break;
                }
            }
        }
        let path = path.into();
        if let Some(e) = &corrupt {
            log::warn!(
                "log {} is damaged after {} frames: {e}",
                path.display(),
                entries.len()
            );
        }
        Ok(Self {
            path,
            framing,
            entries,
            corrupt,
        })
    }

    /// Path of the indexed file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Framing detected from the first byte.
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Number of indexed frames.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no frame was indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in file order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Entry `index`, if indexed.
    pub fn entry(&self, index: usize) -> Option<&IndexEntry> {
        self.entries.get(index)
    }

    /// The damage that ended the scan, if any.
    pub fn corrupt(&self) -> Option<&DecodeError> {
        self.corrupt.as_ref()
    }

    /// Timestamps of the first and last frame.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((self.entries.first()?.time, self.entries.last()?.time))
    }

    /// Number of frames with a timestamp at or before `time`.
    ///
    /// Timestamps are assumed non-decreasing, as the server emits them.
    pub fn frames_until(&self, time: f64) -> usize {
        self.entries.partition_point(|e| e.time <= time)
    }

    /// Index of the last full frame strictly before frame `n`.
    pub fn full_frame_before(&self, n: usize) -> Option<usize> {
        let n = n.min(self.entries.len());
        self.entries[..n]
            .iter()
            .rposition(|e| e.kind == FrameKind::Full)
    }
}

/// Peek the first byte of `reader` to pick the framing.
pub(crate) fn detect_framing<R: BufRead>(reader: &mut R, path: &Path) -> Result<Framing, LogError> {
    let buf = reader.fill_buf()?;
    match buf.first() {
        Some(&b) => Ok(Framing::detect(b)),
        None => Err(LogError::Empty {
            path: path.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roboview_protocol::write_message;

    fn lines(text: &str) -> LogHandle {
        LogHandle::scan_reader(text.as_bytes(), Framing::Lines, "mem.log").unwrap()
    }

    #[test]
    fn indexes_lines_with_offsets() {
        let h = lines("(full 0 (new a))\n(delta 0.5)\n(delta 1.0 (del a))\n");
        assert_eq!(h.len(), 3);
        assert_eq!(h.entry(0).unwrap().kind, FrameKind::Full);
        assert_eq!(h.entry(1).unwrap().offset, 17);
        assert_eq!(h.entry(1).unwrap().len, 11);
        assert_eq!(h.time_range(), Some((0.0, 1.0)));
        assert!(h.corrupt().is_none());
    }

    #[test]
    fn time_and_anchor_lookup() {
        let h = lines("(full 0)\n(delta 1)\n(full 2)\n(delta 3)\n");
        assert_eq!(h.frames_until(-1.0), 0);
        assert_eq!(h.frames_until(0.0), 1);
        assert_eq!(h.frames_until(2.5), 3);
        assert_eq!(h.frames_until(99.0), 4);
        assert_eq!(h.full_frame_before(0), None);
        assert_eq!(h.full_frame_before(2), Some(0));
        assert_eq!(h.full_frame_before(3), Some(2));
        assert_eq!(h.full_frame_before(100), Some(2));
    }

    #[test]
    fn bad_header_stops_scan_with_absolute_offset() {
        let h = lines("(delta 0)\n(delta zz)\n(delta 2)\n");
        assert_eq!(h.len(), 1);
        let e = h.corrupt().unwrap();
        assert_eq!(e.offset, 10 + 7);
    }

    #[test]
    fn truncated_prefixed_log() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"(delta 0)").unwrap();
        write_message(&mut buf, b"(delta 1)").unwrap();
        buf.truncate(buf.len() - 3);
        let h = LogHandle::scan_reader(buf.as_slice(), Framing::LengthPrefixed, "mem.log").unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(h.corrupt().unwrap().offset, 13);
    }

    #[test]
    fn missing_file_is_open_error() {
        let err = LogHandle::scan("/definitely/not/here.log").unwrap_err();
        assert!(matches!(err, LogError::Open { .. }));
    }
}
