//! Message framing over byte streams.
//!
//! The server frames every message with a 4-byte big-endian length.
//! Recorded logs come either in that layout or as one message per line;
//! [`Framing::detect`] tells them apart from the first byte.

use std::io::{self, BufRead, ErrorKind, Read, Write};

/// Upper bound on a single message. Anything larger is treated as a
/// corrupt length prefix rather than allocated.
pub const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// How messages are delimited in a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Framing {
    /// `[u32 BE length][payload]` per message.
    LengthPrefixed,
    /// One message per line.
    Lines,
}

impl Framing {
    /// Guess the framing of a stream from its first byte.
    ///
    /// Text logs start with `(` (or whitespace); a length prefix below
    /// 16 MiB always starts with a zero byte.
    pub fn detect(first: u8) -> Self {
        if first == b'(' || first.is_ascii_whitespace() {
            Self::Lines
        } else {
            Self::LengthPrefixed
        }
    }
}

/// Read one length-prefixed message.
///
/// Returns `Ok(None)` on a clean end of stream (no byte of the next
/// header read). A stream ending inside a header or payload is an
/// `UnexpectedEof` error.
pub fn read_message<R: Read + ?Sized>(r: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match r.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "stream ended inside a length prefix",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_MESSAGE_LEN {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("message length {len} exceeds limit of {MAX_MESSAGE_LEN}"),
        ));
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(Some(payload))
}

/// Write one length-prefixed message.
pub fn write_message<W: Write + ?Sized>(w: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&n| n as usize <= MAX_MESSAGE_LEN)
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "message too large"))?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(payload)
}

/// One message read from a log, with its position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    /// Byte offset of the payload within the stream.
    pub offset: u64,
    /// Payload bytes, without prefix or line terminator.
    pub bytes: Vec<u8>,
}

/// Sequential message reader that tracks absolute stream offsets.
pub struct MessageReader<R: BufRead> {
    inner: R,
    framing: Framing,
    offset: u64,
}

impl<R: BufRead> MessageReader<R> {
    /// Start reading at stream offset `offset`.
    pub fn new(inner: R, framing: Framing, offset: u64) -> Self {
        Self {
            inner,
            framing,
            offset,
        }
    }

    /// Offset just past the last message returned.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next message, or `None` at end of stream.
    pub fn next_message(&mut self) -> io::Result<Option<RawMessage>> {
        match self.framing {
            Framing::LengthPrefixed => {
                let Some(bytes) = read_message(&mut self.inner)? else {
                    return Ok(None);
                };
                let offset = self.offset + 4;
                self.offset = offset + bytes.len() as u64;
                Ok(Some(RawMessage { offset, bytes }))
            }
            Framing::Lines => loop {
                let mut line = Vec::new();
                let n = self.inner.read_until(b'\n', &mut line)?;
                if n == 0 {
                    return Ok(None);
                }
                let offset = self.offset;
                self.offset += n as u64;
                while line.last().is_some_and(|b| b.is_ascii_whitespace()) {
                    line.pop();
                }
                let lead = line.iter().take_while(|b| b.is_ascii_whitespace()).count();
                if lead == line.len() {
                    continue;
                }
                line.drain(..lead);
                return Ok(Some(RawMessage {
                    offset: offset + lead as u64,
                    bytes: line,
                }));
            },
        }
    }
}
