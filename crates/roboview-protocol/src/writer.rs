//! Log recording writer.
//!
//! [`LogWriter`] streams frames to any `Write` sink in either log framing.
//! Logs written here are what the log player indexes and replays.

use std::io::{self, Write};

use roboview_core::Frame;

use crate::encoder::encode_frame;
use crate::framing::{write_message, Framing};

/// Writes frames as a log.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production
/// code can use `BufWriter<File>`.
///
/// # Examples
///
/// ```
/// use roboview_core::{Command, Frame};
/// use roboview_protocol::{Framing, LogWriter, MessageReader, decode};
/// use glam::Vec3;
///
/// let mut buf = Vec::new();
/// let mut writer = LogWriter::new(&mut buf, Framing::Lines);
/// writer.write_frame(&Frame::full(0.0).with(Command::create_at("ball", Vec3::ZERO))).unwrap();
/// writer.write_frame(&Frame::delta(0.02).with(Command::move_to("ball", Vec3::X))).unwrap();
/// assert_eq!(writer.frames_written(), 2);
/// drop(writer);
///
/// let mut reader = MessageReader::new(buf.as_slice(), Framing::Lines, 0);
/// let first = reader.next_message().unwrap().unwrap();
/// assert!(decode(&first.bytes).unwrap().is_full());
/// ```
pub struct LogWriter<W: Write> {
    writer: W,
    framing: Framing,
    frames_written: u64,
}

impl<W: Write> LogWriter<W> {
    /// Create a writer using `framing`. Nothing is written until the first frame.
    pub fn new(writer: W, framing: Framing) -> Self {
        Self {
            writer,
            framing,
            frames_written: 0,
        }
    }

    /// Encode and append one frame.
    pub fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        self.write_raw(encode_frame(frame).as_bytes())
    }

    /// Append an already encoded message verbatim.
    ///
    /// Used to tee a live stream into a log without re-encoding.
    pub fn write_raw(&mut self, message: &[u8]) -> io::Result<()> {
        match self.framing {
            Framing::LengthPrefixed => write_message(&mut self.writer, message)?,
            Framing::Lines => {
                if message.contains(&b'\n') {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "line-framed logs cannot hold messages containing newlines",
                    ));
                }
                self.writer.write_all(message)?;
                self.writer.write_all(b"\n")?;
            }
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Consume the writer and return the underlying `Write` sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::framing::MessageReader;
    use glam::Vec3;
    use roboview_core::Command;

    fn frames() -> Vec<Frame> {
        (0..4)
            .map(|i| {
                Frame::delta(i as f64 * 0.02).with(Command::move_to("ball", Vec3::new(i as f32, 0.0, 0.0)))
            })
            .collect()
    }

    fn read_back(buf: &[u8], framing: Framing) -> Vec<Frame> {
        let mut reader = MessageReader::new(buf, framing, 0);
        let mut dec = Decoder::new();
        let mut out = Vec::new();
        while let Some(m) = reader.next_message().unwrap() {
            out.push(dec.decode(&m.bytes).unwrap());
        }
        out
    }

    #[test]
    fn both_framings_read_back() {
        for framing in [Framing::Lines, Framing::LengthPrefixed] {
            let mut writer = LogWriter::new(Vec::new(), framing);
            for f in frames() {
                writer.write_frame(&f).unwrap();
            }
            assert_eq!(writer.frames_written(), 4);
            let buf = writer.into_inner();
            assert_eq!(Framing::detect(buf[0]), framing);
            assert_eq!(read_back(&buf, framing), frames());
        }
    }

    #[test]
    fn newline_in_line_framed_message_is_refused() {
        let mut writer = LogWriter::new(Vec::new(), Framing::Lines);
        assert!(writer.write_raw(b"(delta 1\n)").is_err());
        assert_eq!(writer.frames_written(), 0);
    }
}
