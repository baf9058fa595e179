//! Transport abstraction for the live source.
//!
//! The reader thread only needs a byte stream and a way for another
//! thread to unblock a pending read. [`TcpConnector`] provides both over
//! TCP; tests substitute scripted connectors that refuse, disconnect or
//! serve canned bytes.

use std::io::{self, Read};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Closes a transport from another thread, unblocking its reader.
pub struct CloseHandle {
    close: Box<dyn Fn() + Send>,
}

impl CloseHandle {
    /// Wrap a close action.
    pub fn new(close: impl Fn() + Send + 'static) -> Self {
        Self {
            close: Box::new(close),
        }
    }

    /// A handle that does nothing, for transports that end on their own.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Close the transport. Calling this more than once is harmless.
    pub fn close(&self) {
        (self.close)();
    }
}

impl std::fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CloseHandle")
    }
}

/// An open transport: the read half and its close handle.
pub type Transport = (Box<dyn Read + Send>, CloseHandle);

/// Opens transports to a simulation server.
pub trait Connector: Send + Sync + 'static {
    /// Connect to `host:port`, giving up after `timeout`.
    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Transport>;
}

/// Plain TCP.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Transport> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    let closer = stream.try_clone()?;
                    let handle = CloseHandle::new(move || {
                        let _ = closer.shutdown(Shutdown::Both);
                    });
                    return Ok((Box::new(stream), handle));
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{host}:{port} resolved to no address"),
            )
        }))
    }
}
