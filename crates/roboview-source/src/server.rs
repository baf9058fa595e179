//! Live source: a reconnecting client of the simulation server.
//!
//! # State machine
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──ok──> Connected
//!                                 ^  │               │
//!                          backoff│  │refused        │lost / decode error
//!                                 │  v               │
//!                                Error <─────────────┘
//! any state ──shutdown()──> Disconnected
//! ```
//!
//! The reader thread owns the transport and the decoder. Every
//! successful connect pushes [`SourceEvent::SessionStart`] before the
//! first frame, so the world model starts from an empty scene on each
//! new server session. Frames are pushed drop-oldest: a stalled render
//! thread costs frames, never latency.

use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use roboview_core::{
    FrameQueue, FrameReceiver, FrameSender, ListenerSet, OverflowPolicy, SourceEvent,
};
use roboview_protocol::{read_message, Decoder};

use crate::backoff::Backoff;
use crate::config::{ConfigError, ServerConfig};
use crate::connector::{CloseHandle, Connector, TcpConnector};
use crate::error::{ConnectionError, SourceError};
use crate::gate::DeliveryGate;

// ── Events ───────────────────────────────────────────────────────

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not started, or shut down.
    Disconnected,
    /// A connect attempt is in progress.
    Connecting,
    /// Streaming frames.
    Connected,
    /// The last attempt or stream failed; waiting out the backoff.
    Error,
}

/// One state transition, as delivered to [`ConnectionListener`]s.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionEvent {
    /// The new state.
    pub state: ConnectionState,
    /// Attempt number since the last successful connect, starting at 1.
    /// Zero for [`ConnectionState::Disconnected`] and for the error that
    /// reports a lost stream.
    pub attempt: u32,
    /// Delay before the next attempt, set only in
    /// [`ConnectionState::Error`].
    pub backoff: Option<Duration>,
    /// What failed, set only in [`ConnectionState::Error`].
    pub reason: Option<String>,
}

/// Capability of components that follow the live connection.
///
/// Called on the reader thread. Never called after
/// [`ServerConnection::shutdown`] returns.
pub trait ConnectionListener: Send + Sync {
    /// The connection changed state.
    fn connection_changed(&self, event: &ConnectionEvent);
}

// ── Shared state ─────────────────────────────────────────────────

struct Shared {
    state: Mutex<ConnectionState>,
    listeners: ListenerSet<dyn ConnectionListener>,
    closer: Mutex<Option<CloseHandle>>,
    gate: DeliveryGate,
    shutdown: AtomicBool,
}

impl Shared {
    fn closer(&self) -> MutexGuard<'_, Option<CloseHandle>> {
        self.closer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, event: ConnectionEvent) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = event.state;
        match event.state {
            ConnectionState::Error => log::warn!(
                "connection attempt {} failed: {}; retrying in {:?}",
                event.attempt,
                event.reason.as_deref().unwrap_or("unknown error"),
                event.backoff.unwrap_or_default()
            ),
            state => log::info!("connection {state:?} (attempt {})", event.attempt),
        }
        self.listeners.notify(|l| l.connection_changed(&event));
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

// ── ServerConnection ─────────────────────────────────────────────

/// Reconnecting live source.
///
/// All methods take `&self` so the connection can be shared with a
/// thread that only needs to shut it down.
pub struct ServerConnection {
    config: ServerConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    sender: FrameSender,
    receiver: FrameReceiver,
    // Dropping the sender wakes the reader out of its backoff wait.
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

// Compile-time assertion: shareable across threads.
const _: () = {
    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send_sync::<ServerConnection>();
    }
};

impl ServerConnection {
    /// A TCP connection with `config`. Nothing happens until
    /// [`connect`](Self::connect).
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        Self::with_connector(config, Arc::new(TcpConnector))
    }

    /// A connection using a custom transport.
    pub fn with_connector(
        config: ServerConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (sender, receiver) = FrameQueue::new(config.queue_capacity, OverflowPolicy::DropOldest);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        Ok(Self {
            config,
            connector,
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectionState::Disconnected),
                listeners: ListenerSet::new(),
                closer: Mutex::new(None),
                gate: DeliveryGate::new(),
                shutdown: AtomicBool::new(false),
            }),
            sender,
            receiver,
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx,
            reader: Mutex::new(None),
        })
    }

    /// The configuration this connection was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a listener.
    pub fn add_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.shared.listeners.add(listener);
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn ConnectionListener>) -> bool {
        self.shared.listeners.remove(listener)
    }

    /// Consumer end of the event queue.
    pub fn events(&self) -> FrameReceiver {
        self.receiver.clone()
    }

    /// Start the reader thread against `host:port`.
    ///
    /// Returns immediately; progress is reported to listeners. Fails if
    /// the reader is already running or the connection was shut down.
    pub fn connect(&self, host: &str, port: u16) -> Result<(), SourceError> {
        if self.shared.is_shutdown() {
            return Err(SourceError::ShutDown);
        }
        let mut reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        // Shutdown sets the flag before taking this lock; a reader spawned
        // past this check is joined by it.
        if self.shared.is_shutdown() {
            return Err(SourceError::ShutDown);
        }
        if reader.is_some() {
            return Err(SourceError::AlreadyStarted);
        }
        let worker = ReaderLoop {
            host: host.to_owned(),
            port,
            timeout: self.config.connect_timeout,
            backoff: Backoff::new(self.config.backoff.clone()),
            connector: Arc::clone(&self.connector),
            shared: Arc::clone(&self.shared),
            sender: self.sender.clone(),
            stop: self.stop_rx.clone(),
        };
        let handle = thread::Builder::new()
            .name("roboview-server-reader".into())
            .spawn(move || worker.run())?;
        *reader = Some(handle);
        Ok(())
    }

    /// Whether the reader thread is running.
    pub fn is_running(&self) -> bool {
        self.reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Stop delivering frames until [`resume`](Self::resume). The reader
    /// keeps its connection and waits before its next push.
    ///
    /// When this returns no push is in flight.
    pub fn pause(&self) {
        self.shared.gate.hold();
    }

    /// Resume delivery after [`pause`](Self::pause).
    pub fn resume(&self) {
        self.shared.gate.release();
    }

    /// Remove every queued event.
    pub fn drain(&self) -> Vec<SourceEvent> {
        self.receiver.drain()
    }

    /// Close the socket, join the reader and drain the queue.
    ///
    /// Idempotent and callable from any thread. No listener is notified
    /// after this returns.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(closer) = self.shared.closer().take() {
            closer.close();
        }
        let handle = self.reader.lock().unwrap_or_else(|e| e.into_inner()).take();
        match handle {
            Some(handle) => {
                if handle.join().is_err() {
                    log::error!("server reader thread panicked");
                }
            }
            None => {
                *self.shared.state.lock().unwrap_or_else(|e| e.into_inner()) =
                    ConnectionState::Disconnected;
            }
        }
        let dropped = self.receiver.drain().len();
        log::debug!("server connection shut down, {dropped} queued events discarded");
    }
}

impl Drop for ServerConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConnection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state())
            .finish()
    }
}

// ── Reader thread ────────────────────────────────────────────────

/// How long a paused reader sleeps between shutdown checks.
const PAUSE_POLL: Duration = Duration::from_millis(50);

struct ReaderLoop {
    host: String,
    port: u16,
    timeout: Duration,
    backoff: Backoff,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    sender: FrameSender,
    stop: Receiver<()>,
}

impl ReaderLoop {
    fn run(mut self) {
        let mut attempt = 0u32;
        while !self.shared.is_shutdown() {
            attempt += 1;
            self.shared.transition(ConnectionEvent {
                state: ConnectionState::Connecting,
                attempt,
                backoff: None,
                reason: None,
            });
            let failure = match self.connector.connect(&self.host, self.port, self.timeout) {
                Ok((reader, closer)) => {
                    *self.shared.closer() = Some(closer);
                    // shutdown() may have run between connect and storing
                    // the handle; it would have found nothing to close.
                    if self.shared.is_shutdown() {
                        if let Some(closer) = self.shared.closer().take() {
                            closer.close();
                        }
                        break;
                    }
                    self.backoff.reset();
                    self.shared.transition(ConnectionEvent {
                        state: ConnectionState::Connected,
                        attempt,
                        backoff: None,
                        reason: None,
                    });
                    attempt = 0;
                    let result = self.stream(reader);
                    self.shared.closer().take();
                    result
                }
                Err(e) => ConnectionError::Io(e),
            };
            if self.shared.is_shutdown() {
                break;
            }
            let delay = self.backoff.next_delay();
            self.shared.transition(ConnectionEvent {
                state: ConnectionState::Error,
                attempt,
                backoff: Some(delay),
                reason: Some(failure.to_string()),
            });
            match self.stop.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.shared.transition(ConnectionEvent {
            state: ConnectionState::Disconnected,
            attempt: 0,
            backoff: None,
            reason: None,
        });
    }

    /// Read, decode and push until the stream fails.
    fn stream(&mut self, reader: Box<dyn std::io::Read + Send>) -> ConnectionError {
        let mut reader = BufReader::new(reader);
        let mut decoder = Decoder::new();
        if !self.deliver(SourceEvent::SessionStart) {
            return ConnectionError::Closed;
        }
        loop {
            let bytes = match read_message(&mut reader) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => return ConnectionError::Closed,
                Err(e) => return ConnectionError::Io(e),
            };
            match decoder.decode(&bytes) {
                Ok(frame) => {
                    if !self.deliver(SourceEvent::Frame(frame)) {
                        return ConnectionError::Closed;
                    }
                }
                Err(e) => {
                    log::error!("dropping connection after undecodable message: {e}");
                    return ConnectionError::Decode(e);
                }
            }
        }
    }

    /// Push through the gate, waiting while paused. Returns `false` once
    /// shutdown is requested.
    fn deliver(&self, event: SourceEvent) -> bool {
        let mut event = Some(event);
        loop {
            if self.shared.is_shutdown() {
                return false;
            }
            let pushed = self.shared.gate.pass_within(PAUSE_POLL, || {
                event.take().map(|e| self.sender.push(e))
            });
            match pushed {
                Some(Some(Ok(()))) => return true,
                Some(Some(Err(_))) => return false,
                Some(None) => return true,
                None => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct Refusing {
        calls: AtomicU32,
    }

    impl Connector for Refusing {
        fn connect(
            &self,
            _host: &str,
            _port: u16,
            _timeout: Duration,
        ) -> std::io::Result<crate::connector::Transport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(std::io::ErrorKind::ConnectionRefused.into())
        }
    }

    fn fast_config() -> ServerConfig {
        ServerConfig {
            backoff: crate::config::BackoffConfig {
                initial: Duration::from_millis(1),
                max: Duration::from_millis(4),
                factor: 2.0,
            },
            ..ServerConfig::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = ServerConfig {
            queue_capacity: 0,
            ..ServerConfig::default()
        };
        assert!(ServerConnection::new(cfg).is_err());
    }

    #[test]
    fn shutdown_is_idempotent_and_terminal() {
        let connector = Arc::new(Refusing {
            calls: AtomicU32::new(0),
        });
        let conn = ServerConnection::with_connector(fast_config(), connector.clone()).unwrap();
        conn.connect("localhost", 3200).unwrap();
        assert!(matches!(
            conn.connect("localhost", 3200),
            Err(SourceError::AlreadyStarted)
        ));
        thread::sleep(Duration::from_millis(20));
        conn.shutdown();
        conn.shutdown();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.is_running());
        let calls = connector.calls.load(Ordering::SeqCst);
        assert!(calls >= 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(connector.calls.load(Ordering::SeqCst), calls);
        assert!(matches!(
            conn.connect("localhost", 3200),
            Err(SourceError::ShutDown)
        ));
    }

    #[test]
    fn shutdown_before_connect() {
        let conn = ServerConnection::new(ServerConfig::default()).unwrap();
        conn.shutdown();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }
}
