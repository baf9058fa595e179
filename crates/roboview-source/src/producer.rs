//! The common surface of live and recorded sources.

use roboview_core::{FrameReceiver, SourceEvent};

use crate::error::SourceError;
use crate::replay::LogPlayer;
use crate::server::ServerConnection;

/// A thread that decodes frames and queues them for a
/// [`WorldModel`](roboview_scene::WorldModel).
///
/// # Pause and swap
///
/// [`pause`](Self::pause) returns only once no push is in flight; until
/// [`resume`](Self::resume) the queue receives nothing. Between the two
/// the owner may [`drain`](Self::drain) the queue and replace the world
/// model without `update()` ever observing a half-swapped state.
pub trait FrameProducer: Send + Sync {
    /// Begin producing. Idempotent for sources that start on
    /// construction.
    fn start(&self) -> Result<(), SourceError>;

    /// Take the next queued event without blocking, for consumers that
    /// do not go through a world model.
    fn poll(&self) -> Option<SourceEvent> {
        self.events().try_next()
    }

    /// Stop delivering events. No push is in flight when this returns.
    fn pause(&self);

    /// Resume delivery after [`pause`](Self::pause).
    fn resume(&self);

    /// Remove every queued event.
    fn drain(&self) -> Vec<SourceEvent>;

    /// Stop the producer thread and drain the queue. Idempotent.
    fn shutdown(&self);

    /// Consumer end of the event queue.
    fn events(&self) -> FrameReceiver;
}

impl FrameProducer for ServerConnection {
    fn start(&self) -> Result<(), SourceError> {
        let config = self.config();
        self.connect(&config.host, config.port)
    }

    fn pause(&self) {
        ServerConnection::pause(self);
    }

    fn resume(&self) {
        ServerConnection::resume(self);
    }

    fn drain(&self) -> Vec<SourceEvent> {
        ServerConnection::drain(self)
    }

    fn shutdown(&self) {
        ServerConnection::shutdown(self);
    }

    fn events(&self) -> FrameReceiver {
        ServerConnection::events(self)
    }
}

impl FrameProducer for LogPlayer {
    /// The pacing thread starts at open; this only reports whether it is
    /// still alive.
    fn start(&self) -> Result<(), SourceError> {
        if self.is_shut_down() {
            return Err(SourceError::ShutDown);
        }
        Ok(())
    }

    fn pause(&self) {
        self.hold();
    }

    fn resume(&self) {
        self.release();
    }

    fn drain(&self) -> Vec<SourceEvent> {
        LogPlayer::drain(self)
    }

    fn shutdown(&self) {
        LogPlayer::shutdown(self);
    }

    fn events(&self) -> FrameReceiver {
        LogPlayer::events(self)
    }
}

/// The source a session runs on.
#[derive(Debug)]
pub enum SimulationSource {
    /// A simulation server over TCP.
    Live(ServerConnection),
    /// A recorded log file.
    Log(LogPlayer),
}

impl SimulationSource {
    fn producer(&self) -> &dyn FrameProducer {
        match self {
            SimulationSource::Live(server) => server,
            SimulationSource::Log(player) => player,
        }
    }

    /// The live connection, if this is a live source.
    pub fn as_live(&self) -> Option<&ServerConnection> {
        match self {
            SimulationSource::Live(server) => Some(server),
            SimulationSource::Log(_) => None,
        }
    }

    /// The log player, if this is a recorded source.
    pub fn as_log(&self) -> Option<&LogPlayer> {
        match self {
            SimulationSource::Log(player) => Some(player),
            SimulationSource::Live(_) => None,
        }
    }
}

impl FrameProducer for SimulationSource {
    fn start(&self) -> Result<(), SourceError> {
        self.producer().start()
    }

    fn poll(&self) -> Option<SourceEvent> {
        self.producer().poll()
    }

    fn pause(&self) {
        self.producer().pause();
    }

    fn resume(&self) {
        self.producer().resume();
    }

    fn drain(&self) -> Vec<SourceEvent> {
        self.producer().drain()
    }

    fn shutdown(&self) {
        self.producer().shutdown();
    }

    fn events(&self) -> FrameReceiver {
        self.producer().events()
    }
}
