//! One world model fed by one source.

use std::mem;

use roboview_scene::{SourceMode, UpdateReport, WorldModel};

use crate::config::{SessionConfig, SourceSelect};
use crate::error::SessionError;
use crate::producer::{FrameProducer, SimulationSource};
use crate::replay::LogPlayer;
use crate::server::ServerConnection;

/// A running session: a [`WorldModel`] wired to the queue of a
/// [`SimulationSource`].
///
/// The session owns both halves, so replacing the world happens under
/// `&mut self` and [`update`](Self::update) can never observe a world
/// mid-swap.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    world: WorldModel,
    source: SimulationSource,
}

impl Session {
    /// Validate `config`, build the world and the source, wire them and
    /// start producing.
    ///
    /// A log that cannot be opened fails here; a live server that is not
    /// yet reachable does not, the reader keeps retrying in the
    /// background.
    pub fn open(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let (mode, source) = match &config.source {
            SourceSelect::Live(server) => (
                SourceMode::Live,
                SimulationSource::Live(ServerConnection::new(server.clone())?),
            ),
            SourceSelect::Log { path, player } => (
                SourceMode::LogFile,
                SimulationSource::Log(LogPlayer::open(path, player.clone())?),
            ),
        };
        let mut world = WorldModel::init(config.world.clone(), mode)?;
        world.attach_source(source.events());
        source.start()?;
        log::info!("session opened in {mode:?} mode");
        Ok(Self {
            config,
            world,
            source,
        })
    }

    /// The configuration the session was opened with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Apply queued events; call once per render tick.
    pub fn update(&mut self, elapsed_ms: f64) -> UpdateReport {
        self.world.update(elapsed_ms)
    }

    /// The world model.
    pub fn world(&self) -> &WorldModel {
        &self.world
    }

    /// The source feeding the world.
    pub fn source(&self) -> &SimulationSource {
        &self.source
    }

    /// Replace the world model with a freshly constructed one.
    ///
    /// The source is paused and its queue drained into the old world
    /// first. With `preserve_scene` the new world takes over the old
    /// scene graph and game state as they are; otherwise a log source
    /// re-sends the state at its current position, and a live source
    /// starts from an empty scene that fills in as frames arrive. Scene
    /// listeners move to the new world and are told about the
    /// replacement. Delivery resumes before this returns.
    pub fn reset_world(&mut self, preserve_scene: bool) -> Result<(), SessionError> {
        self.source.pause();
        let result = self.swap_world(preserve_scene);
        self.source.resume();
        result
    }

    fn swap_world(&mut self, preserve_scene: bool) -> Result<(), SessionError> {
        let drained = self.source.drain();
        let count = drained.len();
        for event in drained {
            self.world.apply_event(event);
        }

        let mut fresh = WorldModel::init(self.config.world.clone(), self.world.mode())?;
        if preserve_scene {
            fresh.set_scene_graph(self.world.take_scene_graph());
            fresh.set_game_state(self.world.game_state().clone());
        }
        fresh.transfer_listeners(&self.world);
        match (&self.source, preserve_scene) {
            (SimulationSource::Log(player), false) => player.set_world_model(&mut fresh),
            _ => fresh.attach_source(self.source.events()),
        }

        let mut old = mem::replace(&mut self.world, fresh);
        old.detach_source();
        log::info!(
            "world model reset (preserve_scene: {preserve_scene}, {count} queued events applied to the old world)"
        );
        Ok(())
    }

    /// Stop the source and drain its queue. Idempotent.
    pub fn shutdown(&self) {
        self.source.shutdown();
        log::info!("session shut down");
    }
}
