//! The world model: authoritative scene state for one session.
//!
//! [`WorldModel`] owns the [`SceneGraph`] and the [`GameState`] and is the
//! only place either is mutated. Producers push [`SourceEvent`]s onto a
//! bounded queue; the render thread calls [`update()`](WorldModel::update)
//! once per tick, which drains a bounded batch and applies it in arrival
//! order.
//!
//! # Ownership model
//!
//! `WorldModel` is [`Send`] but every mutating method takes `&mut self`,
//! so a session swap (pause, drain, swap, resume) done under `&mut`
//! access can never be observed half-way by `update()`.

use std::sync::Arc;

use roboview_core::{Frame, FrameReceiver, SourceEvent};

use crate::config::{ConfigError, WorldConfig};
use crate::game_state::GameState;
use crate::graph::SceneGraph;
use crate::listener::SceneGraphListener;

const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<WorldModel>();
    }
};

/// Which kind of source feeds the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceMode {
    /// A simulation server over TCP.
    Live,
    /// A recorded log file.
    LogFile,
}

/// What one [`WorldModel::update`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Frames applied.
    pub applied: usize,
    /// Session starts processed.
    pub sessions_started: usize,
    /// Events still queued after this call.
    pub backlog: usize,
}

// ── WorldModel ──────────────────────────────────────────────────

/// Scene graph plus game state, fed from one frame source.
pub struct WorldModel {
    config: WorldConfig,
    mode: SourceMode,
    graph: SceneGraph,
    game: GameState,
    source: Option<FrameReceiver>,
    clock_ms: f64,
}

impl WorldModel {
    /// Create an empty world for a source of kind `mode`.
    pub fn init(config: WorldConfig, mode: SourceMode) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            mode,
            graph: SceneGraph::new(),
            game: GameState::default(),
            source: None,
            clock_ms: 0.0,
        })
    }

    /// The source kind recorded at construction.
    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    /// The configuration this world was built with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Wire the consumer end of a source's queue, replacing any previous one.
    pub fn attach_source(&mut self, receiver: FrameReceiver) {
        self.source = Some(receiver);
    }

    /// Unwire the current source, returning its receiver.
    pub fn detach_source(&mut self) -> Option<FrameReceiver> {
        self.source.take()
    }

    /// Whether a source is wired.
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Render time accumulated through [`update`](Self::update), in
    /// milliseconds.
    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    /// Drain up to `max_frames_per_update` queued events and apply them.
    ///
    /// Never blocks. Without a source this only advances the clock.
    pub fn update(&mut self, elapsed_ms: f64) -> UpdateReport {
        self.clock_ms += elapsed_ms;
        let mut report = UpdateReport::default();
        let Some(source) = self.source.clone() else {
            return report;
        };
        for _ in 0..self.config.max_frames_per_update {
            let Some(event) = source.try_next() else {
                break;
            };
            match event {
                SourceEvent::SessionStart => report.sessions_started += 1,
                SourceEvent::Frame(_) => report.applied += 1,
            }
            self.apply_event(event);
        }
        report.backlog = source.len();
        if report.backlog > 0 {
            log::debug!("{} events left queued after update", report.backlog);
        }
        report
    }

    /// Apply one queue event.
    pub fn apply_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::SessionStart => self.restart_session(),
            SourceEvent::Frame(frame) => self.apply_frame(&frame),
        }
    }

    /// Apply one frame to the graph and the game state.
    pub fn apply_frame(&mut self, frame: &Frame) {
        self.game.apply_frame(frame);
        self.graph.apply_frame(frame);
    }

    /// Replace the graph and game state with empty ones, keeping listeners.
    fn restart_session(&mut self) {
        log::debug!("session start: replacing scene graph");
        let fresh = SceneGraph::new();
        fresh.adopt_listeners(&self.graph);
        self.graph = fresh;
        self.game = GameState::default();
    }

    // ── Scene access ────────────────────────────────────────────

    /// The current scene graph.
    pub fn scene_graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Move the current graph out, leaving an empty one that keeps the
    /// registered listeners.
    ///
    /// Listeners are not notified: the graph is expected to be handed to
    /// [`set_scene_graph`](Self::set_scene_graph), which does.
    pub fn take_scene_graph(&mut self) -> SceneGraph {
        let fresh = SceneGraph::new();
        fresh.steal_listeners(&self.graph);
        std::mem::replace(&mut self.graph, fresh)
    }

    /// Install `graph` as the current scene, for example one preserved
    /// across a render-context reset. Listeners of the current graph move
    /// to `graph` and are told about the replacement.
    pub fn set_scene_graph(&mut self, graph: SceneGraph) {
        graph.adopt_listeners(&self.graph);
        self.graph = graph;
    }

    /// Move every scene listener registered on `previous` onto this world
    /// and tell them about the replacement.
    pub fn transfer_listeners(&mut self, previous: &WorldModel) {
        self.graph.adopt_listeners(&previous.graph);
    }

    /// The current game state.
    pub fn game_state(&self) -> &GameState {
        &self.game
    }

    /// Install a game state, typically alongside [`set_scene_graph`](Self::set_scene_graph).
    pub fn set_game_state(&mut self, game: GameState) {
        self.game = game;
    }

    /// Register a scene listener. It survives graph replacement.
    pub fn add_scene_graph_listener(&self, listener: Arc<dyn SceneGraphListener>) {
        self.graph.add_listener(listener);
    }

    /// Remove a scene listener.
    pub fn remove_scene_graph_listener(&self, listener: &Arc<dyn SceneGraphListener>) -> bool {
        self.graph.remove_listener(listener)
    }
}

impl std::fmt::Debug for WorldModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldModel")
            .field("mode", &self.mode)
            .field("graph", &self.graph)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}
