//! Headless viewer: drive a session without rendering and log what the
//! scene does.
//!
//! ```text
//! RUST_LOG=info cargo run --example headless -- path/to/match.log
//! RUST_LOG=info cargo run --example headless -- --live localhost:3200
//! ```
//!
//! Runs for ten seconds of wall time at a 60 Hz tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use roboview::prelude::*;
use roboview::protocol::DEFAULT_PORT;

const TICK: Duration = Duration::from_millis(16);
const RUN_FOR: Duration = Duration::from_secs(10);

struct SceneLogger;

impl SceneGraphListener for SceneLogger {
    fn scene_graph_changed(&self, graph: &SceneGraph, diff: &SceneDiff) {
        if !diff.added.is_empty() || !diff.removed.is_empty() {
            log::info!(
                "generation {:?}: +{} -{} nodes, {} total",
                graph.generation(),
                diff.added.len(),
                diff.removed.len(),
                graph.len()
            );
        }
    }

    fn scene_graph_replaced(&self, graph: &SceneGraph) {
        log::info!("scene replaced ({} nodes)", graph.len());
    }
}

struct StatusLogger;

impl ConnectionListener for StatusLogger {
    fn connection_changed(&self, event: &ConnectionEvent) {
        log::info!("connection {:?} (attempt {})", event.state, event.attempt);
    }
}

impl PlaybackListener for StatusLogger {
    fn playback_state_changed(&self, status: &PlaybackStatus) {
        log::info!(
            "playback {:?} at frame {} ({:.2}s, x{})",
            status.state,
            status.frame_index,
            status.time,
            status.speed
        );
    }
}

fn parse_args() -> Result<SessionConfig, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [flag, addr] if flag == "--live" => {
            let (host, port) = match addr.rsplit_once(':') {
                Some((host, port)) => (
                    host,
                    port.parse::<u16>()
                        .map_err(|e| format!("bad port {port:?}: {e}"))?,
                ),
                None => (addr.as_str(), DEFAULT_PORT),
            };
            Ok(SessionConfig::live(host, port))
        }
        [flag] if flag == "--live" => Ok(SessionConfig::live("localhost", DEFAULT_PORT)),
        [path] => Ok(SessionConfig::log_file(path)),
        _ => Err("usage: headless <log-file> | --live [host:port]".into()),
    }
}

fn main() {
    env_logger::init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(usage) => {
            eprintln!("{usage}");
            std::process::exit(2);
        }
    };

    let mut session = match Session::open(config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("cannot open session: {e}");
            std::process::exit(1);
        }
    };

    session
        .world()
        .add_scene_graph_listener(Arc::new(SceneLogger));
    let status = Arc::new(StatusLogger);
    match session.source() {
        SimulationSource::Live(server) => server.add_listener(status),
        SimulationSource::Log(player) => player.add_listener(status),
    }

    let started = Instant::now();
    let mut last = started;
    let mut applied = 0usize;
    while started.elapsed() < RUN_FOR {
        let now = Instant::now();
        let report = session.update((now - last).as_secs_f64() * 1000.0);
        last = now;
        applied += report.applied;
        std::thread::sleep(TICK);
    }

    let game = session.world().game_state();
    println!(
        "applied {applied} frames; {} nodes; sim time {:.2}s; play mode {}; score {}:{}",
        session.world().scene_graph().len(),
        game.sim_time,
        game.play_mode.as_deref().unwrap_or("-"),
        game.score.0,
        game.score.1
    );
    session.shutdown();
}
