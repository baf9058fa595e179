//! Paced log playback on a dedicated thread.
//!
//! # Architecture
//!
//! ```text
//! caller thread(s)            pacing thread                 render thread
//!     |                           |                             |
//!     |--play/seek/speed--------->| cmd_rx.recv_timeout(due)    |
//!     |   [cmd_tx: unbounded]     | cursor.next_frame()         |
//!     |                           | gate.try_pass(try_push) --->| WorldModel::update()
//!     |<--status / listeners------|                             |
//! ```
//!
//! The pacing thread never blocks on the queue: a frame that does not
//! fit stays pending and is retried between commands, so pause, seek
//! and shutdown are handled promptly even when the consumer stalls.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use roboview_core::{
    Frame, FrameQueue, FrameReceiver, FrameSender, ListenerSet, OverflowPolicy, SourceEvent,
    TryPushError,
};
use roboview_scene::WorldModel;

use super::cursor::LogCursor;
use crate::config::PlayerConfig;
use crate::error::LogError;
use crate::gate::DeliveryGate;

/// Slowest and fastest playback rates, by magnitude.
const MIN_SPEED: f64 = 1.0 / 64.0;
const MAX_SPEED: f64 = 64.0;

/// How long a pending frame waits before the next push attempt.
const RETRY: Duration = Duration::from_millis(2);

/// How long [`LogPlayer::set_world_model`] waits for the pacing thread.
const RESYNC_TIMEOUT: Duration = Duration::from_secs(5);

// ── Status ───────────────────────────────────────────────────────

/// Playback state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Frames are delivered at the recorded pace scaled by the speed.
    Playing,
    /// Idle; position kept.
    Paused,
    /// Reconstructing state for a seek.
    Seeking,
    /// Halted at end of log, on damage, or after shutdown.
    Stopped,
}

/// Snapshot of the player, as seen by [`PlaybackListener`]s.
#[derive(Clone, Debug)]
pub struct PlaybackStatus {
    /// Current state.
    pub state: PlaybackState,
    /// Speed multiplier; negative plays backwards.
    pub speed: f64,
    /// Frames of the log consumed so far.
    pub frame_index: usize,
    /// Frames in the log, once indexed.
    pub frame_count: Option<usize>,
    /// Timestamp of the last frame handed out.
    pub time: f64,
    /// Whether playback stopped at the end of the log.
    pub eof: bool,
    /// Why playback halted, if it did on an error.
    pub error: Option<Arc<LogError>>,
    /// The log being played.
    pub path: PathBuf,
}

impl PlaybackStatus {
    fn new(path: PathBuf, speed: f64, state: PlaybackState) -> Self {
        Self {
            state,
            speed,
            frame_index: 0,
            frame_count: None,
            time: 0.0,
            eof: false,
            error: None,
            path,
        }
    }
}

/// Capability of components that follow playback (speed-dependent
/// trackers, UI controls).
///
/// Called on the pacing thread. Never called after
/// [`LogPlayer::shutdown`] returns.
pub trait PlaybackListener: Send + Sync {
    /// State, speed or position changed through a control call, or
    /// playback halted.
    fn playback_state_changed(&self, status: &PlaybackStatus);

    /// A new log was loaded.
    fn log_changed(&self, path: &Path) {
        let _ = path;
    }
}

// ── Commands ─────────────────────────────────────────────────────

#[derive(Debug)]
enum StepDirection {
    Forward,
    Backward,
}

#[derive(Debug)]
enum PlayerCommand {
    Play,
    Pause,
    SetSpeed(f64),
    SeekTime(f64),
    SeekFrame(usize),
    Step(StepDirection),
    Rewind,
    Open(Box<LogCursor>),
    Resync(Sender<()>),
    Shutdown,
}

struct Shared {
    status: Mutex<PlaybackStatus>,
    listeners: ListenerSet<dyn PlaybackListener>,
    gate: DeliveryGate,
}

impl Shared {
    fn status(&self) -> MutexGuard<'_, PlaybackStatus> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ── LogPlayer ────────────────────────────────────────────────────

/// Recorded source with its own pacing thread.
///
/// Control methods are asynchronous: they enqueue a command and return;
/// the effect is visible through [`status`](Self::status) and listeners.
pub struct LogPlayer {
    config: PlayerConfig,
    shared: Arc<Shared>,
    commands: Sender<PlayerCommand>,
    receiver: FrameReceiver,
    thread: Mutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

// Compile-time assertion: shareable across threads.
const _: () = {
    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send_sync::<LogPlayer>();
    }
};

impl LogPlayer {
    /// Open the log at `path` and start the pacing thread.
    ///
    /// Fails synchronously if the configuration is invalid or the file
    /// cannot be opened; no player exists in that case. The queue starts
    /// with [`SourceEvent::SessionStart`]. Playback begins immediately
    /// when [`PlayerConfig::autoplay`] is set.
    pub fn open(path: impl AsRef<Path>, config: PlayerConfig) -> Result<Self, LogError> {
        config.validate()?;
        let cursor = LogCursor::open(path, config.snapshot_interval)?;
        let (sender, receiver) = FrameQueue::new(config.queue_capacity, OverflowPolicy::Block);
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let speed = clamp_speed(config.speed);
        let state = if config.autoplay {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };
        let shared = Arc::new(Shared {
            status: Mutex::new(PlaybackStatus::new(cursor.path().to_owned(), speed, state)),
            listeners: ListenerSet::new(),
            gate: DeliveryGate::new(),
        });
        log::info!("opened log {}", cursor.path().display());

        let pacer = Pacer {
            cursor,
            shared: Arc::clone(&shared),
            sender,
            commands: cmd_rx,
            autoplay: config.autoplay,
            loop_playback: config.loop_playback,
            state,
            speed,
            pending: Some(Pending::Session),
            next_due: Instant::now(),
            time: 0.0,
            eof: false,
            error: None,
        };
        let handle = thread::Builder::new()
            .name("roboview-log-player".into())
            .spawn(move || pacer.run())?;

        Ok(Self {
            config,
            shared,
            commands: cmd_tx,
            receiver,
            thread: Mutex::new(Some(handle)),
            shutdown: AtomicBool::new(false),
        })
    }

    /// The configuration this player was opened with.
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Latest status snapshot.
    pub fn status(&self) -> PlaybackStatus {
        self.shared.status().clone()
    }

    /// Register a listener.
    pub fn add_listener(&self, listener: Arc<dyn PlaybackListener>) {
        self.shared.listeners.add(listener);
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn PlaybackListener>) -> bool {
        self.shared.listeners.remove(listener)
    }

    /// Consumer end of the event queue.
    pub fn events(&self) -> FrameReceiver {
        self.receiver.clone()
    }

    fn send(&self, command: PlayerCommand) {
        if self.commands.send(command).is_err() {
            log::debug!("log player command ignored: pacing thread has exited");
        }
    }

    /// Start or continue playback. At end of log, restarts from the
    /// beginning.
    pub fn play(&self) {
        self.send(PlayerCommand::Play);
    }

    /// Pause playback, keeping the position.
    pub fn pause(&self) {
        self.send(PlayerCommand::Pause);
    }

    /// Set the speed multiplier, clamped to `1/64..=64` in magnitude.
    /// Negative speeds play backwards by repeated seeks.
    pub fn set_speed(&self, speed: f64) {
        self.send(PlayerCommand::SetSpeed(speed));
    }

    /// Jump to the state at `time` (every frame stamped at or before it
    /// applied). The world receives one synthesized full frame.
    pub fn seek(&self, time: f64) {
        self.send(PlayerCommand::SeekTime(time));
    }

    /// Jump to the state after the first `frames` frames.
    pub fn seek_frame(&self, frames: usize) {
        self.send(PlayerCommand::SeekFrame(frames));
    }

    /// Pause and deliver the next frame.
    pub fn step_forward(&self) {
        self.send(PlayerCommand::Step(StepDirection::Forward));
    }

    /// Pause and go back one frame.
    pub fn step_backward(&self) {
        self.send(PlayerCommand::Step(StepDirection::Backward));
    }

    /// Jump back to the start of the log.
    pub fn rewind(&self) {
        self.send(PlayerCommand::Rewind);
    }

    /// Replace the log being played.
    ///
    /// The new file is opened synchronously; on error the current log
    /// keeps playing. On success the world receives
    /// [`SourceEvent::SessionStart`] and listeners get
    /// [`log_changed`](PlaybackListener::log_changed).
    pub fn open_log(&self, path: impl AsRef<Path>) -> Result<(), LogError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(LogError::Shutdown);
        }
        let cursor = LogCursor::open(path, self.config.snapshot_interval)?;
        self.commands
            .send(PlayerCommand::Open(Box::new(cursor)))
            .map_err(|_| LogError::Shutdown)
    }

    /// Stop delivering frames; the pacing thread idles on its current
    /// frame. When this returns no push is in flight.
    pub fn hold(&self) {
        self.shared.gate.hold();
    }

    /// Resume delivery after [`hold`](Self::hold).
    pub fn release(&self) {
        self.shared.gate.release();
    }

    /// Remove every queued event.
    pub fn drain(&self) -> Vec<SourceEvent> {
        self.receiver.drain()
    }

    /// Re-target delivery to `model`.
    ///
    /// Delivery is held for the duration of the swap: queued events are
    /// discarded, `model` is wired to the queue, and the pacing thread
    /// re-sends the state at its current position as one full frame, so
    /// a freshly constructed world catches up without replaying the log.
    pub fn set_world_model(&self, model: &mut WorldModel) {
        self.hold();
        let discarded = self.receiver.drain().len();
        model.attach_source(self.receiver.clone());
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.send(PlayerCommand::Resync(ack_tx));
        if ack_rx.recv_timeout(RESYNC_TIMEOUT).is_err() {
            log::warn!("log player did not acknowledge world model swap");
        }
        log::debug!("world model swapped, {discarded} queued events replaced by a resync");
        self.release();
    }

    /// Stop the pacing thread, join it and drain the queue.
    ///
    /// Idempotent and callable from any thread. No listener is notified
    /// after this returns.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.commands.send(PlayerCommand::Shutdown);
        let handle = self.thread.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("log player thread panicked");
            }
        }
        self.receiver.drain();
        self.shared.status().state = PlaybackState::Stopped;
        log::debug!("log player shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl Drop for LogPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for LogPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogPlayer")
            .field("status", &self.status())
            .finish()
    }
}

fn clamp_speed(speed: f64) -> f64 {
    if !speed.is_finite() || speed == 0.0 {
        return MIN_SPEED;
    }
    speed.signum() * speed.abs().clamp(MIN_SPEED, MAX_SPEED)
}

/// `dt` seconds of log time at `speed`, as wall-clock delay.
fn scaled(dt: f64, speed: f64) -> Duration {
    Duration::try_from_secs_f64(dt / speed.abs()).unwrap_or(Duration::ZERO)
}

// ── Pacing thread ────────────────────────────────────────────────

/// An event produced but not yet queued.
enum Pending {
    Session,
    /// Read by `next_frame`: the cursor has moved past it.
    Read(Frame),
    /// Synthesized by a seek: the cursor sits right after its state.
    Synthesized(Frame),
}

impl Pending {
    fn into_event(self) -> SourceEvent {
        match self {
            Pending::Session => SourceEvent::SessionStart,
            Pending::Read(frame) | Pending::Synthesized(frame) => SourceEvent::Frame(frame),
        }
    }
}

struct Pacer {
    cursor: LogCursor,
    shared: Arc<Shared>,
    sender: FrameSender,
    commands: Receiver<PlayerCommand>,
    autoplay: bool,
    loop_playback: bool,
    state: PlaybackState,
    speed: f64,
    pending: Option<Pending>,
    next_due: Instant,
    time: f64,
    eof: bool,
    error: Option<Arc<LogError>>,
}

impl Pacer {
    fn run(mut self) {
        self.publish(true);
        loop {
            self.flush();
            let wait = if self.pending.is_some() {
                Some(RETRY)
            } else if self.state == PlaybackState::Playing {
                Some(self.next_due.saturating_duration_since(Instant::now()))
            } else {
                None
            };
            let command = match wait {
                None => match self.commands.recv() {
                    Ok(c) => Some(c),
                    Err(_) => break,
                },
                Some(d) => match self.commands.recv_timeout(d) {
                    Ok(c) => Some(c),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
            };
            match command {
                Some(PlayerCommand::Shutdown) => break,
                Some(command) => self.handle(command),
                None => {
                    if self.pending.is_none() && self.state == PlaybackState::Playing {
                        self.advance();
                    }
                }
            }
        }
    }

    /// Try to queue the pending event; keep it when the gate is held or
    /// the queue is full.
    fn flush(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let synthesized = matches!(pending, Pending::Synthesized(_));
        let mut slot = Some(pending.into_event());
        let sender = &self.sender;
        let pushed = self.shared.gate.try_pass(|| match slot.take() {
            Some(event) => sender.try_push(event),
            None => Ok(()),
        });
        let bounced = match (pushed, slot) {
            (None, Some(event)) => Some(event),
            (Some(Err(TryPushError::Full(event))), _) => Some(event),
            (Some(Err(TryPushError::Disconnected)), _) => {
                log::debug!("log player queue disconnected, frame dropped");
                None
            }
            _ => None,
        };
        self.pending = bounced.map(|event| match event {
            SourceEvent::SessionStart => Pending::Session,
            SourceEvent::Frame(frame) if synthesized => Pending::Synthesized(frame),
            SourceEvent::Frame(frame) => Pending::Read(frame),
        });
    }

    fn handle(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Play => {
                if let Some(e) = &self.error {
                    log::warn!("cannot play damaged log: {e}");
                    return;
                }
                if self.eof {
                    self.seek_to(|c| c.rewind());
                }
                self.state = PlaybackState::Playing;
                self.next_due = Instant::now();
                self.publish(true);
            }
            PlayerCommand::Pause => {
                if self.state == PlaybackState::Playing {
                    self.state = PlaybackState::Paused;
                    self.publish(true);
                }
            }
            PlayerCommand::SetSpeed(speed) => {
                self.speed = clamp_speed(speed);
                log::info!("playback speed {}", self.speed);
                self.publish(true);
            }
            PlayerCommand::SeekTime(t) => self.seek_to(|c| c.seek_time(t)),
            PlayerCommand::SeekFrame(n) => self.seek_to(|c| c.seek_frame(n)),
            PlayerCommand::Rewind => self.seek_to(|c| c.rewind()),
            PlayerCommand::Step(direction) => {
                if self.state == PlaybackState::Playing {
                    self.state = PlaybackState::Paused;
                }
                if self.pending.is_some() {
                    log::debug!("step ignored: previous frame not yet delivered");
                    return;
                }
                match direction {
                    StepDirection::Forward => {
                        self.forward();
                    }
                    StepDirection::Backward => {
                        self.backward();
                    }
                }
                self.publish(true);
            }
            PlayerCommand::Open(cursor) => {
                self.cursor = *cursor;
                self.pending = Some(Pending::Session);
                self.time = 0.0;
                self.eof = false;
                self.error = None;
                self.state = if self.autoplay {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Paused
                };
                self.next_due = Instant::now();
                log::info!("switched to log {}", self.cursor.path().display());
                let path = self.cursor.path().to_owned();
                self.shared.status().path = path.clone();
                self.shared.listeners.notify(|l| l.log_changed(&path));
                self.publish(true);
            }
            PlayerCommand::Resync(ack) => {
                self.resync();
                let _ = ack.send(());
            }
            PlayerCommand::Shutdown => {}
        }
    }

    /// Replace whatever is pending with the full state at the current
    /// position.
    fn resync(&mut self) {
        let target = match &self.pending {
            Some(Pending::Session) => return,
            Some(Pending::Read(_)) => self.cursor.position().saturating_sub(1),
            Some(Pending::Synthesized(_)) | None => self.cursor.position(),
        };
        self.pending = None;
        match self.cursor.seek_frame(target) {
            Ok(frame) => self.pending = Some(Pending::Synthesized(frame)),
            Err(e) => self.halt(e),
        }
    }

    fn seek_to(&mut self, seek: impl FnOnce(&mut LogCursor) -> Result<Frame, LogError>) {
        let resume = match self.state {
            PlaybackState::Stopped => PlaybackState::Paused,
            other => other,
        };
        self.state = PlaybackState::Seeking;
        self.publish(true);
        // A frame not yet delivered is superseded by the full frame.
        self.pending = None;
        match seek(&mut self.cursor) {
            Ok(frame) => {
                self.time = frame.time;
                self.eof = false;
                self.error = None;
                self.pending = Some(Pending::Synthesized(frame));
                self.state = resume;
                self.next_due = Instant::now();
                self.publish(true);
            }
            Err(e) => self.halt(e),
        }
    }

    fn advance(&mut self) {
        if self.speed > 0.0 {
            self.forward();
        } else {
            self.backward();
        }
    }

    /// Read the next frame and schedule the one after.
    fn forward(&mut self) {
        match self.cursor.next_frame() {
            Ok(Some(frame)) => {
                let next = self.cursor.time_of(self.cursor.position()).ok().flatten();
                let dt = next.map_or(0.0, |t| t - frame.time);
                self.next_due = Instant::now() + scaled(dt, self.speed);
                self.time = frame.time;
                self.pending = Some(Pending::Read(frame));
                self.publish(false);
            }
            Ok(None) if self.loop_playback => {
                log::debug!("end of log, looping");
                match self.cursor.rewind() {
                    Ok(frame) => {
                        self.time = frame.time;
                        self.pending = Some(Pending::Synthesized(frame));
                        self.next_due = Instant::now();
                    }
                    Err(e) => self.halt(e),
                }
            }
            Ok(None) => {
                log::info!("end of log reached");
                self.eof = true;
                self.state = PlaybackState::Stopped;
                self.publish(true);
            }
            Err(e) => self.halt(e),
        }
    }

    /// Go back one frame by seeking.
    fn backward(&mut self) {
        let position = self.cursor.position();
        if position <= 1 {
            if self.state == PlaybackState::Playing {
                self.state = PlaybackState::Paused;
                self.publish(true);
            }
            return;
        }
        let current = self.time;
        match self.cursor.seek_frame(position - 1) {
            Ok(frame) => {
                self.next_due = Instant::now() + scaled(current - frame.time, self.speed);
                self.time = frame.time;
                self.eof = false;
                self.pending = Some(Pending::Synthesized(frame));
                self.publish(false);
            }
            Err(e) => self.halt(e),
        }
    }

    fn halt(&mut self, error: LogError) {
        log::error!(
            "playback of {} halted: {error}",
            self.cursor.path().display()
        );
        self.error = Some(Arc::new(error));
        self.state = PlaybackState::Stopped;
        self.publish(true);
    }

    fn publish(&self, notify: bool) {
        let snapshot = {
            let mut status = self.shared.status();
            status.state = self.state;
            status.speed = self.speed;
            status.frame_index = self.cursor.position();
            status.frame_count = self.cursor.indexed().map(|h| h.len());
            status.time = self.time;
            status.eof = self.eof;
            status.error = self.error.clone();
            notify.then(|| status.clone())
        };
        if let Some(status) = snapshot {
            self.shared
                .listeners
                .notify(|l| l.playback_state_changed(&status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_is_clamped_keeping_sign() {
        assert_eq!(clamp_speed(1000.0), MAX_SPEED);
        assert_eq!(clamp_speed(-1000.0), -MAX_SPEED);
        assert_eq!(clamp_speed(0.0), MIN_SPEED);
        assert_eq!(clamp_speed(-0.5), -0.5);
        assert_eq!(clamp_speed(f64::NAN), MIN_SPEED);
    }

    #[test]
    fn scaled_delay() {
        assert_eq!(scaled(1.0, 2.0), Duration::from_millis(500));
        assert_eq!(scaled(1.0, -4.0), Duration::from_millis(250));
        assert_eq!(scaled(-1.0, 1.0), Duration::ZERO);
    }
}
