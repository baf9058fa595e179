//! Synchronous random-access reader over one log.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use roboview_core::{Frame, FrameKind};
use roboview_protocol::{Decoder, Framing};
use roboview_scene::{GameState, SceneGraph};

use super::index::{detect_framing, IndexEntry, LogHandle};
use crate::error::LogError;

/// Cumulative state after a number of frames, kept to shorten seeks.
#[derive(Clone, Debug)]
struct Checkpoint {
    graph: SceneGraph,
    game: GameState,
}

/// Reads frames of one log in order or at random, reconstructing
/// cumulative state on seek.
///
/// The index is built on first use, not at open, so opening a large log
/// costs one read. Seeking replays forward from the nearest earlier
/// anchor: a full frame in the log, or an in-memory checkpoint when a
/// snapshot interval is set, otherwise the start of the log. The result
/// is one synthesized full frame that recreates the reconstructed scene
/// and game state on any world model.
#[derive(Debug)]
pub struct LogCursor {
    path: PathBuf,
    file: BufReader<File>,
    framing: Framing,
    handle: Option<Arc<LogHandle>>,
    decoder: Decoder,
    position: usize,
    snapshot_interval: Option<usize>,
    checkpoints: BTreeMap<usize, Checkpoint>,
    // Play-mode table in force before entry k, for k at 0, at each full
    // frame decoded so far and at each checkpoint.
    tables: BTreeMap<usize, Vec<String>>,
    // State after `position` frames, tracked only with checkpointing on.
    shadow: Option<(SceneGraph, GameState)>,
}

impl LogCursor {
    /// Open the log at `path`.
    ///
    /// Fails if the file cannot be opened or is empty.
    pub fn open(path: impl AsRef<Path>, snapshot_interval: Option<usize>) -> Result<Self, LogError> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path).map_err(|source| LogError::Open {
            path: path.clone(),
            source,
        })?;
        let mut file = BufReader::new(file);
        let framing = detect_framing(&mut file, &path)?;
        let snapshot_interval = snapshot_interval.filter(|&n| n > 0);
        Ok(Self {
            path,
            file,
            framing,
            handle: None,
            decoder: Decoder::new(),
            position: 0,
            snapshot_interval,
            checkpoints: BTreeMap::new(),
            tables: BTreeMap::from([(0, Vec::new())]),
            shadow: snapshot_interval.map(|_| (SceneGraph::new(), GameState::default())),
        })
    }

    /// Path of the log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Framing detected at open.
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// The frame index, scanning the file on first call.
    pub fn handle(&mut self) -> Result<&Arc<LogHandle>, LogError> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => {
                self.file.seek(SeekFrom::Start(0))?;
                let handle =
                    LogHandle::scan_reader(&mut self.file, self.framing, self.path.clone())?;
                log::debug!("indexed {} frames of {}", handle.len(), self.path.display());
                Arc::new(handle)
            }
        };
        let handle: &Arc<LogHandle> = self.handle.insert(handle);
        Ok(handle)
    }

    /// The index if it has been built.
    pub fn indexed(&self) -> Option<&Arc<LogHandle>> {
        self.handle.as_ref()
    }

    /// Number of frames in the log.
    pub fn frame_count(&mut self) -> Result<usize, LogError> {
        Ok(self.handle()?.len())
    }

    /// Number of frames read so far; the index of the next frame.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Timestamp of frame `index`.
    pub fn time_of(&mut self, index: usize) -> Result<Option<f64>, LogError> {
        Ok(self.handle()?.entry(index).map(|e| e.time))
    }

    /// Number of checkpoints recorded so far.
    pub fn checkpoints(&self) -> usize {
        self.checkpoints.len()
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` at the end of the log. Damage in the log is
    /// reported as [`LogError::Corrupt`] once every frame before it has
    /// been returned; the cursor does not move past it.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, LogError> {
        let handle = Arc::clone(self.handle()?);
        let Some(entry) = handle.entry(self.position).copied() else {
            return match handle.corrupt() {
                Some(e) => Err(LogError::Corrupt(e.clone())),
                None => Ok(None),
            };
        };
        let frame = self.decode_entry(self.position, &entry)?;
        self.position += 1;
        if let Some((graph, game)) = self.shadow.as_mut() {
            graph.apply_frame(&frame);
            game.apply_frame(&frame);
        }
        if self.checkpoint_due(self.position) {
            if let Some((graph, game)) = &self.shadow {
                let (graph, game) = (graph.clone(), game.clone());
                self.record_checkpoint(self.position, graph, game);
            }
        }
        Ok(Some(frame))
    }

    /// Reconstruct the state after the first `n` frames (clamped to the
    /// log length) and position the cursor so the next frame read is
    /// frame `n`.
    pub fn seek_frame(&mut self, n: usize) -> Result<Frame, LogError> {
        let handle = Arc::clone(self.handle()?);
        let n = n.min(handle.len());

        let checkpoint = self
            .checkpoints
            .range(..=n)
            .next_back()
            .map(|(&at, cp)| (at, cp.clone()));
        let full = handle.full_frame_before(n);

        // Replay starts after a checkpoint, or at a full frame that
        // discards everything before it, whichever is later.
        let (start, mut graph, mut game) = match (checkpoint, full) {
            (Some((at, cp)), Some(f)) if f < at => (at, cp.graph, cp.game),
            (Some((at, cp)), None) => (at, cp.graph, cp.game),
            (_, Some(f)) => (f, SceneGraph::new(), GameState::default()),
            (None, None) => (0, SceneGraph::new(), GameState::default()),
        };
        self.restore_table(&handle, start)?;
        log::debug!("seek to frame {n}: replaying {} frames from {start}", n - start);

        for k in start..n {
            let entry = handle.entries()[k];
            let frame = self.decode_entry(k, &entry)?;
            graph.apply_frame(&frame);
            game.apply_frame(&frame);
            if self.checkpoint_due(k + 1) {
                self.record_checkpoint(k + 1, graph.clone(), game.clone());
            }
        }

        let time = match n.checked_sub(1) {
            Some(last) => handle.entries()[last].time,
            None => handle.entry(0).map_or(0.0, |e| e.time),
        };
        let frame = graph.to_full_frame(time, &game);
        self.position = n;
        if self.snapshot_interval.is_some() {
            self.shadow = Some((graph, game));
        }
        Ok(frame)
    }

    /// Seek to the state at `time`: every frame stamped at or before it
    /// applied.
    pub fn seek_time(&mut self, time: f64) -> Result<Frame, LogError> {
        let n = self.handle()?.frames_until(time);
        self.seek_frame(n)
    }

    /// Seek to the start of the log.
    pub fn rewind(&mut self) -> Result<Frame, LogError> {
        self.seek_frame(0)
    }

    /// Leave the decoder holding the play-mode table in force before entry
    /// `at`, decoding forward from the nearest known table when needed.
    fn restore_table(&mut self, handle: &LogHandle, at: usize) -> Result<(), LogError> {
        let (known, modes) = match self.tables.range(..=at).next_back() {
            Some((&k, modes)) => (k, modes.clone()),
            None => (0, Vec::new()),
        };
        self.decoder.set_play_modes(modes);
        if known < at {
            log::trace!("rebuilding play-mode table from entry {known} to {at}");
        }
        for k in known..at {
            let entry = handle.entries()[k];
            self.decode_entry(k, &entry)?;
        }
        Ok(())
    }

    fn decode_entry(&mut self, k: usize, entry: &IndexEntry) -> Result<Frame, LogError> {
        if entry.kind == FrameKind::Full && !self.tables.contains_key(&k) {
            self.tables.insert(k, self.decoder.play_modes().to_vec());
        }
        self.read_entry(entry)
    }

    fn read_entry(&mut self, entry: &IndexEntry) -> Result<Frame, LogError> {
        self.file.seek(SeekFrom::Start(entry.offset))?;
        let mut bytes = vec![0u8; entry.len as usize];
        self.file.read_exact(&mut bytes)?;
        self.decoder
            .decode(&bytes)
            .map_err(|e| LogError::Corrupt(e.shifted(entry.offset)))
    }

    fn checkpoint_due(&self, at: usize) -> bool {
        match self.snapshot_interval {
            Some(interval) => at % interval == 0 && !self.checkpoints.contains_key(&at),
            None => false,
        }
    }

    fn record_checkpoint(&mut self, at: usize, graph: SceneGraph, game: GameState) {
        self.tables.insert(at, self.decoder.play_modes().to_vec());
        self.checkpoints.insert(at, Checkpoint { graph, game });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn log_file(text: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(text.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    const LOG: &str = "(delta 0 (new a (pos 0 0 0)))\n\
                       (delta 1 (upd a (pos 1 0 0)))\n\
                       (delta 2 (new b (parent a)))\n\
                       (delta 3 (del a))\n";

    #[test]
    fn reads_in_order_then_eof() {
        let f = log_file(LOG);
        let mut c = LogCursor::open(f.path(), None).unwrap();
        assert!(c.indexed().is_none());
        let mut times = Vec::new();
        while let Some(frame) = c.next_frame().unwrap() {
            times.push(frame.time);
        }
        assert_eq!(times, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(c.position(), 4);
        assert!(c.next_frame().unwrap().is_none());
    }

    #[test]
    fn seek_synthesizes_cumulative_state() {
        let f = log_file(LOG);
        let mut c = LogCursor::open(f.path(), None).unwrap();
        let frame = c.seek_time(2.5).unwrap();
        assert!(frame.is_full());
        assert_eq!(frame.time, 2.0);
        let mut g = SceneGraph::new();
        g.apply_frame(&frame);
        assert_eq!(g.len(), 3);
        assert_eq!(g.node_by_path("b").unwrap().parent(), g.node_by_path("a").map(|n| n.id()));
        assert_eq!(c.position(), 3);
        assert_eq!(c.next_frame().unwrap().unwrap().time, 3.0);
    }

    #[test]
    fn seek_before_first_frame_is_empty() {
        let f = log_file(LOG);
        let mut c = LogCursor::open(f.path(), None).unwrap();
        let frame = c.seek_time(-5.0).unwrap();
        assert_eq!(c.position(), 0);
        let mut g = SceneGraph::new();
        g.apply_frame(&frame);
        assert!(g.is_empty());
    }

    #[test]
    fn checkpoints_are_recorded_while_reading() {
        let f = log_file(LOG);
        let mut c = LogCursor::open(f.path(), Some(2)).unwrap();
        while c.next_frame().unwrap().is_some() {}
        assert_eq!(c.checkpoints(), 2);
        let frame = c.seek_frame(3).unwrap();
        let mut g = SceneGraph::new();
        g.apply_frame(&frame);
        assert_eq!(g.len(), 3);
    }

    // The second full frame omits the table; the delta after it names a
    // play mode by number.
    const NUMBERED_MODES: &str =
        "(full 0 (game (modes BeforeKickOff PlayOn Goal_Left) (mode 0)))\n\
         (delta 1 (game (mode 1)))\n\
         (full 2 (new a (pos 1 0 0)))\n\
         (delta 3 (game (mode 2)))\n";

    fn mode_after_seek(c: &mut LogCursor, n: usize) -> Option<String> {
        let frame = c.seek_frame(n).unwrap();
        let mut game = GameState::default();
        game.apply_frame(&frame);
        game.play_mode
    }

    #[test]
    fn seek_resolves_numbered_mode_from_a_fresh_cursor() {
        let f = log_file(NUMBERED_MODES);
        let mut c = LogCursor::open(f.path(), None).unwrap();
        assert_eq!(mode_after_seek(&mut c, 4).as_deref(), Some("Goal_Left"));
        assert_eq!(c.position(), 4);
    }

    #[test]
    fn seek_result_does_not_depend_on_prior_reads() {
        let f = log_file(NUMBERED_MODES);
        let mut fresh = LogCursor::open(f.path(), None).unwrap();
        let mut warmed = LogCursor::open(f.path(), None).unwrap();
        while warmed.next_frame().unwrap().is_some() {}
        for n in (0..=4).rev() {
            let a = fresh.seek_frame(n).unwrap();
            let b = warmed.seek_frame(n).unwrap();
            assert_eq!(a, b, "state after {n} frames");
        }
    }

    #[test]
    fn reading_on_after_seek_uses_the_log_table() {
        let f = log_file(NUMBERED_MODES);
        let mut c = LogCursor::open(f.path(), None).unwrap();
        c.seek_frame(3).unwrap();
        let frame = c.next_frame().unwrap().unwrap();
        let mut game = GameState::default();
        game.apply_frame(&frame);
        assert_eq!(game.play_mode.as_deref(), Some("Goal_Left"));
    }

    #[test]
    fn checkpoint_before_a_full_frame_keeps_the_later_table() {
        let log = "(full 0 (game (modes A B) (mode 0)))\n\
                   (delta 1 (game (modes X Y Z) (mode 1)))\n\
                   (full 2 (new a))\n\
                   (delta 3 (game (mode 2)))\n";
        let f = log_file(log);
        let mut c = LogCursor::open(f.path(), Some(1)).unwrap();
        while c.next_frame().unwrap().is_some() {}
        assert_eq!(c.checkpoints(), 4);
        assert_eq!(mode_after_seek(&mut c, 4).as_deref(), Some("Z"));
        assert_eq!(mode_after_seek(&mut c, 2).as_deref(), Some("Y"));
        assert_eq!(mode_after_seek(&mut c, 1).as_deref(), Some("A"));

        let mut fresh = LogCursor::open(f.path(), Some(3)).unwrap();
        assert_eq!(mode_after_seek(&mut fresh, 4).as_deref(), Some("Z"));
    }

    #[test]
    fn corrupt_body_is_reported_after_valid_frames() {
        let f = log_file("(delta 0 (new a))\n(delta 1 (bogus))\n(delta 2)\n");
        let mut c = LogCursor::open(f.path(), None).unwrap();
        assert!(c.next_frame().unwrap().is_some());
        match c.next_frame() {
            Err(LogError::Corrupt(e)) => assert_eq!(e.offset, 18 + 10),
            other => panic!("expected corrupt log, got {other:?}"),
        }
        assert_eq!(c.position(), 1);
    }

    #[test]
    fn empty_and_missing_files_fail_at_open() {
        let f = log_file("");
        assert!(matches!(
            LogCursor::open(f.path(), None),
            Err(LogError::Empty { .. })
        ));
        assert!(matches!(
            LogCursor::open("/no/such/roboview.log", None),
            Err(LogError::Open { .. })
        ));
    }
}
