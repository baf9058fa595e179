//! Source configuration and validation.
//!
//! Every config is a plain struct with a [`Default`] and a `validate()`
//! that checks structural invariants before any thread is spawned.

use std::path::PathBuf;
use std::time::Duration;

use roboview_protocol::DEFAULT_PORT;
use roboview_scene::WorldConfig;

// ── BackoffConfig ──────────────────────────────────────────────────

/// Capped exponential backoff between reconnect attempts.
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry. Default: 250 ms.
    pub initial: Duration,
    /// Upper bound on the delay. Default: 5 s.
    pub max: Duration,
    /// Multiplicative factor applied after each failed attempt. Default: 2.0.
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(5),
            factor: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial.is_zero() {
            return Err(ConfigError::InvalidBackoff {
                reason: "initial delay must be non-zero".into(),
            });
        }
        if self.initial > self.max {
            return Err(ConfigError::InvalidBackoff {
                reason: format!(
                    "initial delay ({:?}) exceeds max delay ({:?})",
                    self.initial, self.max
                ),
            });
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(ConfigError::InvalidBackoff {
                reason: format!("factor must be finite and >= 1.0, got {}", self.factor),
            });
        }
        Ok(())
    }
}

// ── ServerConfig ───────────────────────────────────────────────────

/// Live server connection settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Server host name or address. Default: `localhost`.
    pub host: String,
    /// Server port. Default: 3200.
    pub port: u16,
    /// Capacity of the event queue. Default: 64.
    pub queue_capacity: usize,
    /// Timeout of a single connect attempt. Default: 2 s.
    pub connect_timeout: Duration,
    /// Reconnect backoff.
    pub backoff: BackoffConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            queue_capacity: 64,
            connect_timeout: Duration::from_secs(2),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroConnectTimeout);
        }
        self.backoff.validate()
    }
}

// ── PlayerConfig ───────────────────────────────────────────────────

/// Log playback settings.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerConfig {
    /// Initial speed multiplier. Negative plays backwards. Default: 1.0.
    pub speed: f64,
    /// Start playing as soon as the log is open. Default: true.
    pub autoplay: bool,
    /// Restart from the beginning at end of log instead of stopping.
    /// Default: false.
    pub loop_playback: bool,
    /// Record an in-memory checkpoint every this many frames so seeks
    /// replay at most this many frames. `None` replays from the nearest
    /// full frame or the start of the log. Default: `None`.
    pub snapshot_interval: Option<usize>,
    /// Capacity of the event queue. Default: 64.
    pub queue_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            autoplay: true,
            loop_playback: false,
            snapshot_interval: None,
            queue_capacity: 64,
        }
    }
}

impl PlayerConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.speed.is_finite() || self.speed == 0.0 {
            return Err(ConfigError::InvalidSpeed(self.speed));
        }
        if self.snapshot_interval == Some(0) {
            return Err(ConfigError::ZeroSnapshotInterval);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

// ── SessionConfig ──────────────────────────────────────────────────

/// Which source a session reads from.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceSelect {
    /// Connect to a simulation server.
    Live(ServerConfig),
    /// Replay a recorded log.
    Log {
        /// Path of the log file.
        path: PathBuf,
        /// Playback settings.
        player: PlayerConfig,
    },
}

/// Everything needed to open a [`Session`](crate::Session).
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// World model settings.
    pub world: WorldConfig,
    /// Source selection and settings.
    pub source: SourceSelect,
}

impl Default for SessionConfig {
    /// A live session against the default server.
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            source: SourceSelect::Live(ServerConfig::default()),
        }
    }
}

impl SessionConfig {
    /// A live session against `host:port` with default settings.
    pub fn live(host: impl Into<String>, port: u16) -> Self {
        Self {
            world: WorldConfig::default(),
            source: SourceSelect::Live(ServerConfig {
                host: host.into(),
                port,
                ..ServerConfig::default()
            }),
        }
    }

    /// A log session over `path` with default settings.
    pub fn log_file(path: impl Into<PathBuf>) -> Self {
        Self {
            world: WorldConfig::default(),
            source: SourceSelect::Log {
                path: path.into(),
                player: PlayerConfig::default(),
            },
        }
    }

    /// Check structural invariants of the source settings.
    ///
    /// The world settings are checked by
    /// [`WorldModel::init`](roboview_scene::WorldModel::init).
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.source {
            SourceSelect::Live(server) => server.validate(),
            SourceSelect::Log { player, .. } => player.validate(),
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by the `validate()` methods.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Backoff invariant violated.
    #[error("invalid backoff: {reason}")]
    InvalidBackoff {
        /// Which invariant was violated.
        reason: String,
    },
    /// The server host is empty.
    #[error("server host is empty")]
    EmptyHost,
    /// A queue capacity is zero.
    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,
    /// The connect timeout is zero.
    #[error("connect timeout must be non-zero")]
    ZeroConnectTimeout,
    /// The playback speed is zero or not finite.
    #[error("playback speed must be finite and non-zero, got {0}")]
    InvalidSpeed(f64),
    /// The snapshot interval is zero.
    #[error("snapshot interval must be at least 1 frame")]
    ZeroSnapshotInterval,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(BackoffConfig::default().validate(), Ok(()));
        assert_eq!(ServerConfig::default().validate(), Ok(()));
        assert_eq!(PlayerConfig::default().validate(), Ok(()));
        assert_eq!(SessionConfig::live("localhost", 3200).validate(), Ok(()));
        assert_eq!(SessionConfig::log_file("x.log").validate(), Ok(()));
    }

    #[test]
    fn default_server_is_localhost_3200() {
        let cfg = ServerConfig::default();
        assert_eq!((cfg.host.as_str(), cfg.port), ("localhost", 3200));
    }

    #[test]
    fn backoff_initial_exceeds_max_fails() {
        let cfg = BackoffConfig {
            initial: Duration::from_secs(10),
            max: Duration::from_secs(1),
            ..BackoffConfig::default()
        };
        match cfg.validate() {
            Err(ConfigError::InvalidBackoff { .. }) => {}
            other => panic!("expected InvalidBackoff, got {other:?}"),
        }
    }

    #[test]
    fn backoff_nan_factor_fails() {
        let cfg = BackoffConfig {
            factor: f64::NAN,
            ..BackoffConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBackoff { .. })
        ));
    }

    #[test]
    fn server_rejects_empty_host_and_zero_capacity() {
        let cfg = ServerConfig {
            host: " ".into(),
            ..ServerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyHost));
        let cfg = ServerConfig {
            queue_capacity: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroQueueCapacity));
    }

    #[test]
    fn player_rejects_zero_speed_and_interval() {
        let cfg = PlayerConfig {
            speed: 0.0,
            ..PlayerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidSpeed(0.0)));
        let cfg = PlayerConfig {
            snapshot_interval: Some(0),
            ..PlayerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroSnapshotInterval));
    }
}
