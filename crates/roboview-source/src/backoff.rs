//! Reconnect delay schedule.

use std::time::Duration;

use crate::config::BackoffConfig;

/// Capped exponential backoff.
///
/// Each call to [`next_delay`](Self::next_delay) returns the delay to
/// wait before the next attempt and grows the following one by the
/// configured factor, up to the cap. Delays never decrease until
/// [`reset`](Self::reset).
#[derive(Clone, Debug)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    /// A schedule starting at `config.initial`.
    pub fn new(config: BackoffConfig) -> Self {
        let current = config.initial;
        Self {
            config,
            current,
            attempts: 0,
        }
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.config.max);
        let grown = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.config.factor)
            .unwrap_or(self.config.max);
        self.current = grown.min(self.config.max);
        self.attempts += 1;
        delay
    }

    /// Number of delays handed out since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start over from the initial delay, after a successful connect.
    pub fn reset(&mut self) {
        self.current = self.config.initial;
        self.attempts = 0;
    }
}
