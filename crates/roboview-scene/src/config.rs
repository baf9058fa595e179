//! World model configuration and validation.

/// Configuration for [`WorldModel`](crate::WorldModel).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldConfig {
    /// Maximum number of queued events applied per
    /// [`update`](crate::WorldModel::update) call. Bounds the work done in
    /// one render tick while still catching up quickly after a stall.
    /// Default: 32.
    pub max_frames_per_update: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_frames_per_update: 32,
        }
    }
}

impl WorldConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frames_per_update == 0 {
            return Err(ConfigError::ZeroFrameBudget);
        }
        Ok(())
    }
}

/// Errors detected by [`WorldConfig::validate`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `max_frames_per_update` is zero: the world would never advance.
    #[error("max_frames_per_update must be at least 1")]
    ZeroFrameBudget,
}
