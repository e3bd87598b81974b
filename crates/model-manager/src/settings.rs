//! Model manager settings
//!
//! Resolved once per process from the [`ConfigManager`] and handed to the
//! [`ModelManager`](crate::ModelManager) constructor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::error::{Error, Result};
use config::defaults::{
    DEFAULT_HASH_BUFFER_SIZE, DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_STALE_LOCK_AFTER_SECS,
};
use config::ConfigManager;

/// Smallest accepted hashing buffer
const MIN_HASH_BUFFER_SIZE: usize = 4 * 1024;

/// Settings for the model manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelManagerSettings {
    /// Location of the registry document
    pub registry_path: PathBuf,

    /// Compute a SHA-256 checksum when a model is added
    pub checksum_on_add: bool,

    /// Read buffer used while hashing
    pub hash_buffer_size: usize,

    /// How long a mutation waits for the registry lock
    pub lock_timeout: Duration,

    /// Age after which a leftover lock file is broken
    pub stale_lock_after: Duration,
}

impl ModelManagerSettings {
    /// Creates settings with default tuning for a registry path
    pub fn new(registry_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
            checksum_on_add: false,
            hash_buffer_size: DEFAULT_HASH_BUFFER_SIZE,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            stale_lock_after: Duration::from_secs(DEFAULT_STALE_LOCK_AFTER_SECS),
        }
    }

    /// Resolves settings from configuration
    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        let hash_buffer_size = config.get_usize("hash_buffer_size")?;
        if hash_buffer_size < MIN_HASH_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "hash_buffer_size must be at least {} bytes, got {}",
                MIN_HASH_BUFFER_SIZE, hash_buffer_size
            )));
        }

        Ok(Self {
            registry_path: config.get_path("registry_path")?,
            checksum_on_add: config.get_bool("checksum_on_add")?,
            hash_buffer_size,
            lock_timeout: Duration::from_millis(config.get_u64("lock_timeout_ms")?),
            stale_lock_after: Duration::from_secs(config.get_u64("stale_lock_after_secs")?),
        })
    }

    /// Enables or disables hashing on add
    pub fn with_checksum_on_add(mut self, enabled: bool) -> Self {
        self.checksum_on_add = enabled;
        self
    }

    /// Sets the lock wait limit
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the stale lock threshold
    pub fn with_stale_lock_after(mut self, age: Duration) -> Self {
        self.stale_lock_after = age;
        self
    }

    /// Registry document location
    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }
}
