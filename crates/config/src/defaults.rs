//! Built-in configuration defaults

use std::path::PathBuf;

/// Application directory name under the platform config directory
pub const APP_DIR_NAME: &str = "scli";

/// Registry document file name
pub const REGISTRY_FILE_NAME: &str = "registry.json";

/// User configuration file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Prefix for environment variable overrides (`SCLI_LOG_LEVEL`, ...)
pub const ENV_PREFIX: &str = "SCLI";

/// Chunk size used when hashing model files
pub const DEFAULT_HASH_BUFFER_SIZE: usize = 1024 * 1024;

/// How long a mutation waits for the registry lock
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;

/// Age after which a leftover lock file is considered abandoned
pub const DEFAULT_STALE_LOCK_AFTER_SECS: u64 = 300;

/// Default log filter
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log output format
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Default configuration locations
pub struct DefaultConfig;

impl DefaultConfig {
    /// Application configuration directory, `<config_dir>/scli`
    ///
    /// Falls back to `./.scli` when the platform has no config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR_NAME)))
    }

    /// Default registry document location
    pub fn registry_path() -> PathBuf {
        Self::config_dir().join(REGISTRY_FILE_NAME)
    }

    /// Default user configuration file location
    pub fn config_file() -> PathBuf {
        Self::config_dir().join(CONFIG_FILE_NAME)
    }
}
