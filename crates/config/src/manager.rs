//! Configuration manager
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. User configuration file (`<config_dir>/scli/config.toml`, or `--config`)
//! 3. Environment variables prefixed with `SCLI_` (e.g. `SCLI_CHECKSUM_ON_ADD=true`)
//! 4. Explicit overrides supplied by the caller (command-line flags)

use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

use common::error::{Error, Result};

use crate::defaults::{
    DefaultConfig, DEFAULT_HASH_BUFFER_SIZE, DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_LOG_FORMAT,
    DEFAULT_LOG_LEVEL, DEFAULT_STALE_LOCK_AFTER_SECS, ENV_PREFIX,
};

/// Options controlling where configuration is read from
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit configuration file; must exist when given
    pub config_file: Option<PathBuf>,

    /// Skip `SCLI_*` environment variables
    pub ignore_environment: bool,

    /// Key/value pairs applied last
    pub overrides: Vec<(String, String)>,
}

impl LoadOptions {
    /// Adds an override applied after every other source
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }
}

/// Layered configuration for SCLI
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// Merged configuration
    config: Config,

    /// File that contributed settings, if any
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Loads configuration from the default locations
    pub fn new() -> Result<Self> {
        Self::load(LoadOptions::default())
    }

    /// Loads configuration with explicit options
    pub fn load(options: LoadOptions) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("registry_path", DefaultConfig::registry_path().to_string_lossy().to_string())
            .and_then(|b| b.set_default("checksum_on_add", false))
            .and_then(|b| b.set_default("hash_buffer_size", DEFAULT_HASH_BUFFER_SIZE as i64))
            .and_then(|b| b.set_default("lock_timeout_ms", DEFAULT_LOCK_TIMEOUT_MS as i64))
            .and_then(|b| b.set_default("stale_lock_after_secs", DEFAULT_STALE_LOCK_AFTER_SECS as i64))
            .and_then(|b| b.set_default("log_level", DEFAULT_LOG_LEVEL))
            .and_then(|b| b.set_default("log_format", DEFAULT_LOG_FORMAT))
            .map_err(config_error)?;

        // An explicit file must exist, the default one is optional
        let source_file = match &options.config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "configuration file {} does not exist",
                        path.display()
                    )));
                }
                builder = builder.add_source(File::from(path.as_path()).required(true));
                Some(path.clone())
            }
            None => {
                let path = DefaultConfig::config_file();
                if path.exists() {
                    builder = builder.add_source(File::from(path.as_path()).required(false));
                    Some(path)
                } else {
                    None
                }
            }
        };

        if !options.ignore_environment {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        for (key, value) in &options.overrides {
            builder = builder
                .set_override(key.as_str(), value.as_str())
                .map_err(config_error)?;
        }

        let config = builder.build().map_err(config_error)?;

        if let Some(path) = &source_file {
            debug!("Loaded configuration from {:?}", path);
        }

        Ok(Self { config, source_file })
    }

    /// Gets a typed value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.config.get::<T>(key).map_err(config_error)
    }

    /// Gets a string value
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.config.get_string(key).map_err(config_error)
    }

    /// Gets a boolean value
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.config.get_bool(key).map_err(config_error)
    }

    /// Gets an unsigned size value
    pub fn get_usize(&self, key: &str) -> Result<usize> {
        self.get::<usize>(key)
    }

    /// Gets an unsigned 64-bit value
    pub fn get_u64(&self, key: &str) -> Result<u64> {
        self.get::<u64>(key)
    }

    /// Gets a filesystem path, expanding a leading `~`
    pub fn get_path(&self, key: &str) -> Result<PathBuf> {
        let raw = self.get_string(key)?;
        Ok(expand_home(&raw))
    }

    /// File that contributed settings, if any
    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }
}

fn config_error(err: config::ConfigError) -> Error {
    Error::Config(err.to_string())
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}
