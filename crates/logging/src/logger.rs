//! Subscriber construction

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use common::types::LogFormat;
use config::ConfigManager;

/// Logging settings resolved from configuration and flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Base filter directive, e.g. `info` or `model_manager=debug`
    pub level: String,

    /// Output format
    pub format: LogFormat,

    /// Number of `-v` flags; each one raises the base level one step
    pub verbosity: u8,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            verbosity: 0,
        }
    }
}

impl LogSettings {
    /// Reads `log_level` and `log_format` from configuration
    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        let level = config.get_string("log_level")?;
        let format = config
            .get_string("log_format")?
            .parse::<LogFormat>()
            .map_err(|e| anyhow!(e))?;

        Ok(Self {
            level,
            format,
            verbosity: 0,
        })
    }

    /// Sets the verbosity raised by `-v` flags
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Filter directive after applying verbosity
    pub fn directive(&self) -> String {
        match self.verbosity {
            0 => self.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

/// Installs the global subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Output goes to
/// stderr so command output on stdout stays machine readable.
pub fn init(settings: &LogSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.directive()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = match settings.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}
