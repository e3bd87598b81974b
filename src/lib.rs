//! Application wiring for the `scli` binary
//!
//! Resolves configuration, installs logging and runs `models` commands on a
//! blocking worker so that Ctrl-C can interrupt long checksum work.

use anyhow::{Context, Result};
use std::io;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cli_interface::{CommandManager, CommandOutcome, Commands, GlobalArgs};
use config::{ConfigManager, LoadOptions};
use logging::LogSettings;
use model_manager::ModelManager;

/// The assembled application
pub struct Scli {
    /// Resolved configuration
    config: Arc<ConfigManager>,

    /// Command runner shared with blocking workers
    commands: Arc<CommandManager>,

    /// Cancelled on Ctrl-C
    cancel: CancellationToken,
}

impl Scli {
    /// Loads configuration for the given flags and installs logging
    pub fn new(global: &GlobalArgs) -> Result<Self> {
        let config = ConfigManager::load(load_options(global))
            .context("Failed to load configuration")?;

        let mut log_settings = LogSettings::from_config(&config)?.with_verbosity(global.verbose);
        if let Some(format) = global.log_format {
            log_settings.format = format;
        }
        logging::init(&log_settings)?;

        if let Some(file) = config.source_file() {
            debug!("Configuration file: {:?}", file);
        }

        Self::with_config(config)
    }

    /// Builds the application from already loaded configuration
    pub fn with_config(config: ConfigManager) -> Result<Self> {
        let cancel = CancellationToken::new();
        let manager = ModelManager::from_config(&config, cancel.clone())
            .context("Invalid model manager settings")?;

        Ok(Self {
            config: Arc::new(config),
            commands: Arc::new(CommandManager::new(Arc::new(manager))),
            cancel,
        })
    }

    /// Resolved configuration
    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.config
    }

    /// The model manager behind the commands
    pub fn model_manager(&self) -> &Arc<ModelManager> {
        self.commands.manager()
    }

    /// Token observed by long-running work
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs a command, printing its output to stdout
    pub async fn run(&self, command: Commands) -> Result<CommandOutcome> {
        let Commands::Models { command } = command;
        let commands = Arc::clone(&self.commands);

        let mut task = tokio::task::spawn_blocking(move || {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            commands.execute(&command, &mut out)
        });

        tokio::select! {
            result = &mut task => result.context("Command worker failed")?,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping");
                self.cancel.cancel();

                // Hashing stops at the next chunk; nothing was committed
                let result = task.await.context("Command worker failed")?;
                info!("Command stopped after interrupt");
                result
            }
        }
    }
}

fn load_options(global: &GlobalArgs) -> LoadOptions {
    let mut options = LoadOptions {
        config_file: global.config.clone(),
        ..Default::default()
    };

    if let Some(registry) = &global.registry {
        options = options.with_override("registry_path", registry.to_string_lossy());
    }

    options
}
