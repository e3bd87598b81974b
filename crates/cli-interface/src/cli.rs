//! Command-line definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use common::types::LogFormat;

/// Offline assistant: local model management
#[derive(Debug, Parser)]
#[command(name = "scli", version, about, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every command
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Configuration file (defaults to <config dir>/scli/config.toml)
    #[arg(long, global = true, value_name = "FILE", env = "SCLI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Registry document, overriding the configured location
    #[arg(long, global = true, value_name = "FILE")]
    pub registry: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, global = true, value_name = "FORMAT", value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage local model files
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ModelsCommand {
    /// Register a model file under a key
    Add {
        /// Registry key, e.g. phi3
        key: String,

        /// Path to the model file
        path: PathBuf,

        /// Make this the default model
        #[arg(long)]
        default: bool,

        /// Display name
        #[arg(long, value_name = "NAME")]
        name: Option<String>,

        /// Compute a SHA-256 checksum (slow for large files)
        #[arg(long)]
        checksum: bool,
    },

    /// Unregister a model; the file is kept
    Remove {
        key: String,
    },

    /// List registered models
    List {
        /// Print JSON instead of plain lines
        #[arg(long)]
        json: bool,
    },

    /// Make a registered model the default
    Use {
        key: String,
    },

    /// Show one model, or the default when no key is given
    Show {
        key: Option<String>,

        /// Print JSON instead of plain lines
        #[arg(long)]
        json: bool,
    },

    /// Check every registered model against the file on disk
    Verify,

    /// Re-inspect a model file and record its current size
    Refresh {
        key: String,

        /// Also recompute the checksum
        #[arg(long)]
        checksum: bool,
    },

    /// List well-known downloadable models
    Catalog,
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}
