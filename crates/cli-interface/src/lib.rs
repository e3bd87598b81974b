//! Command-line interface for SCLI
//!
//! This crate defines the `scli models` command tree and runs it against a
//! [`model_manager::ModelManager`], printing plain lines.

pub mod cli;
pub mod commands;
pub mod formatters;

// Re-export commonly used types
pub use cli::{Cli, Commands, GlobalArgs, ModelsCommand};
pub use commands::{exit_code, CommandManager, CommandOutcome};
