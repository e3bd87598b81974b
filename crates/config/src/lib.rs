//! Configuration management for SCLI
//!
//! This crate provides layered configuration (defaults, TOML file,
//! environment, command-line overrides) and the default on-disk locations.

pub mod defaults;
pub mod manager;

// Re-export commonly used types
pub use defaults::DefaultConfig;
pub use manager::{ConfigManager, LoadOptions};
