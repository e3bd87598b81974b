//! Logging for SCLI
//!
//! This crate installs the process-wide `tracing` subscriber. Library crates
//! only emit events through the `tracing` macros; the binary calls [`init`]
//! once at startup.

pub mod logger;

// Re-export commonly used types
pub use logger::{init, LogSettings};
