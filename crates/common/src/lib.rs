//! Common utilities and types for SCLI
//!
//! This crate provides shared functionality used across the SCLI workspace,
//! including the error taxonomy, the model registry record and formatting
//! helpers.

pub mod error;
pub mod models;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{Error, Result};
pub use models::*;
pub use types::*;
