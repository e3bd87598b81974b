//! Error types for the common crate
//!
//! This module defines the error taxonomy shared by every SCLI crate. Each
//! variant maps to a distinct, actionable message for the CLI layer.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Result type for SCLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for SCLI operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No model is registered under the key
    #[error("Model not found: '{key}' is not registered (see `scli models list`)")]
    ModelNotFound {
        /// Requested model key
        key: String,
    },

    /// The model file does not exist
    #[error("Model file not found: {}", path.display())]
    FileNotFound {
        /// Missing path
        path: PathBuf,
    },

    /// A model is already registered under the key
    #[error("Model already registered: '{key}' (remove it first with `scli models remove {key}`)")]
    DuplicateKey {
        /// Colliding model key
        key: String,
    },

    /// The model file exists but cannot be read
    #[error("Cannot read model file {}: {source}", path.display())]
    Unreadable {
        /// Unreadable path
        path: PathBuf,
        /// Underlying IO failure
        source: io::Error,
    },

    /// Stored checksum does not match the file on disk
    #[error("Checksum mismatch for '{key}': expected {expected}, found {actual}")]
    IntegrityMismatch {
        /// Model key
        key: String,
        /// Digest recorded at registration
        expected: String,
        /// Digest computed now
        actual: String,
    },

    /// Neither an explicit key nor a default model is available
    #[error("No model selected: pass a model key or set a default with `scli models use <key>`")]
    NoModelSelected,

    /// Another process kept the registry lock for too long
    #[error("Timed out after {waited:?} waiting for registry lock {}", path.display())]
    LockTimeout {
        /// Lock file path
        path: PathBuf,
        /// Time spent waiting
        waited: Duration,
    },

    /// Operation was interrupted by the user
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Classifies an IO failure on a model file
    pub fn from_file_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound { path: path.to_path_buf() },
            _ => Error::Unreadable { path: path.to_path_buf(), source: err },
        }
    }

    /// Returns true if a key or a file was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ModelNotFound { .. } | Error::FileNotFound { .. })
    }

    /// Returns true if the error is a duplicate key error
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::DuplicateKey { .. })
    }

    /// Returns true if the error is an unreadable file error
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Error::Unreadable { .. })
    }

    /// Returns true if the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Returns true if the registry lock could not be acquired
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Error::LockTimeout { .. })
    }
}
