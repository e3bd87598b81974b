//! Common data models for SCLI
//!
//! This module defines the registry record describing one model artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Magic bytes at the start of every GGUF file
pub const GGUF_MAGIC: &[u8; 4] = b"GGUF";

/// On-disk format of a model artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// llama.cpp GGUF container
    GGUF,
    /// Anything else
    Other,
}

impl ModelFormat {
    /// Detects the format from the leading bytes of a file
    pub fn from_magic(header: &[u8]) -> Self {
        if header.starts_with(GGUF_MAGIC) {
            ModelFormat::GGUF
        } else {
            ModelFormat::Other
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFormat::GGUF => write!(f, "GGUF"),
            ModelFormat::Other => write!(f, "other"),
        }
    }
}

/// A registered model artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Unique registry key; documents may leave it to the enclosing map
    #[serde(default)]
    pub key: String,
    /// Human readable name
    pub display_name: String,
    /// Absolute location of the model file
    pub path: PathBuf,
    /// File size at last inspection
    pub size_bytes: u64,
    /// Detected file format
    pub format: ModelFormat,
    /// SHA-256 hex digest, when one was computed
    #[serde(default)]
    pub checksum: Option<String>,
    /// Whether this entry is the default model
    #[serde(default)]
    pub is_default: bool,
    /// File modification time at last inspection
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    /// Registration timestamp
    pub added_at: DateTime<Utc>,
}

impl ModelEntry {
    /// Creates a non-default entry without a checksum
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        path: impl Into<PathBuf>,
        size_bytes: u64,
        format: ModelFormat,
    ) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            path: path.into(),
            size_bytes,
            format,
            checksum: None,
            is_default: false,
            modified: None,
            added_at: Utc::now(),
        }
    }

    /// Sets the stored checksum
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(ModelFormat::from_magic(b"GGUF\x03\x00\x00\x00"), ModelFormat::GGUF);
        assert_eq!(ModelFormat::from_magic(b"PK\x03\x04"), ModelFormat::Other);
        assert_eq!(ModelFormat::from_magic(b"GG"), ModelFormat::Other);
        assert_eq!(ModelFormat::from_magic(b""), ModelFormat::Other);
    }

    #[test]
    fn test_entry_serialization_uses_lowercase_format() {
        let entry = ModelEntry::new("tiny", "Tiny", "/models/tiny.gguf", 42, ModelFormat::GGUF);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["format"], "gguf");
        assert_eq!(json["checksum"], serde_json::Value::Null);
        assert_eq!(json["is_default"], false);
    }

    #[test]
    fn test_entry_without_key_deserializes() {
        let entry: ModelEntry = serde_json::from_str(
            r#"{"display_name": "Tiny", "path": "/models/tiny.gguf", "size_bytes": 42,
                "format": "gguf", "added_at": "2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert!(entry.key.is_empty());
        assert_eq!(entry.format, ModelFormat::GGUF);
        assert!(!entry.is_default);
    }
}
