//! Utility functions for SCLI

use crate::error::{Error, Result};

/// Longest accepted model key
pub const MAX_KEY_LENGTH: usize = 128;

/// Formats a byte size into a human-readable string
///
/// # Examples
///
/// ```
/// use common::utils::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.0 KiB");
/// assert_eq!(format_bytes(1048576), "1.0 MiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}

/// Checks that a model key is usable as a registry key
///
/// Keys are non-empty, at most [`MAX_KEY_LENGTH`] characters, and made of
/// ASCII alphanumerics, `-`, `_` and `.`.
///
/// # Examples
///
/// ```
/// use common::utils::validate_model_key;
///
/// assert!(validate_model_key("qwen2.5-3b").is_ok());
/// assert!(validate_model_key("my model").is_err());
/// ```
pub fn validate_model_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidArgument("model key must not be empty".to_string()));
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(Error::InvalidArgument(format!(
            "model key is {} characters long, the limit is {}",
            key.len(),
            MAX_KEY_LENGTH
        )));
    }

    if let Some(bad) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(Error::InvalidArgument(format!(
            "model key '{}' contains invalid character {:?}",
            key, bad
        )));
    }

    Ok(())
}
