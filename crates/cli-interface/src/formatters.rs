//! Plain line output for model commands

use chrono::{DateTime, Local, Utc};
use std::path::Path;

use common::models::ModelEntry;
use common::utils::format_bytes;
use model_manager::{CatalogModel, VerifyOutcome};

/// Directory the download helper stores models in
const MODELS_DIR: &str = "./models";

/// Marker for the default model in listings
const DEFAULT_MARKER: &str = "*";

/// One listing line: marker, key, size, format, display name and path
pub fn entry_line(entry: &ModelEntry) -> String {
    let marker = if entry.is_default { DEFAULT_MARKER } else { " " };
    format!(
        "{} {:<16} {:>10}  {:<5}  {}  ({})",
        marker,
        entry.key,
        format_bytes(entry.size_bytes),
        entry.format.to_string(),
        entry.display_name,
        entry.path.display()
    )
}

/// All fields of an entry, one `name: value` pair per line
pub fn entry_details(entry: &ModelEntry) -> Vec<String> {
    vec![
        format!("key:       {}", entry.key),
        format!("name:      {}", entry.display_name),
        format!("path:      {}", entry.path.display()),
        format!(
            "size:      {} ({} bytes)",
            format_bytes(entry.size_bytes),
            entry.size_bytes
        ),
        format!("format:    {}", entry.format),
        format!(
            "checksum:  {}",
            entry.checksum.as_deref().unwrap_or("(not computed)")
        ),
        format!("default:   {}", if entry.is_default { "yes" } else { "no" }),
        format!(
            "modified:  {}",
            entry.modified.map(timestamp).unwrap_or_else(|| "unknown".to_string())
        ),
        format!("added:     {}", timestamp(entry.added_at)),
    ]
}

/// Verification result for one model
pub fn outcome_line(key: &str, outcome: &VerifyOutcome) -> String {
    let status = if outcome.is_valid() { "ok" } else { "INVALID" };
    match outcome {
        VerifyOutcome::Valid => format!("{:<7} {}", status, key),
        other => format!("{:<7} {}: {}", status, key, other),
    }
}

/// Catalog line with a hint for registering the model
pub fn catalog_lines(model: &CatalogModel) -> Vec<String> {
    vec![
        format!("{:<14} {} ({})", model.key, model.name, model.approx_size),
        format!("               {}", model.description),
        format!("               {}", model.url),
        format!(
            "               scli models add {} {}",
            model.key,
            model.suggested_path(Path::new(MODELS_DIR)).display()
        ),
    ]
}

fn timestamp(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
