//! Model registry
//!
//! The durable mapping of model keys to [`ModelEntry`] records. Entries keep
//! insertion order, and the whole registry is persisted as a single JSON
//! document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "default": "phi3",
//!   "models": { "phi3": { "key": "phi3", "path": "/models/phi3.gguf", ... } }
//! }
//! ```
//!
//! The top-level `default` field is authoritative; per-entry `is_default`
//! flags are normalized to it on load.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use common::error::{Error, Result};
use common::models::ModelEntry;

/// Current registry document version
pub const REGISTRY_FORMAT_VERSION: u32 = 1;

/// How a registry came out of [`Registry::load`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Document read successfully
    Loaded,

    /// No document yet; started empty
    Missing,

    /// Document unreadable or corrupt; started empty
    Recovered {
        /// Why the document was discarded
        reason: String,
    },
}

/// On-disk representation
#[derive(Debug, Serialize, Deserialize)]
struct RegistryDocument {
    version: u32,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    models: IndexMap<String, ModelEntry>,
}

/// Insertion-ordered mapping of model keys to entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    /// Entries in insertion order
    entries: IndexMap<String, ModelEntry>,

    /// Key of the default entry
    default_key: Option<String>,
}

impl Registry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a registry document, degrading to an empty registry when the
    /// document is missing or cannot be used
    pub fn load(path: &Path) -> (Self, LoadOutcome) {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No registry at {:?}, starting empty", path);
                return (Self::new(), LoadOutcome::Missing);
            }
            Err(e) => {
                let reason = format!("cannot read {}: {}", path.display(), e);
                warn!("Registry unavailable, starting empty: {}", reason);
                return (Self::new(), LoadOutcome::Recovered { reason });
            }
        };

        match Self::from_json(&raw) {
            Ok(registry) => {
                debug!("Loaded {} models from {:?}", registry.len(), path);
                (registry, LoadOutcome::Loaded)
            }
            Err(e) => {
                let reason = format!("corrupt registry {}: {}", path.display(), e);
                warn!("Registry unavailable, starting empty: {}", reason);
                (Self::new(), LoadOutcome::Recovered { reason })
            }
        }
    }

    /// Parses a registry document
    pub fn from_json(raw: &str) -> Result<Self> {
        let document: RegistryDocument = serde_json::from_str(raw)?;

        if document.version != REGISTRY_FORMAT_VERSION {
            return Err(Error::InvalidArgument(format!(
                "unsupported registry version {} (expected {})",
                document.version, REGISTRY_FORMAT_VERSION
            )));
        }

        let mut entries = IndexMap::with_capacity(document.models.len());
        for (key, mut entry) in document.models {
            entry.key = key.clone();
            entry.is_default = false;
            entries.insert(key, entry);
        }

        let mut registry = Self {
            entries,
            default_key: None,
        };

        if let Some(default_key) = document.default {
            match registry.entries.get_mut(&default_key) {
                Some(entry) => {
                    entry.is_default = true;
                    registry.default_key = Some(default_key);
                }
                None => warn!(
                    "Registry default '{}' is not a registered model, clearing it",
                    default_key
                ),
            }
        }

        Ok(registry)
    }

    /// Serializes the registry document
    pub fn to_json(&self) -> Result<String> {
        let document = RegistryDocument {
            version: REGISTRY_FORMAT_VERSION,
            default: self.default_key.clone(),
            models: self.entries.clone(),
        };

        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Persists the registry, atomically replacing any previous document
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let json = self.to_json()?;

        // Write next to the target so the rename stays on one filesystem
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        debug!("Saved {} models to {:?}", self.len(), path);

        Ok(())
    }

    /// Adds an entry; fails without changes if the key is taken
    pub fn add(&mut self, mut entry: ModelEntry, set_default: bool) -> Result<()> {
        if self.entries.contains_key(&entry.key) {
            return Err(Error::DuplicateKey { key: entry.key });
        }

        let key = entry.key.clone();
        let make_default = set_default || entry.is_default;
        entry.is_default = false;
        self.entries.insert(key.clone(), entry);

        if make_default {
            self.set_default(&key)?;
        }

        info!("Registered model {}", key);

        Ok(())
    }

    /// Removes an entry; removing the default leaves no default
    pub fn remove(&mut self, key: &str) -> Result<ModelEntry> {
        let entry = self
            .entries
            .shift_remove(key)
            .ok_or_else(|| Error::ModelNotFound { key: key.to_string() })?;

        if self.default_key.as_deref() == Some(key) {
            self.default_key = None;
            info!("Removed default model {}; no default is set now", key);
        } else {
            info!("Removed model {}", key);
        }

        Ok(entry)
    }

    /// Gets an entry by key
    pub fn get(&self, key: &str) -> Result<&ModelEntry> {
        self.entries
            .get(key)
            .ok_or_else(|| Error::ModelNotFound { key: key.to_string() })
    }

    /// Gets the default entry, if one is set
    pub fn get_default(&self) -> Option<&ModelEntry> {
        self.default_key
            .as_deref()
            .and_then(|key| self.entries.get(key))
    }

    /// Key of the default entry
    pub fn default_key(&self) -> Option<&str> {
        self.default_key.as_deref()
    }

    /// Makes an entry the default, clearing the previous one
    pub fn set_default(&mut self, key: &str) -> Result<()> {
        if !self.entries.contains_key(key) {
            return Err(Error::ModelNotFound { key: key.to_string() });
        }

        if let Some(previous) = self.default_key.take() {
            if let Some(entry) = self.entries.get_mut(&previous) {
                entry.is_default = false;
            }
        }

        if let Some(entry) = self.entries.get_mut(key) {
            entry.is_default = true;
        }
        self.default_key = Some(key.to_string());

        debug!("Default model is now {}", key);

        Ok(())
    }

    /// Applies an update to an entry
    ///
    /// The key, default flag and registration time cannot be changed this
    /// way; they are restored after `update` runs.
    pub fn update_with<F>(&mut self, key: &str, update: F) -> Result<&ModelEntry>
    where
        F: FnOnce(&mut ModelEntry),
    {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| Error::ModelNotFound { key: key.to_string() })?;

        let (is_default, added_at) = (entry.is_default, entry.added_at);
        update(entry);
        entry.key = key.to_string();
        entry.is_default = is_default;
        entry.added_at = added_at;

        Ok(entry)
    }

    /// Returns true if the key is registered
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ModelEntry> {
        self.entries.values()
    }

    /// Clones all entries in insertion order
    pub fn list(&self) -> Vec<ModelEntry> {
        self.entries.values().cloned().collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
