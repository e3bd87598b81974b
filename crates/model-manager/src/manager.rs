//! Model manager
//!
//! Facade over the [`Registry`] and the [`ArtifactStore`]. This is the only
//! state-changing surface exposed to the CLI and the inference plugin.
//!
//! Every mutation runs one load-mutate-persist cycle while holding the
//! registry lock. Artifact inspection (and hashing, which can take minutes)
//! happens before the lock is taken, so an interrupted hash never leaves a
//! partial entry behind.

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use common::error::{Error, Result};
use common::models::ModelEntry;
use common::utils::validate_model_key;
use config::ConfigManager;

use crate::artifact::{ArtifactInfo, ArtifactStore, VerifyOutcome};
use crate::catalog;
use crate::lock::RegistryLock;
use crate::registry::{LoadOutcome, Registry};
use crate::settings::ModelManagerSettings;

/// Options for [`ModelManager::add_model_with_options`]
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Display name; defaults to the catalog name or the file stem
    pub display_name: Option<String>,

    /// Make the new entry the default model
    pub set_default: bool,

    /// Compute a checksum; `None` follows `checksum_on_add`
    pub checksum: Option<bool>,
}

/// Registers, validates and selects local model artifacts
pub struct ModelManager {
    /// Resolved settings
    settings: ModelManagerSettings,

    /// File inspection and verification
    artifacts: ArtifactStore,

    /// Cross-process lock around mutations
    lock: RegistryLock,

    /// Serializes mutations from threads of this process
    local: Mutex<()>,
}

impl ModelManager {
    /// Creates a model manager
    pub fn new(settings: ModelManagerSettings) -> Self {
        Self::with_cancellation(settings, CancellationToken::new())
    }

    /// Creates a model manager whose long-running work observes `cancel`
    pub fn with_cancellation(settings: ModelManagerSettings, cancel: CancellationToken) -> Self {
        let artifacts = ArtifactStore::new(settings.hash_buffer_size, cancel);
        let lock = RegistryLock::for_registry(
            &settings.registry_path,
            settings.lock_timeout,
            settings.stale_lock_after,
        );

        debug!("Model registry at {:?}", settings.registry_path);

        Self {
            settings,
            artifacts,
            lock,
            local: Mutex::new(()),
        }
    }

    /// Creates a model manager from configuration
    pub fn from_config(config: &ConfigManager, cancel: CancellationToken) -> Result<Self> {
        let settings = ModelManagerSettings::from_config(config)?;
        Ok(Self::with_cancellation(settings, cancel))
    }

    /// Registry document location
    pub fn registry_path(&self) -> &Path {
        &self.settings.registry_path
    }

    /// Resolved settings
    pub fn settings(&self) -> &ModelManagerSettings {
        &self.settings
    }

    /// The artifact store
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Reads the current registry without locking
    ///
    /// Saves replace the document atomically, so a reader always sees one
    /// complete version.
    pub fn load_registry(&self) -> (Registry, LoadOutcome) {
        Registry::load(&self.settings.registry_path)
    }

    fn registry(&self) -> Registry {
        self.load_registry().0
    }

    /// Registers a model file
    pub fn add_model(
        &self,
        key: &str,
        path: impl AsRef<Path>,
        display_name: Option<&str>,
        set_default: bool,
    ) -> Result<ModelEntry> {
        let options = AddOptions {
            display_name: display_name.map(str::to_string),
            set_default,
            checksum: None,
        };
        self.add_model_with_options(key, path, options)
    }

    /// Registers a model file with explicit options
    ///
    /// On success the registry references an existing, readable file.
    pub fn add_model_with_options(
        &self,
        key: &str,
        path: impl AsRef<Path>,
        options: AddOptions,
    ) -> Result<ModelEntry> {
        validate_model_key(key)?;
        let path = absolute_path(path.as_ref())?;

        // Fail fast before a potentially long hash; re-checked under the lock
        if self.registry().contains(key) {
            return Err(Error::DuplicateKey { key: key.to_string() });
        }

        let with_checksum = options.checksum.unwrap_or(self.settings.checksum_on_add);
        let info = if with_checksum {
            self.artifacts.inspect_with_checksum(&path)?
        } else {
            self.artifacts.inspect(&path)?
        };

        let display_name = options
            .display_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| catalog::find_model(key).map(|m| m.name.to_string()))
            .unwrap_or_else(|| default_display_name(key, &path));

        let mut entry = ModelEntry::new(key, display_name, path, info.size_bytes, info.format);
        apply_artifact(&mut entry, &info);

        let entry = self.mutate(|registry| {
            registry.add(entry, options.set_default)?;
            Ok(registry.get(key)?.clone())
        })?;

        info!(
            "Added model {} ({} bytes, {}) at {:?}{}",
            entry.key,
            entry.size_bytes,
            entry.format,
            entry.path,
            if entry.is_default { " as default" } else { "" }
        );

        Ok(entry)
    }

    /// Unregisters a model; the file itself is left alone
    pub fn remove_model(&self, key: &str) -> Result<ModelEntry> {
        let entry = self.mutate(|registry| registry.remove(key))?;
        info!("Model {} unregistered; {:?} was not deleted", key, entry.path);
        Ok(entry)
    }

    /// Makes a registered model the default
    pub fn set_default(&self, key: &str) -> Result<ModelEntry> {
        self.mutate(|registry| {
            registry.set_default(key)?;
            Ok(registry.get(key)?.clone())
        })
    }

    /// Resolves the model to use: the given key, else the default
    pub fn select_model(&self, key: Option<&str>) -> Result<ModelEntry> {
        let registry = self.registry();

        match key {
            Some(key) => registry.get(key).cloned(),
            None => registry.get_default().cloned().ok_or(Error::NoModelSelected),
        }
    }

    /// Gets a registered model
    pub fn get_model(&self, key: &str) -> Result<ModelEntry> {
        self.registry().get(key).cloned()
    }

    /// Lists registered models in insertion order
    pub fn list_models(&self) -> Vec<ModelEntry> {
        self.registry().list()
    }

    /// Verifies every entry; one broken model never hides the others
    pub fn revalidate_all(&self) -> IndexMap<String, bool> {
        self.revalidate_all_detailed()
            .into_iter()
            .map(|(key, outcome)| (key, outcome.is_valid()))
            .collect()
    }

    /// Verifies every entry and reports why each one failed
    pub fn revalidate_all_detailed(&self) -> IndexMap<String, VerifyOutcome> {
        let registry = self.registry();
        let mut results = IndexMap::with_capacity(registry.len());

        for entry in registry.iter() {
            // check() already logs each invalid entry
            let outcome = self.artifacts.check(entry);
            results.insert(entry.key.clone(), outcome);
        }

        let failures = results.values().filter(|o| !o.is_valid()).count();
        info!(
            "Revalidated {} models: {} valid, {} invalid",
            results.len(),
            results.len() - failures,
            failures
        );

        results
    }

    /// Re-inspects a model file and records its current size and format
    ///
    /// The checksum is recomputed when `with_checksum` is set or when the
    /// entry already had one.
    pub fn refresh_model(&self, key: &str, with_checksum: bool) -> Result<ModelEntry> {
        let current = self.get_model(key)?;

        self.artifacts.invalidate(&current.path);
        let info = if with_checksum || current.checksum.is_some() {
            self.artifacts.inspect_with_checksum(&current.path)?
        } else {
            self.artifacts.inspect(&current.path)?
        };

        let entry = self.mutate(|registry| {
            let entry = registry.update_with(key, |entry| {
                if entry.path == info.path {
                    apply_artifact(entry, &info);
                }
            })?;
            Ok(entry.clone())
        })?;

        if entry.path != info.path {
            warn!(
                "Model {} was re-registered at {:?} during refresh; left unchanged",
                key, entry.path
            );
        } else {
            info!("Refreshed model {} ({} bytes)", key, entry.size_bytes);
        }

        Ok(entry)
    }

    /// Runs one locked load-mutate-persist cycle
    ///
    /// Nothing is written when `mutation` fails.
    fn mutate<T, F>(&self, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut Registry) -> Result<T>,
    {
        let _local = self.local.lock();
        let _guard = self.lock.acquire()?;

        let path = &self.settings.registry_path;
        let (mut registry, outcome) = Registry::load(path);
        if let LoadOutcome::Recovered { reason } = &outcome {
            preserve_unusable_registry(path, reason);
        }

        let value = mutation(&mut registry)?;
        registry.save(path)?;

        Ok(value)
    }
}

/// Copies fresh inspection results into an entry
fn apply_artifact(entry: &mut ModelEntry, info: &ArtifactInfo) {
    entry.size_bytes = info.size_bytes;
    entry.format = info.format;
    entry.modified = info.modified;
    if info.checksum.is_some() {
        entry.checksum = info.checksum.clone();
    }
}

/// Makes a path absolute without resolving symlinks
fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("model path must not be empty".to_string()));
    }

    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

fn default_display_name(key: &str, path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| key.to_string())
}

/// Keeps a copy of a registry document that is about to be overwritten
fn preserve_unusable_registry(path: &Path, reason: &str) {
    if !path.exists() {
        return;
    }

    let mut backup = path.as_os_str().to_owned();
    backup.push(".corrupt");
    let backup = PathBuf::from(backup);

    match fs::copy(path, &backup) {
        Ok(_) => warn!("Unusable registry ({}) preserved at {:?}", reason, backup),
        Err(e) => warn!("Could not preserve unusable registry {:?}: {}", path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> ModelManager {
        let settings = ModelManagerSettings::new(dir.path().join("config").join("registry.json"))
            .with_lock_timeout(Duration::from_millis(200));
        ModelManager::new(settings)
    }

    fn model_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_add_then_select_returns_same_path() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let path = model_file(&dir, "phi3.gguf", b"GGUF phi3");

        let added = manager.add_model("phi3", &path, None, false).unwrap();
        let selected = manager.select_model(Some("phi3")).unwrap();

        assert_eq!(selected.path, path);
        assert_eq!(selected, added);
        assert_eq!(selected.display_name, "phi3");
        assert_eq!(selected.checksum, None);
    }

    #[test]
    fn test_add_missing_file_commits_nothing() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let err = manager
            .add_model("ghost", dir.path().join("ghost.gguf"), None, true)
            .unwrap_err();

        assert!(matches!(err, Error::FileNotFound { .. }));
        assert!(manager.list_models().is_empty());
        assert!(!manager.registry_path().exists());
    }

    #[test]
    fn test_add_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let err = manager.add_model("dir", dir.path(), None, false).unwrap_err();
        assert!(err.is_not_found());
        assert!(manager.list_models().is_empty());
    }

    #[test]
    fn test_add_rejects_invalid_key() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let path = model_file(&dir, "m.gguf", b"GGUF");

        let err = manager.add_model("bad key", &path, None, false).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_catalog_name_and_checksum_option() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let path = model_file(&dir, "tiny.gguf", b"GGUF tiny");

        let entry = manager
            .add_model_with_options(
                "tinyllama",
                &path,
                AddOptions {
                    checksum: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(entry.display_name, "TinyLlama 1.1B (Q4_K_M)");
        assert_eq!(entry.checksum.as_ref().map(String::len), Some(64));
        assert!(manager.artifacts().verify(&entry));
    }

    #[test]
    fn test_select_without_default() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        assert!(matches!(manager.select_model(None), Err(Error::NoModelSelected)));
        assert!(manager.select_model(Some("phi3")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_keeps_file() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let path = model_file(&dir, "phi3.gguf", b"GGUF");

        manager.add_model("phi3", &path, None, true).unwrap();
        manager.remove_model("phi3").unwrap();

        assert!(path.exists());
        assert!(matches!(manager.select_model(None), Err(Error::NoModelSelected)));
        assert!(manager.remove_model("phi3").unwrap_err().is_not_found());
    }

    #[test]
    fn test_refresh_picks_up_changes() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let path = model_file(&dir, "phi3.gguf", b"GGUF v1");

        manager.add_model("phi3", &path, None, true).unwrap();
        fs::write(&path, b"GGUF v2 with more weights").unwrap();
        assert!(!manager.revalidate_all()["phi3"]);

        let refreshed = manager.refresh_model("phi3", true).unwrap();
        assert_eq!(refreshed.size_bytes, 25);
        assert!(refreshed.is_default);
        assert!(refreshed.checksum.is_some());
        assert!(manager.revalidate_all()["phi3"]);
    }

    #[test]
    fn test_corrupt_registry_is_preserved_and_replaced() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        fs::create_dir_all(manager.registry_path().parent().unwrap()).unwrap();
        fs::write(manager.registry_path(), "garbage").unwrap();

        assert!(manager.list_models().is_empty());

        let path = model_file(&dir, "phi3.gguf", b"GGUF");
        manager.add_model("phi3", &path, None, false).unwrap();

        let mut backup = manager.registry_path().as_os_str().to_owned();
        backup.push(".corrupt");
        assert_eq!(fs::read_to_string(PathBuf::from(backup)).unwrap(), "garbage");
        assert_eq!(manager.list_models().len(), 1);
    }

    #[test]
    fn test_mutation_waits_for_foreign_lock() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let path = model_file(&dir, "phi3.gguf", b"GGUF");

        // Another process holds the lock
        let foreign = RegistryLock::for_registry(
            manager.registry_path(),
            Duration::from_secs(1),
            Duration::from_secs(300),
        );
        let held = foreign.acquire().unwrap();

        let err = manager.add_model("phi3", &path, None, false).unwrap_err();
        assert!(err.is_lock_timeout());
        assert!(manager.list_models().is_empty());

        drop(held);
        manager.add_model("phi3", &path, None, false).unwrap();
    }

    #[test]
    fn test_relative_paths_become_absolute() {
        let resolved = absolute_path(Path::new("models/phi3.gguf")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("models/phi3.gguf"));
        assert!(absolute_path(Path::new("")).is_err());
    }
}
