//! End-to-end model lifecycle tests against a temporary registry

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::Error;
use model_manager::{ModelManager, ModelManagerSettings, Registry, RegistryLock, VerifyOutcome};
use tempfile::TempDir;

fn registry_path(dir: &TempDir) -> PathBuf {
    dir.path().join("state").join("registry.json")
}

fn open(dir: &TempDir) -> ModelManager {
    let settings =
        ModelManagerSettings::new(registry_path(dir)).with_lock_timeout(Duration::from_secs(5));
    ModelManager::new(settings)
}

fn write_model(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    let mut content = b"GGUF".to_vec();
    content.resize(size.max(4), 7);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn register_two_models_and_switch_default() {
    let dir = TempDir::new().unwrap();
    let phi3 = write_model(dir.path(), "phi3.gguf", 2048);
    let tiny = write_model(dir.path(), "tiny.gguf", 1024);

    let manager = open(&dir);
    manager.add_model("phi3", &phi3, None, true).unwrap();
    manager.add_model("tiny", &tiny, None, false).unwrap();

    assert_eq!(manager.select_model(None).unwrap().key, "phi3");

    manager.set_default("tiny").unwrap();
    let selected = manager.select_model(None).unwrap();
    assert_eq!(selected.key, "tiny");
    assert_eq!(selected.path, tiny);

    let defaults: Vec<_> = manager
        .list_models()
        .into_iter()
        .filter(|m| m.is_default)
        .map(|m| m.key)
        .collect();
    assert_eq!(defaults, vec!["tiny".to_string()]);

    // A fresh manager sees the same state
    let reopened = open(&dir);
    assert_eq!(reopened.list_models(), manager.list_models());
    assert_eq!(reopened.select_model(None).unwrap().key, "tiny");
}

#[test]
fn duplicate_add_leaves_registry_untouched() {
    let dir = TempDir::new().unwrap();
    let first = write_model(dir.path(), "first.gguf", 100);
    let second = write_model(dir.path(), "second.gguf", 200);

    let manager = open(&dir);
    manager.add_model("phi3", &first, Some("Phi 3"), false).unwrap();
    let before = fs::read_to_string(registry_path(&dir)).unwrap();

    let err = manager.add_model("phi3", &second, None, true).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey { ref key } if key == "phi3"));

    let after = fs::read_to_string(registry_path(&dir)).unwrap();
    assert_eq!(before, after);

    let entry = manager.get_model("phi3").unwrap();
    assert_eq!(entry.path, first);
    assert_eq!(entry.display_name, "Phi 3");
    assert!(!entry.is_default);
}

#[test]
fn removing_default_leaves_no_default() {
    let dir = TempDir::new().unwrap();
    let phi3 = write_model(dir.path(), "phi3.gguf", 64);
    let tiny = write_model(dir.path(), "tiny.gguf", 64);

    let manager = open(&dir);
    manager.add_model("phi3", &phi3, None, true).unwrap();
    manager.add_model("tiny", &tiny, None, false).unwrap();

    manager.remove_model("phi3").unwrap();

    assert!(matches!(manager.select_model(None), Err(Error::NoModelSelected)));
    assert!(manager.list_models().iter().all(|m| !m.is_default));
    assert!(phi3.exists());

    let (registry, _) = Registry::load(&registry_path(&dir));
    assert_eq!(registry.default_key(), None);
    assert_eq!(registry.len(), 1);
}

#[test]
fn revalidate_reports_deleted_files() {
    let dir = TempDir::new().unwrap();
    let manager = open(&dir);

    let mut paths = Vec::new();
    for i in 0..5 {
        let path = write_model(dir.path(), &format!("m{}.gguf", i), 32 + i);
        manager.add_model(&format!("m{}", i), &path, None, false).unwrap();
        paths.push(path);
    }

    fs::remove_file(&paths[1]).unwrap();
    fs::remove_file(&paths[3]).unwrap();

    let results = manager.revalidate_all();
    assert_eq!(results.len(), 5);
    assert_eq!(results.values().filter(|valid| !**valid).count(), 2);
    assert!(!results["m1"]);
    assert!(!results["m3"]);
    assert!(results["m0"] && results["m2"] && results["m4"]);

    let detailed = manager.revalidate_all_detailed();
    assert_eq!(detailed["m1"], VerifyOutcome::Missing);

    // Entries are reported, never pruned
    assert_eq!(manager.list_models().len(), 5);
}

#[test]
fn checksum_detects_same_size_tampering() {
    let dir = TempDir::new().unwrap();
    let path = write_model(dir.path(), "phi3.gguf", 256);

    let settings = ModelManagerSettings::new(registry_path(&dir)).with_checksum_on_add(true);
    let manager = ModelManager::new(settings);
    let entry = manager.add_model("phi3", &path, None, false).unwrap();
    assert!(entry.checksum.is_some());

    let mut content = fs::read(&path).unwrap();
    content[100] ^= 0xff;
    fs::write(&path, content).unwrap();

    let detailed = manager.revalidate_all_detailed();
    assert!(matches!(
        detailed["phi3"],
        VerifyOutcome::IntegrityMismatch { .. }
    ));
}

#[test]
fn concurrent_adds_all_persist() {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(open(&dir));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let path = write_model(dir.path(), &format!("c{}.gguf", i), 16);
            thread::spawn(move || manager.add_model(&format!("c{}", i), &path, None, false))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(open(&dir).list_models().len(), 8);
}

#[test]
fn two_managers_share_the_lock() {
    let dir = TempDir::new().unwrap();
    let first = Arc::new(open(&dir));
    let second = Arc::new(open(&dir));

    let handles: Vec<_> = [first, second]
        .into_iter()
        .enumerate()
        .flat_map(|(m, manager)| {
            (0..4).map(move |i| (m, i, Arc::clone(&manager))).collect::<Vec<_>>()
        })
        .map(|(m, i, manager)| {
            let path = write_model(dir.path(), &format!("p{}-{}.gguf", m, i), 16);
            thread::spawn(move || manager.add_model(&format!("p{}-{}", m, i), &path, None, false))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(open(&dir).list_models().len(), 8);
}

#[test]
fn held_lock_blocks_mutation_but_not_reads() {
    let dir = TempDir::new().unwrap();
    let path = write_model(dir.path(), "phi3.gguf", 16);

    let settings = ModelManagerSettings::new(registry_path(&dir))
        .with_lock_timeout(Duration::from_millis(150));
    let manager = ModelManager::new(settings);
    manager.add_model("phi3", &path, None, true).unwrap();

    let other = RegistryLock::for_registry(
        &registry_path(&dir),
        Duration::from_secs(1),
        Duration::from_secs(300),
    );
    let _held = other.acquire().unwrap();

    assert!(manager.set_default("phi3").unwrap_err().is_lock_timeout());
    assert!(manager.remove_model("phi3").unwrap_err().is_lock_timeout());
    assert_eq!(manager.select_model(None).unwrap().key, "phi3");
}
