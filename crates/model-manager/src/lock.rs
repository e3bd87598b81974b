//! Cross-process registry lock
//!
//! A lock file next to the registry document (`registry.json.lock`) is
//! created with create-new semantics, so exactly one process can hold it.
//! The returned [`LockGuard`] removes the file when dropped, which covers
//! early returns, errors and unwinding panics alike.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use common::error::{Error, Result};

/// Delay between acquisition attempts
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Exclusive lock around the registry load-mutate-persist cycle
#[derive(Debug, Clone)]
pub struct RegistryLock {
    /// Lock file path
    path: PathBuf,

    /// Give up after waiting this long
    timeout: Duration,

    /// Lock files older than this are treated as abandoned
    stale_after: Duration,
}

/// Held registry lock; released on drop
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl RegistryLock {
    /// Creates the lock for a registry document
    pub fn for_registry(registry_path: &Path, timeout: Duration, stale_after: Duration) -> Self {
        let mut name = registry_path.as_os_str().to_owned();
        name.push(".lock");

        Self {
            path: PathBuf::from(name),
            timeout,
            stale_after,
        }
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until the lock is acquired or the timeout elapses
    pub fn acquire(&self) -> Result<LockGuard> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let started = Instant::now();

        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
            {
                Ok(mut file) => {
                    // Owner pid is informational only
                    if let Err(e) = writeln!(file, "{}", std::process::id()) {
                        trace!("Could not record pid in {:?}: {}", self.path, e);
                    }
                    debug!("Acquired registry lock {:?}", self.path);
                    return Ok(LockGuard {
                        path: self.path.clone(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if self.is_stale() {
                        warn!(
                            "Breaking stale registry lock {:?} (older than {:?})",
                            self.path, self.stale_after
                        );
                        match fs::remove_file(&self.path) {
                            Ok(()) => continue,
                            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                            Err(e) => return Err(Error::Io(e)),
                        }
                    }

                    let waited = started.elapsed();
                    if waited >= self.timeout {
                        return Err(Error::LockTimeout {
                            path: self.path.clone(),
                            waited,
                        });
                    }

                    trace!("Registry lock {:?} busy, retrying", self.path);
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    fn is_stale(&self) -> bool {
        fs::metadata(&self.path)
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map_or(false, |age| age > self.stale_after)
    }
}

impl LockGuard {
    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released registry lock {:?}", self.path),
            Err(e) => warn!("Failed to release registry lock {:?}: {}", self.path, e),
        }
    }
}
