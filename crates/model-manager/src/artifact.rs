//! Artifact store
//!
//! Inspects model files on disk and caches what it learns about them.
//! Inspection is split in two phases: [`ArtifactStore::inspect`] only stats
//! the file and reads its magic bytes, while checksums are computed only on
//! explicit request because model files routinely weigh several gigabytes.
//! The store never writes to, moves or deletes a model file.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use common::error::{Error, Result};
use common::models::{ModelEntry, ModelFormat, GGUF_MAGIC};

/// What the store learned about a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    /// Inspected path
    pub path: PathBuf,

    /// File size in bytes
    pub size_bytes: u64,

    /// Detected format
    pub format: ModelFormat,

    /// SHA-256 hex digest, only present when explicitly requested
    pub checksum: Option<String>,

    /// Modification time reported by the filesystem
    pub modified: Option<DateTime<Utc>>,
}

/// Result of checking a registered entry against the file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// File present, readable, and matching the stored metadata
    Valid,

    /// File no longer exists
    Missing,

    /// File exists but cannot be read
    Unreadable(String),

    /// File size differs from the registered size
    SizeMismatch {
        /// Registered size
        expected: u64,
        /// Size on disk
        actual: u64,
    },

    /// File content no longer matches the stored checksum
    IntegrityMismatch {
        /// Registered digest
        expected: String,
        /// Digest computed now
        actual: String,
    },

    /// Hashing was cancelled before it finished
    Interrupted,
}

impl VerifyOutcome {
    /// Returns true if the entry is usable
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyOutcome::Valid)
    }
}

impl fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyOutcome::Valid => write!(f, "ok"),
            VerifyOutcome::Missing => write!(f, "file missing"),
            VerifyOutcome::Unreadable(reason) => write!(f, "unreadable: {}", reason),
            VerifyOutcome::SizeMismatch { expected, actual } => {
                write!(f, "size changed: expected {} bytes, found {}", expected, actual)
            }
            VerifyOutcome::IntegrityMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {}, found {}", expected, actual)
            }
            VerifyOutcome::Interrupted => write!(f, "verification interrupted"),
        }
    }
}

/// Cached facts about one path, valid while size and mtime are unchanged
#[derive(Debug, Clone)]
struct CachedArtifact {
    size_bytes: u64,
    modified: Option<SystemTime>,
    format: ModelFormat,
    checksum: Option<String>,
}

impl CachedArtifact {
    fn is_fresh(&self, size_bytes: u64, modified: Option<SystemTime>) -> bool {
        self.size_bytes == size_bytes && self.modified == modified
    }
}

/// Inspects and verifies model files
pub struct ArtifactStore {
    /// Derived metadata keyed by path
    cache: DashMap<PathBuf, CachedArtifact>,

    /// Read buffer size for hashing
    buffer_size: usize,

    /// Checked between chunks while hashing
    cancel: CancellationToken,
}

impl ArtifactStore {
    /// Creates a new artifact store
    pub fn new(buffer_size: usize, cancel: CancellationToken) -> Self {
        Self {
            cache: DashMap::new(),
            buffer_size: buffer_size.max(1),
            cancel,
        }
    }

    /// Stats a file and detects its format without hashing it
    pub fn inspect(&self, path: &Path) -> Result<ArtifactInfo> {
        let (size_bytes, modified) = stat(path)?;

        let cached_format = self
            .cache
            .get(path)
            .filter(|cached| cached.is_fresh(size_bytes, modified))
            .map(|cached| cached.format);

        let format = match cached_format {
            Some(format) => {
                trace!("Artifact cache hit for {:?}", path);
                format
            }
            None => {
                let format = detect_format(path)?;
                self.cache.insert(
                    path.to_path_buf(),
                    CachedArtifact {
                        size_bytes,
                        modified,
                        format,
                        checksum: None,
                    },
                );
                format
            }
        };

        Ok(ArtifactInfo {
            path: path.to_path_buf(),
            size_bytes,
            format,
            checksum: None,
            modified: modified.map(DateTime::<Utc>::from),
        })
    }

    /// Inspects a file and computes its checksum
    pub fn inspect_with_checksum(&self, path: &Path) -> Result<ArtifactInfo> {
        let mut info = self.inspect(path)?;
        info.checksum = Some(self.checksum(path)?);
        Ok(info)
    }

    /// Returns the SHA-256 of a file, reusing a cached digest when the file
    /// is unchanged since it was computed
    pub fn checksum(&self, path: &Path) -> Result<String> {
        let (size_bytes, modified) = stat(path)?;

        if let Some(cached) = self.cache.get(path) {
            if cached.is_fresh(size_bytes, modified) {
                if let Some(checksum) = &cached.checksum {
                    trace!("Checksum cache hit for {:?}", path);
                    return Ok(checksum.clone());
                }
            }
        }

        let checksum = self.compute_checksum(path)?;
        self.remember_checksum(path, size_bytes, modified, &checksum)?;

        Ok(checksum)
    }

    /// Returns true if the entry's file exists, is readable and matches the
    /// stored size and checksum
    pub fn verify(&self, entry: &ModelEntry) -> bool {
        self.check(entry).is_valid()
    }

    /// Checks an entry against the file on disk
    ///
    /// A stored checksum is always recomputed from the file rather than
    /// taken from the cache. Failures are reported, never raised.
    pub fn check(&self, entry: &ModelEntry) -> VerifyOutcome {
        let outcome = self.check_inner(entry);

        if !outcome.is_valid() {
            warn!("Model {} failed verification: {}", entry.key, outcome);
        } else {
            debug!("Model {} verified", entry.key);
        }

        outcome
    }

    fn check_inner(&self, entry: &ModelEntry) -> VerifyOutcome {
        let path = entry.path.as_path();

        let (size_bytes, modified) = match stat(path) {
            Ok(stat) => stat,
            Err(err) => return outcome_for_error(err),
        };

        if size_bytes != entry.size_bytes {
            return VerifyOutcome::SizeMismatch {
                expected: entry.size_bytes,
                actual: size_bytes,
            };
        }

        let expected = match &entry.checksum {
            Some(expected) => expected,
            None => {
                // Without a digest, readability is the remaining check
                return match detect_format(path) {
                    Ok(_) => VerifyOutcome::Valid,
                    Err(err) => outcome_for_error(err),
                };
            }
        };

        let actual = match self.compute_checksum(path) {
            Ok(actual) => actual,
            Err(err) => return outcome_for_error(err),
        };

        if let Err(err) = self.remember_checksum(path, size_bytes, modified, &actual) {
            debug!("Not caching checksum for {:?}: {}", path, err);
        }

        if actual.eq_ignore_ascii_case(expected) {
            VerifyOutcome::Valid
        } else {
            VerifyOutcome::IntegrityMismatch {
                expected: expected.clone(),
                actual,
            }
        }
    }

    /// Drops cached metadata for a path
    pub fn invalidate(&self, path: &Path) {
        self.cache.remove(path);
    }

    /// Number of cached paths
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn remember_checksum(
        &self,
        path: &Path,
        size_bytes: u64,
        modified: Option<SystemTime>,
        checksum: &str,
    ) -> Result<()> {
        let format = match self.cache.get(path) {
            Some(cached) if cached.is_fresh(size_bytes, modified) => cached.format,
            _ => detect_format(path)?,
        };

        self.cache.insert(
            path.to_path_buf(),
            CachedArtifact {
                size_bytes,
                modified,
                format,
                checksum: Some(checksum.to_string()),
            },
        );

        Ok(())
    }

    fn compute_checksum(&self, path: &Path) -> Result<String> {
        debug!("Computing SHA-256 of {:?}", path);

        let mut file = File::open(path).map_err(|e| Error::from_file_io(path, e))?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.buffer_size];
        let mut hashed = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled(format!(
                    "checksum of {} interrupted after {} bytes",
                    path.display(),
                    hashed
                )));
            }

            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from_file_io(path, e)),
            };

            hasher.update(&buffer[..read]);
            hashed += read as u64;
        }

        Ok(hex::encode(hasher.finalize()))
    }
}

/// Reads size and mtime, rejecting anything that is not a regular file
fn stat(path: &Path) -> Result<(u64, Option<SystemTime>)> {
    let metadata = fs::metadata(path).map_err(|e| Error::from_file_io(path, e))?;

    // Directories and other special files do not count as model files
    if !metadata.is_file() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    Ok((metadata.len(), metadata.modified().ok()))
}

/// Reads the leading magic bytes; also proves the file is readable
fn detect_format(path: &Path) -> Result<ModelFormat> {
    let file = File::open(path).map_err(|e| Error::from_file_io(path, e))?;

    let mut header = Vec::with_capacity(GGUF_MAGIC.len());
    file.take(GGUF_MAGIC.len() as u64)
        .read_to_end(&mut header)
        .map_err(|e| Error::from_file_io(path, e))?;

    Ok(ModelFormat::from_magic(&header))
}

fn outcome_for_error(err: Error) -> VerifyOutcome {
    match err {
        Error::FileNotFound { .. } => VerifyOutcome::Missing,
        Error::Cancelled(_) => VerifyOutcome::Interrupted,
        other => VerifyOutcome::Unreadable(other.to_string()),
    }
}
