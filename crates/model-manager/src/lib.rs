//! Model lifecycle management for SCLI
//!
//! This crate keeps track of locally stored model files: registering them
//! under stable keys, choosing a default, and re-validating the files when
//! they change or disappear underneath the registry.

pub mod artifact;
pub mod catalog;
pub mod lock;
pub mod manager;
pub mod registry;
pub mod settings;

// Re-export commonly used types
pub use artifact::{ArtifactInfo, ArtifactStore, VerifyOutcome};
pub use catalog::CatalogModel;
pub use lock::{LockGuard, RegistryLock};
pub use manager::{AddOptions, ModelManager};
pub use registry::{LoadOutcome, Registry};
pub use settings::ModelManagerSettings;
