//! Known downloadable models
//!
//! A static list of popular GGUF models. The catalog only supplies names and
//! suggested file locations; downloading is left to external tools.

use std::path::{Path, PathBuf};

/// A well-known model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogModel {
    /// Suggested registry key
    pub key: &'static str,
    /// Display name
    pub name: &'static str,
    /// File name used by the download helper
    pub filename: &'static str,
    /// Direct download URL
    pub url: &'static str,
    /// Approximate download size
    pub approx_size: &'static str,
    /// One-line description
    pub description: &'static str,
}

impl CatalogModel {
    /// Where the download helper places this model inside `models_dir`
    pub fn suggested_path(&self, models_dir: &Path) -> PathBuf {
        models_dir.join(self.filename)
    }
}

static MODELS: &[CatalogModel] = &[
    CatalogModel {
        key: "phi-3-mini",
        name: "Phi-3 Mini 3.8B (Q4_K_M)",
        filename: "phi-3-mini-4k-instruct-q4.gguf",
        url: "https://huggingface.co/microsoft/Phi-3-mini-4k-instruct-gguf/resolve/main/Phi-3-mini-4k-instruct-q4.gguf",
        approx_size: "~2.3GB",
        description: "Microsoft's Phi-3 Mini, excellent for general chat and coding",
    },
    CatalogModel {
        key: "tinyllama",
        name: "TinyLlama 1.1B (Q4_K_M)",
        filename: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
        url: "https://huggingface.co/TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF/resolve/main/tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
        approx_size: "~700MB",
        description: "Fast and lightweight, good for quick responses",
    },
    CatalogModel {
        key: "qwen2.5-3b",
        name: "Qwen2.5 3B (Q4_K_M)",
        filename: "qwen2.5-3b-instruct-q4_k_m.gguf",
        url: "https://huggingface.co/Qwen/Qwen2.5-3B-Instruct-GGUF/resolve/main/qwen2.5-3b-instruct-q4_k_m.gguf",
        approx_size: "~2.0GB",
        description: "Excellent for coding tasks and long context",
    },
    CatalogModel {
        key: "qwen2.5-0.5b",
        name: "Qwen2.5 0.5B (Q4_K_M)",
        filename: "qwen2.5-0.5b-instruct-q4_k_m.gguf",
        url: "https://huggingface.co/Qwen/Qwen2.5-0.5B-Instruct-GGUF/resolve/main/qwen2.5-0.5b-instruct-q4_k_m.gguf",
        approx_size: "~350MB",
        description: "Ultra-lightweight, runs on any device",
    },
];

/// All catalog models
pub fn available_models() -> &'static [CatalogModel] {
    MODELS
}

/// Looks up a catalog model by key
pub fn find_model(key: &str) -> Option<&'static CatalogModel> {
    MODELS.iter().find(|m| m.key == key)
}
