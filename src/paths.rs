/// Centralized platform-specific path computation
///
/// Provides consistent path handling across Windows, macOS, and Linux following
/// XDG Base Directory specification on Unix-like systems, plus the per-namespace
/// layout of raw corpora and published indexes.
use crate::error::ValidationError;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const APP_FOLDER: &str = "easy-rag";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the appropriate data directory for the current platform
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_DATA_HOME or ~/.local/share
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the appropriate config directory for the current platform
    ///
    /// - Windows: %APPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_CONFIG_HOME or ~/.config
    pub fn config_dir() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns: {data_dir}/easy-rag
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join(APP_FOLDER)
    }

    /// Returns: {config_dir}/easy-rag
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(APP_FOLDER)
    }

    /// Root of the per-namespace raw corpora
    ///
    /// Returns: {data_dir}/easy-rag/raw
    pub fn default_raw_dir() -> PathBuf {
        Self::project_data_dir().join("raw")
    }

    /// Root of the per-namespace indexes
    ///
    /// Returns: {data_dir}/easy-rag/index
    pub fn default_index_dir() -> PathBuf {
        Self::project_data_dir().join("index")
    }

    /// Get default config file path
    ///
    /// Returns: {config_dir}/easy-rag/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }
}

fn namespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("namespace pattern is valid")
    })
}

/// Check that a knowledge base name is safe to use as a directory name
pub fn validate_namespace(namespace: &str) -> Result<(), ValidationError> {
    if namespace.is_empty() {
        return Err(ValidationError::Empty("knowledge base name".to_string()));
    }
    if !namespace_pattern().is_match(namespace) {
        return Err(ValidationError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}

/// Raw corpus directory of a namespace: {raw_root}/{namespace}
pub fn namespace_raw_dir(raw_root: &Path, namespace: &str) -> PathBuf {
    raw_root.join(namespace)
}

/// Index directory of a namespace: {index_root}/{namespace}
pub fn namespace_index_dir(index_root: &Path, namespace: &str) -> PathBuf {
    index_root.join(namespace)
}

/// Lock file guarding ingest of a namespace: {index_root}/.locks/{namespace}.lock
pub fn namespace_lock_path(index_root: &Path, namespace: &str) -> PathBuf {
    index_root.join(".locks").join(format!("{}.lock", namespace))
}
