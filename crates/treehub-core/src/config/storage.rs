//! Blob storage configuration.

use serde::{Deserialize, Serialize};

/// Top-level storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Blob storage provider: `"local"` or `"memory"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Directory for temporary files (archive staging, extraction).
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,
    /// Path of the tree snapshot file used by the CLI.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    /// Local filesystem blob storage configuration.
    #[serde(default)]
    pub local: LocalStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            temp_dir: default_temp_dir(),
            snapshot_path: default_snapshot_path(),
            local: LocalStorageConfig::default(),
        }
    }
}

/// Local filesystem blob storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Root path for local blob storage.
    #[serde(default = "default_local_root")]
    pub root_path: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root_path: default_local_root(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_temp_dir() -> String {
    "./data/tmp".to_string()
}

fn default_snapshot_path() -> String {
    "./data/tree.json".to_string()
}

fn default_local_root() -> String {
    "./data/blobs".to_string()
}
