//! Archive engine configuration.

use serde::{Deserialize, Serialize};

/// Archive (zip) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Whether creating `.zip` files is allowed by site policy.
    #[serde(default = "default_allow_zip")]
    pub allow_zip_extension: bool,
    /// Maximum number of entries accepted when extracting an archive.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Maximum total extracted size in bytes (default 10 GB).
    #[serde(default = "default_max_extracted")]
    pub max_extracted_bytes: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            allow_zip_extension: default_allow_zip(),
            max_entries: default_max_entries(),
            max_extracted_bytes: default_max_extracted(),
        }
    }
}

fn default_allow_zip() -> bool {
    true
}

fn default_max_entries() -> usize {
    10_000
}

fn default_max_extracted() -> u64 {
    10 * 1024 * 1024 * 1024
}
