//! # treehub-storage
//!
//! Blob store implementations for TreeHub behind the
//! [`BlobStore`](treehub_core::traits::blob::BlobStore) trait:
//!
//! - **local**: files under a root directory on the local filesystem
//! - **memory**: in-process byte buffers, for tests and ephemeral runs
//!
//! The provider is selected at runtime based on configuration.

pub mod local;
pub mod memory;

use std::sync::Arc;

use treehub_core::config::storage::StorageConfig;
use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::traits::blob::BlobStore;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

/// Build the configured blob store.
pub async fn from_config(config: &StorageConfig) -> AppResult<Arc<dyn BlobStore>> {
    match config.provider.as_str() {
        "local" => {
            let provider = LocalBlobStore::new(&config.local.root_path).await?;
            Ok(Arc::new(provider))
        }
        "memory" => Ok(Arc::new(MemoryBlobStore::new())),
        other => Err(AppError::configuration(format!(
            "Unknown blob storage provider: '{other}'. Supported: local, memory"
        ))),
    }
}
