//! Blob store trait for the content storage substrate.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::result::AppResult;
use crate::types::BlobId;

/// A byte stream type used for reading blob contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Trait for the underlying content-addressed blob store.
///
/// Blob identity is independent of tree node identity; a file-like node
/// holds exactly one [`BlobId`]. Implementations exist for the local
/// filesystem and for in-memory (test) storage.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Store a complete byte buffer and return its new blob identifier.
    /// The suggested name is advisory (used for on-disk naming only).
    async fn store(&self, data: Bytes, suggested_name: &str) -> AppResult<BlobId>;

    /// Read a blob as a byte stream.
    async fn read(&self, blob: BlobId) -> AppResult<ByteStream>;

    /// Read a blob into memory as a complete byte vector.
    async fn read_bytes(&self, blob: BlobId) -> AppResult<Bytes>;

    /// Delete a blob.
    async fn delete(&self, blob: BlobId) -> AppResult<()>;

    /// Rename a blob's advisory name (identity is unchanged).
    async fn rename(&self, blob: BlobId, new_name: &str) -> AppResult<()>;

    /// Size of a blob in bytes.
    async fn size(&self, blob: BlobId) -> AppResult<u64>;

    /// Duplicate a blob's content under a new identity.
    async fn duplicate(&self, blob: BlobId, suggested_name: &str) -> AppResult<BlobId> {
        let data = self.read_bytes(blob).await?;
        self.store(data, suggested_name).await
    }
}
