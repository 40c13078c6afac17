//! In-memory blob store for tests and ephemeral runs.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::traits::blob::{BlobStore, ByteStream};
use treehub_core::types::BlobId;

/// In-memory blob store backed by a dashmap of byte buffers.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<BlobId, (String, Bytes)>,
}

impl MemoryBlobStore {
    /// Create an empty blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn count(&self) -> usize {
        self.blobs.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, data: Bytes, suggested_name: &str) -> AppResult<BlobId> {
        let blob = BlobId::new();
        self.blobs.insert(blob, (suggested_name.to_string(), data));
        Ok(blob)
    }

    async fn read(&self, blob: BlobId) -> AppResult<ByteStream> {
        let data = self.read_bytes(blob).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn read_bytes(&self, blob: BlobId) -> AppResult<Bytes> {
        self.blobs
            .get(&blob)
            .map(|e| e.value().1.clone())
            .ok_or_else(|| AppError::not_found(format!("Blob not found: {blob}")))
    }

    async fn delete(&self, blob: BlobId) -> AppResult<()> {
        self.blobs.remove(&blob);
        Ok(())
    }

    async fn rename(&self, blob: BlobId, new_name: &str) -> AppResult<()> {
        match self.blobs.get_mut(&blob) {
            Some(mut entry) => {
                entry.value_mut().0 = new_name.to_string();
                Ok(())
            }
            None => Err(AppError::not_found(format!("Blob not found: {blob}"))),
        }
    }

    async fn size(&self, blob: BlobId) -> AppResult<u64> {
        self.blobs
            .get(&blob)
            .map(|e| e.value().1.len() as u64)
            .ok_or_else(|| AppError::not_found(format!("Blob not found: {blob}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let store = MemoryBlobStore::new();
        let blob = store
            .store(Bytes::from_static(b"bytes"), "b.txt")
            .await
            .unwrap();
        assert_eq!(store.read_bytes(blob).await.unwrap().as_ref(), b"bytes");
        assert_eq!(store.size(blob).await.unwrap(), 5);
        store.delete(blob).await.unwrap();
        assert!(store.read_bytes(blob).await.is_err());
    }
}
