//! Local filesystem blob store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use treehub_core::error::{AppError, ErrorKind};
use treehub_core::result::AppResult;
use treehub_core::traits::blob::{BlobStore, ByteStream};
use treehub_core::types::BlobId;

/// Local filesystem blob store.
///
/// Each blob occupies one directory named by its id, containing a single
/// file carrying the blob's advisory name. Renaming a blob renames that
/// inner file; the blob's identity (the directory) never changes.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    /// Root directory for all stored blobs.
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a new local blob store rooted at the given path.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create blob root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Directory holding one blob.
    fn blob_dir(&self, blob: BlobId) -> PathBuf {
        self.root.join(blob.to_string())
    }

    /// Replace filesystem-hostile characters in an advisory name.
    fn sanitize(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        if cleaned.is_empty() {
            "blob".to_string()
        } else {
            cleaned
        }
    }

    /// Path of the single file inside a blob directory.
    async fn entry_path(&self, blob: BlobId) -> AppResult<PathBuf> {
        let dir = self.blob_dir(blob);
        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Blob not found: {blob}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read blob directory: {blob}"),
                    e,
                )
            }
        })?;
        match entries.next_entry().await? {
            Some(entry) => Ok(entry.path()),
            None => Err(AppError::not_found(format!("Blob is empty: {blob}"))),
        }
    }

    async fn open(&self, path: &Path, blob: BlobId) -> AppResult<fs::File> {
        fs::File::open(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Blob not found: {blob}"))
            } else {
                AppError::with_source(ErrorKind::Storage, format!("Failed to open blob: {blob}"), e)
            }
        })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, data: Bytes, suggested_name: &str) -> AppResult<BlobId> {
        let blob = BlobId::new();
        let dir = self.blob_dir(blob);
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create blob directory: {blob}"),
                e,
            )
        })?;
        let path = dir.join(Self::sanitize(suggested_name));
        let mut file = fs::File::create(&path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create blob file: {blob}"),
                e,
            )
        })?;
        file.write_all(&data).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, format!("Failed to write blob: {blob}"), e)
        })?;
        file.flush().await?;
        debug!(blob = %blob, bytes = data.len(), "stored blob");
        Ok(blob)
    }

    async fn read(&self, blob: BlobId) -> AppResult<ByteStream> {
        let path = self.entry_path(blob).await?;
        let file = self.open(&path, blob).await?;
        let stream = ReaderStream::new(file);
        Ok(Box::pin(stream.map(|r| r.map(|b| b.into()))))
    }

    async fn read_bytes(&self, blob: BlobId) -> AppResult<Bytes> {
        let path = self.entry_path(blob).await?;
        let data = fs::read(&path).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, format!("Failed to read blob: {blob}"), e)
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, blob: BlobId) -> AppResult<()> {
        let dir = self.blob_dir(blob);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            // Deleting an already-gone blob is not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete blob: {blob}"),
                e,
            )),
        }
    }

    async fn rename(&self, blob: BlobId, new_name: &str) -> AppResult<()> {
        let old_path = self.entry_path(blob).await?;
        let new_path = self.blob_dir(blob).join(Self::sanitize(new_name));
        if old_path == new_path {
            return Ok(());
        }
        fs::rename(&old_path, &new_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to rename blob: {blob}"),
                e,
            )
        })
    }

    async fn size(&self, blob: BlobId) -> AppResult<u64> {
        let path = self.entry_path(blob).await?;
        let meta = fs::metadata(&path).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, format!("Failed to stat blob: {blob}"), e)
        })?;
        Ok(meta.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, LocalBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().to_str().unwrap())
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_store_and_read_back() {
        let (_dir, store) = store().await;
        let blob = store
            .store(Bytes::from_static(b"hello"), "greeting.txt")
            .await
            .unwrap();
        assert_eq!(store.read_bytes(blob).await.unwrap().as_ref(), b"hello");
        assert_eq!(store.size(blob).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_rename_keeps_identity_and_content() {
        let (_dir, store) = store().await;
        let blob = store
            .store(Bytes::from_static(b"data"), "old.bin")
            .await
            .unwrap();
        store.rename(blob, "new.bin").await.unwrap();
        assert_eq!(store.read_bytes(blob).await.unwrap().as_ref(), b"data");
    }

    #[tokio::test]
    async fn test_delete_then_read_is_not_found() {
        let (_dir, store) = store().await;
        let blob = store.store(Bytes::from_static(b"x"), "x").await.unwrap();
        store.delete(blob).await.unwrap();
        store.delete(blob).await.unwrap();
        let err = store.read_bytes(blob).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_duplicate_creates_new_identity() {
        let (_dir, store) = store().await;
        let blob = store
            .store(Bytes::from_static(b"abcd"), "a.txt")
            .await
            .unwrap();
        let copy = store.duplicate(blob, "a copy.txt").await.unwrap();
        assert_ne!(blob, copy);
        assert_eq!(store.read_bytes(copy).await.unwrap().as_ref(), b"abcd");
    }

    #[tokio::test]
    async fn test_hostile_names_are_sanitized() {
        let (_dir, store) = store().await;
        let blob = store
            .store(Bytes::from_static(b"x"), "../../etc/passwd")
            .await
            .unwrap();
        assert_eq!(store.read_bytes(blob).await.unwrap().as_ref(), b"x");
    }
}
