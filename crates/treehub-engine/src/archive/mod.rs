//! Zip archive engine: compress a selection of nodes into a blob-backed
//! archive file, and extract an archive file back into the tree.
//!
//! Archive I/O is blocking by design; callers accept operation-duration
//! blocking for it. Both directions stage everything under uuid-named
//! paths in the configured temp directory, and both discard their temp
//! state on failure. Nodes already created by a partially-failed extract
//! are kept, consistent with the partial-success policy of the other
//! recursive operations.

mod compress;
mod extract;

use std::path::PathBuf;
use std::sync::Arc;

use treehub_core::config::archive::ArchiveConfig;
use treehub_core::config::storage::StorageConfig;
use treehub_core::error::{AppError, ErrorKind};

use crate::tree::TreeService;

/// Map a zip crate error into the archive error kind.
fn zip_err(context: &str, err: zip::result::ZipError) -> AppError {
    AppError::with_source(ErrorKind::Archive, context.to_string(), err)
}

/// Buffer size for zip entry copies.
const COPY_BUFFER: usize = 64 * 1024;

/// Zip compress/extract over tree nodes.
#[derive(Debug)]
pub struct ArchiveService {
    tree: Arc<TreeService>,
    config: ArchiveConfig,
    temp_dir: PathBuf,
}

impl ArchiveService {
    /// Create an archive service staging its temp files per the storage
    /// configuration.
    pub fn new(tree: Arc<TreeService>, config: ArchiveConfig, storage: &StorageConfig) -> Self {
        Self {
            tree,
            config,
            temp_dir: PathBuf::from(&storage.temp_dir),
        }
    }

    /// The archive name with its extension removed (used to name the
    /// intermediate folder an extract may introduce).
    fn strip_archive_extension(name: &str) -> &str {
        name.strip_suffix(".zip")
            .or_else(|| name.strip_suffix(".ZIP"))
            .unwrap_or(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_archive_extension() {
        assert_eq!(ArchiveService::strip_archive_extension("report.zip"), "report");
        assert_eq!(ArchiveService::strip_archive_extension("report.ZIP"), "report");
        assert_eq!(ArchiveService::strip_archive_extension("report.tar"), "report.tar");
    }
}
