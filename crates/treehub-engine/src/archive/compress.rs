//! Archiving: a selection of sibling nodes into one zip file.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use futures::future::BoxFuture;
use tracing::{info, warn};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::traits::access::AccessOp;
use treehub_core::types::{NodeId, UserId};
use treehub_entity::node::{validate_name, Node};
use treehub_lock::LockSet;

use super::{zip_err, ArchiveService};

impl ArchiveService {
    /// Compress `selection` (direct children of `parent`) into a new
    /// blob-backed `.zip` file node under `parent`.
    ///
    /// The whole selection is deep-locked for the duration, spanning the
    /// writer finalize: zip writers defer I/O to close time, so the lock
    /// scope must cover it. Media nodes are skipped; if nothing at all
    /// lands in the archive, the call fails and the temp file is
    /// discarded.
    pub async fn compress(
        &self,
        actor: UserId,
        parent: NodeId,
        selection: &[NodeId],
        archive_name: &str,
    ) -> AppResult<Node> {
        if selection.is_empty() {
            return Err(AppError::validation("nothing selected to archive"));
        }
        if !self.config.allow_zip_extension {
            return Err(AppError::validation(
                "creating .zip archives is disabled by site policy",
            ));
        }
        let final_name = if archive_name.to_ascii_lowercase().ends_with(".zip") {
            archive_name.to_string()
        } else {
            format!("{archive_name}.zip")
        };
        validate_name(&final_name)?;
        self.tree
            .require_access(actor, Some(parent), AccessOp::Create)
            .await?;

        for id in selection {
            let node = self.tree.store().load_required(*id).await?;
            if node.parent_id != Some(parent) {
                return Err(AppError::validation(format!(
                    "'{}' is not a direct child of the archive parent",
                    node.name
                )));
            }
            self.tree
                .require_access(actor, Some(*id), AccessOp::View)
                .await?;
        }

        // Nothing in the selection may mutate while we read it out. Each
        // item is reread under its lock so the entry names written into
        // the archive are the current ones, not pre-lock snapshots.
        let mut locks = LockSet::new(self.tree.locks().clone());
        let locked: AppResult<Vec<Node>> = async {
            let mut items = Vec::with_capacity(selection.len());
            for id in selection {
                locks.absorb(self.tree.deep_lock(*id).await?);
                let node = self.tree.store().load_required(*id).await?;
                if node.parent_id != Some(parent) {
                    return Err(AppError::validation(format!(
                        "'{}' is no longer a direct child of the archive parent",
                        node.name
                    )));
                }
                items.push(node);
            }
            Ok(items)
        }
        .await;
        let items = match locked {
            Ok(items) => items,
            Err(err) => {
                if let Err(release_err) = locks.release_all().await {
                    warn!(error = %release_err, "failed to unwind archive locks");
                }
                return Err(err);
            }
        };

        let temp_path = self
            .temp_dir
            .join(format!("archive__{}.zip", Uuid::now_v7().simple()));
        let result = self.write_archive(&temp_path, &items).await;
        if let Err(release_err) = locks.release_all().await {
            warn!(error = %release_err, "failed to release archive locks");
        }

        let node = match result {
            Ok(()) => {
                let packed = async {
                    let bytes = tokio::fs::read(&temp_path).await?;
                    self.tree
                        .add_file(
                            actor,
                            parent,
                            &final_name,
                            "application/zip",
                            bytes.into(),
                            true,
                        )
                        .await
                }
                .await;
                let _ = tokio::fs::remove_file(&temp_path).await;
                packed?
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(err);
            }
        };
        info!(archive = %node.id, name = %node.name, items = items.len(), "created archive");
        Ok(node)
    }

    async fn write_archive(&self, temp_path: &Path, items: &[Node]) -> AppResult<()> {
        if let Some(dir) = temp_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = File::create(temp_path)?;
        let mut writer = ZipWriter::new(file);
        let mut entries: usize = 0;
        for item in items {
            self.add_entry(&mut writer, item, "", &mut entries).await?;
        }
        if entries == 0 {
            return Err(AppError::archive(
                "nothing suitable to archive in the selection",
            ));
        }
        // Close is where the zip trailer is actually written.
        writer
            .finish()
            .map_err(|e| zip_err("failed to finalize archive", e))?;
        Ok(())
    }

    /// Depth-first entry writer. Archive paths always use `/`.
    fn add_entry<'a>(
        &'a self,
        writer: &'a mut ZipWriter<File>,
        node: &'a Node,
        prefix: &'a str,
        entries: &'a mut usize,
    ) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            let options = SimpleFileOptions::default();
            if node.is_folder_like() {
                let dir_path = format!("{prefix}{}/", node.name);
                writer
                    .add_directory(dir_path.as_str(), options)
                    .map_err(|e| zip_err("failed to add directory entry", e))?;
                *entries += 1;
                for child in self.tree.store().children(node.id).await? {
                    self.add_entry(writer, &child, &dir_path, entries).await?;
                }
                return Ok(());
            }
            let Some(blob) = node.blob() else {
                // Media nodes have no retrievable local content.
                return Ok(());
            };
            let bytes = self.tree.blobs().read_bytes(blob).await?;
            let file_path = format!("{prefix}{}", node.name);
            writer
                .start_file(file_path.as_str(), options)
                .map_err(|e| zip_err("failed to add file entry", e))?;
            writer.write_all(&bytes)?;
            *entries += 1;
            Ok(())
        })
    }
}
