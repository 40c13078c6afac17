//! Unarchiving: one zip file node back into a subtree.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use zip::ZipArchive;

use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::traits::access::AccessOp;
use treehub_core::types::{NodeId, UserId};
use treehub_entity::node::Node;
use treehub_lock::keys;

use super::{zip_err, ArchiveService, COPY_BUFFER};

/// One archive entry staged on local disk.
///
/// Staged file contents live under a synthetic numeric name: the
/// archive's internal names never touch the local filesystem, so
/// character-set or length mismatches cannot silently rename anything.
struct StagedEntry {
    /// Normalized path components inside the archive.
    path: Vec<String>,
    is_dir: bool,
    /// Local staging file, for file entries.
    local: Option<PathBuf>,
    /// Modification time embedded in the archive, if any.
    mtime: Option<DateTime<Utc>>,
}

impl ArchiveService {
    /// Extract the archive held by the file node `source` into `dest`
    /// (the source's own parent when `None`), returning the folder the
    /// entries landed in.
    ///
    /// When the archive has more than one top-level entry, an
    /// intermediate folder named after the archive (sans extension) is
    /// created so the destination is not flooded; a single top-level
    /// entry goes into the destination directly. Entries already created
    /// when a later entry fails are kept.
    pub async fn extract(
        &self,
        actor: UserId,
        source: NodeId,
        dest: Option<NodeId>,
    ) -> AppResult<Node> {
        let src = self.tree.store().load_required(source).await?;
        let blob = src.blob().ok_or_else(|| {
            AppError::validation(format!("'{}' has no archive content", src.name))
        })?;
        self.tree
            .require_access(actor, Some(source), AccessOp::View)
            .await?;
        let dest_id = dest.or(src.parent_id).ok_or_else(|| {
            AppError::validation("an extraction destination is required for a root-level archive")
        })?;
        let dest_node = self.tree.store().load_required(dest_id).await?;
        if !dest_node.is_folder_like() {
            return Err(AppError::validation(format!(
                "'{}' cannot contain children",
                dest_node.name
            )));
        }
        self.tree
            .require_access(actor, Some(dest_id), AccessOp::Create)
            .await?;

        let staging = self
            .temp_dir
            .join(format!("extract__{}", Uuid::now_v7().simple()));
        tokio::fs::create_dir_all(&staging).await?;

        let result = self
            .extract_inner(actor, &src, blob, &dest_node, &staging)
            .await;
        if let Err(remove_err) = tokio::fs::remove_dir_all(&staging).await {
            warn!(error = %remove_err, "failed to remove extraction staging directory");
        }
        let landed = result?;
        self.tree.enqueue_size_update(vec![landed.id]);
        info!(archive = %source, dest = %landed.id, "extracted archive");
        Ok(landed)
    }

    async fn extract_inner(
        &self,
        actor: UserId,
        src: &Node,
        blob: treehub_core::types::BlobId,
        dest: &Node,
        staging: &Path,
    ) -> AppResult<Node> {
        // The source lock spans only the blob read; the archive is
        // processed from the staged copy.
        let archive_path = staging.join("source.zip");
        self.tree.locks().lock(&keys::edit(src.id)).await?;
        let staged: AppResult<()> = async {
            let bytes = self.tree.blobs().read_bytes(blob).await?;
            tokio::fs::write(&archive_path, &bytes).await?;
            Ok(())
        }
        .await;
        self.tree.locks().release(&keys::edit(src.id)).await?;
        staged?;

        let entries = self.stage_entries(&archive_path, staging)?;
        if entries.is_empty() {
            return Err(AppError::archive(format!(
                "'{}' contains no usable entries",
                src.name
            )));
        }

        // More than one top-level entry gets an intermediate folder so
        // the destination is not flooded with loose entries.
        let top_level: std::collections::HashSet<&str> = entries
            .iter()
            .filter_map(|e| e.path.first().map(String::as_str))
            .collect();
        let effective_dest = if top_level.len() > 1 {
            self.tree
                .create_folder(
                    actor,
                    Some(dest.id),
                    Self::strip_archive_extension(&src.name),
                    true,
                )
                .await?
        } else {
            dest.clone()
        };

        // Directory entries precede their contents by format convention,
        // but intermediate folders are still created on demand for
        // archives that omit explicit directory entries.
        let mut created: HashMap<String, NodeId> = HashMap::new();
        for entry in &entries {
            if entry.is_dir {
                let folder_id = self
                    .ensure_folder_chain(actor, effective_dest.id, &entry.path, &mut created)
                    .await?;
                if let Some(mtime) = entry.mtime {
                    self.apply_mtime(folder_id, mtime).await?;
                }
                continue;
            }
            let (name, parents) = match entry.path.split_last() {
                Some(split) => split,
                None => continue,
            };
            let parent_id = self
                .ensure_folder_chain(actor, effective_dest.id, parents, &mut created)
                .await?;
            let local = entry.local.as_ref().ok_or_else(|| {
                AppError::archive(format!("staged content missing for '{name}'"))
            })?;
            let bytes = tokio::fs::read(local).await?;
            let node = self
                .tree
                .add_file(
                    actor,
                    parent_id,
                    name,
                    "application/octet-stream",
                    bytes.into(),
                    true,
                )
                .await?;
            if let Some(mtime) = entry.mtime {
                self.apply_mtime(node.id, mtime).await?;
            }
        }
        Ok(effective_dest)
    }

    /// Read the staged archive, enforce the entry-count and total-size
    /// limits, and copy every file entry out under a numeric name.
    fn stage_entries(&self, archive_path: &Path, staging: &Path) -> AppResult<Vec<StagedEntry>> {
        let file = File::open(archive_path)?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| zip_err("failed to open archive", e))?;
        if archive.len() > self.config.max_entries {
            return Err(AppError::archive(format!(
                "archive has {} entries (limit {})",
                archive.len(),
                self.config.max_entries
            )));
        }

        let mut entries = Vec::new();
        let mut total_bytes = 0u64;
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| zip_err("failed to read archive entry", e))?;
            // Entry-name encoding normalization and traversal rejection
            // are delegated to the zip crate.
            let Some(enclosed) = entry.enclosed_name() else {
                continue;
            };
            let path: Vec<String> = enclosed
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            if path.is_empty() {
                continue;
            }

            total_bytes += entry.size();
            if total_bytes > self.config.max_extracted_bytes {
                return Err(AppError::archive(format!(
                    "archive exceeds the extracted-size limit of {} bytes",
                    self.config.max_extracted_bytes
                )));
            }

            let mtime = entry.last_modified().and_then(to_chrono);
            if entry.is_dir() {
                entries.push(StagedEntry {
                    path,
                    is_dir: true,
                    local: None,
                    mtime,
                });
                continue;
            }

            let local = staging.join(index.to_string());
            let mut out = File::create(&local)?;
            let mut buffer = vec![0u8; COPY_BUFFER];
            loop {
                let n = entry.read(&mut buffer)?;
                if n == 0 {
                    break;
                }
                out.write_all(&buffer[..n])?;
            }
            entries.push(StagedEntry {
                path,
                is_dir: false,
                local: Some(local),
                mtime,
            });
        }
        Ok(entries)
    }

    /// Resolve (creating as needed) the folder for an archive path,
    /// returning the node the last component maps to. An empty path maps
    /// to the effective destination itself.
    async fn ensure_folder_chain(
        &self,
        actor: UserId,
        dest: NodeId,
        components: &[String],
        created: &mut HashMap<String, NodeId>,
    ) -> AppResult<NodeId> {
        let mut current = dest;
        let mut key = String::new();
        for component in components {
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(component);
            current = match created.get(&key) {
                Some(id) => *id,
                None => {
                    let folder = self
                        .tree
                        .create_folder(actor, Some(current), component, true)
                        .await?;
                    created.insert(key.clone(), folder.id);
                    folder.id
                }
            };
        }
        Ok(current)
    }

    /// Stamp a created node with the archive's embedded timestamp.
    async fn apply_mtime(&self, id: NodeId, mtime: DateTime<Utc>) -> AppResult<()> {
        let mut node = self.tree.store().load_required(id).await?;
        node.changed_at = mtime;
        self.tree.store().save(&node).await
    }
}

/// Convert a zip MS-DOS timestamp to UTC. Archives carry no timezone;
/// the timestamp is taken as UTC verbatim.
fn to_chrono(dt: zip::DateTime) -> Option<DateTime<Utc>> {
    let date = chrono::NaiveDate::from_ymd_opt(
        i32::from(dt.year()),
        u32::from(dt.month()),
        u32::from(dt.day()),
    )?;
    let time = chrono::NaiveTime::from_hms_opt(
        u32::from(dt.hour()),
        u32::from(dt.minute()),
        u32::from(dt.second()),
    )?;
    Some(DateTime::from_naive_utc_and_offset(date.and_time(time), Utc))
}
