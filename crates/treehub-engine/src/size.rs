//! Lazy size accounting.
//!
//! A folder's size is *not* recomputed eagerly on every edit; structural
//! changes mark the affected ancestor chain as unset (`size: None`), and
//! the stored value is recomputed on demand by summing children. Calling
//! [`SizeUpdater::update_size`] on an already-set node is a plain read;
//! callers that know the value is stale clear it first.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use treehub_core::result::AppResult;
use treehub_core::traits::blob::BlobStore;
use treehub_core::types::NodeId;
use treehub_store::MemoryNodeStore;

/// Recomputes unset node sizes by summing children.
#[derive(Debug)]
pub struct SizeUpdater {
    store: Arc<MemoryNodeStore>,
    blobs: Arc<dyn BlobStore>,
}

impl SizeUpdater {
    /// Create a size updater over a store and blob backend.
    pub fn new(store: Arc<MemoryNodeStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Current size of a node, recomputing and persisting it if unset.
    ///
    /// An already-set size is returned without traversing children. A
    /// dangling id contributes zero (the node no longer exists).
    pub fn update_size(&self, id: NodeId) -> BoxFuture<'_, AppResult<u64>> {
        Box::pin(async move {
            let Some(mut node) = self.store.load(id).await? else {
                return Ok(0);
            };
            if let Some(size) = node.size {
                return Ok(size);
            }

            let total = if node.is_folder_like() {
                let mut sum = 0u64;
                for child in self.store.children(id).await? {
                    sum += match child.size {
                        Some(size) => size,
                        None => self.update_size(child.id).await?,
                    };
                }
                sum
            } else if let Some(blob) = node.blob() {
                self.blobs.size(blob).await?
            } else {
                0
            };

            node.size = Some(total);
            self.store.save(&node).await?;
            debug!(node_id = %id, size = total, "recomputed node size");
            Ok(total)
        })
    }

    /// Mark a node's size unset so the next read recomputes it.
    pub async fn clear_size(&self, id: NodeId) -> AppResult<()> {
        if let Some(mut node) = self.store.load(id).await? {
            node.size = None;
            self.store.save(&node).await?;
        }
        Ok(())
    }

    /// Mark the sizes of every ancestor of a node unset. Called after any
    /// structural change to a folder's contents.
    pub async fn invalidate_ancestors(&self, id: NodeId) -> AppResult<()> {
        for ancestor in self.store.ancestor_ids(id).await? {
            self.clear_size(ancestor).await?;
        }
        Ok(())
    }

    /// Synchronously recompute a batch of nodes.
    pub async fn update_sizes_now(&self, ids: &[NodeId]) -> AppResult<()> {
        for id in ids {
            self.update_size(*id).await?;
        }
        Ok(())
    }
}

/// Deferred size recomputation queue.
///
/// Bulk copy/move operations enqueue the affected folder ids so the
/// calling request is not blocked on a deep recompute; a spawned worker
/// drains the channel.
#[derive(Debug, Clone)]
pub struct SizeUpdateQueue {
    tx: mpsc::UnboundedSender<Vec<NodeId>>,
}

impl SizeUpdateQueue {
    /// Spawn the drain worker and return the queue handle.
    pub fn spawn(updater: Arc<SizeUpdater>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<NodeId>>();
        tokio::spawn(async move {
            while let Some(ids) = rx.recv().await {
                if let Err(e) = updater.update_sizes_now(&ids).await {
                    warn!(error = %e, "deferred size update failed");
                }
            }
        });
        Self { tx }
    }

    /// Enqueue node ids for deferred recomputation. Ids enqueued after
    /// shutdown are dropped.
    pub fn enqueue(&self, ids: Vec<NodeId>) {
        if self.tx.send(ids).is_err() {
            debug!("size update queue is closed; batch dropped");
        }
    }
}
