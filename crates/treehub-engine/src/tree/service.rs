//! Core tree mutation service: create, rename, delete, chown.
//!
//! Every operation follows the same shape: validate inputs, consult the
//! permission oracle, acquire locks top-down, mutate, release locks in
//! reverse order on every exit path, then apply the accumulated usage
//! deltas exactly once. Recursive operations continue past failed
//! children and raise a single aggregated `Busy` error at the end, so
//! callers must treat multi-node operations as non-atomic.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use tracing::{info, warn};

use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::traits::access::{AccessOp, AccessOracle};
use treehub_core::traits::blob::BlobStore;
use treehub_core::types::{NodeId, UserId};
use treehub_entity::grants::GrantSet;
use treehub_entity::node::{validate_name, Node, NodePayload};
use treehub_entity::usage::UsageDeltaMap;
use treehub_lock::{keys, LockManager, LockSet};
use treehub_store::{MemoryNodeStore, UsageAccountant};

use crate::naming;
use crate::size::{SizeUpdateQueue, SizeUpdater};
use crate::tree::usage_delta;

/// Lock-guarded mutation engine over the node store.
pub struct TreeService {
    store: Arc<MemoryNodeStore>,
    locks: LockManager,
    usage: Arc<UsageAccountant>,
    blobs: Arc<dyn BlobStore>,
    oracle: Arc<dyn AccessOracle>,
    sizes: Arc<SizeUpdater>,
    size_queue: SizeUpdateQueue,
}

impl TreeService {
    /// Wire up the engine. Spawns the deferred size-update worker, so a
    /// tokio runtime must be running.
    pub fn new(
        store: Arc<MemoryNodeStore>,
        locks: LockManager,
        usage: Arc<UsageAccountant>,
        blobs: Arc<dyn BlobStore>,
        oracle: Arc<dyn AccessOracle>,
    ) -> Self {
        let sizes = Arc::new(SizeUpdater::new(store.clone(), blobs.clone()));
        let size_queue = SizeUpdateQueue::spawn(sizes.clone());
        Self {
            store,
            locks,
            usage,
            blobs,
            oracle,
            sizes,
            size_queue,
        }
    }

    /// The node store this engine mutates.
    pub fn store(&self) -> &Arc<MemoryNodeStore> {
        &self.store
    }

    /// The blob store backing file contents.
    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// The lock manager guarding mutations.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// The synchronous size updater.
    pub fn sizes(&self) -> &Arc<SizeUpdater> {
        &self.sizes
    }

    /// The usage accountant.
    pub fn usage(&self) -> &Arc<UsageAccountant> {
        &self.usage
    }

    // ---- shared helpers -------------------------------------------------

    pub(crate) async fn require_access(
        &self,
        actor: UserId,
        node: Option<NodeId>,
        op: AccessOp,
    ) -> AppResult<()> {
        if self.oracle.can_access(actor, node, op).await? {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "actor {actor} may not perform {op:?} here"
            )))
        }
    }

    /// Names taken among the target's siblings: the children of `parent`,
    /// or the actor's root folders when `parent` is `None`.
    pub(crate) async fn sibling_names(
        &self,
        parent: Option<NodeId>,
        owner: UserId,
    ) -> AppResult<HashMap<String, NodeId>> {
        match parent {
            Some(parent) => self.store.child_name_map(parent).await,
            None => Ok(self
                .store
                .roots(Some(owner), None)
                .await?
                .into_iter()
                .map(|n| (n.name, n.id))
                .collect()),
        }
    }

    /// The lock name guarding sibling membership of `parent`.
    pub(crate) fn parent_lock_name(parent: Option<NodeId>) -> String {
        match parent {
            Some(id) => keys::edit(id),
            None => keys::ROOT_LIST.to_string(),
        }
    }

    /// Resolve the final name for a new child: keep it if free, derive a
    /// ` copy` variant when `allow_rename`, fail on collision otherwise.
    fn resolve_new_name(
        name: &str,
        siblings: &HashMap<String, NodeId>,
        allow_rename: bool,
    ) -> AppResult<String> {
        if allow_rename {
            naming::make_unique(name, siblings, naming::COPY_SUFFIX)
        } else if naming::is_unique(name, siblings, None) {
            Ok(name.to_string())
        } else {
            Err(AppError::validation(format!(
                "name already taken: '{name}'"
            )))
        }
    }

    /// Lock the node and every descendant folder, top-down. The set is
    /// fully released before returning `Busy` on any nested failure.
    pub async fn deep_lock(&self, node_id: NodeId) -> AppResult<LockSet> {
        let mut set = LockSet::new(self.locks.clone());
        match self.deep_lock_into(node_id, &mut set).await {
            Ok(()) => Ok(set),
            Err(err) => {
                if let Err(release_err) = set.release_all().await {
                    warn!(error = %release_err, "failed to unwind partial deep lock");
                }
                Err(err)
            }
        }
    }

    fn deep_lock_into<'a>(
        &'a self,
        node_id: NodeId,
        set: &'a mut LockSet,
    ) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            set.lock(&keys::edit(node_id)).await?;
            for folder in self.store.child_folders(node_id).await? {
                self.deep_lock_into(folder.id, set).await?;
            }
            Ok(())
        })
    }

    // ---- reads ----------------------------------------------------------

    /// Load a node, checking view access. Reads are lock-free.
    pub async fn get(&self, actor: UserId, id: NodeId) -> AppResult<Node> {
        self.require_access(actor, Some(id), AccessOp::View).await?;
        self.store.load_required(id).await
    }

    /// List the children of a folder, checking view access.
    pub async fn list_children(&self, actor: UserId, id: NodeId) -> AppResult<Vec<Node>> {
        self.require_access(actor, Some(id), AccessOp::View).await?;
        self.store.children(id).await
    }

    /// List the actor's own root folders.
    pub async fn list_roots(&self, actor: UserId) -> AppResult<Vec<Node>> {
        self.store.roots(Some(actor), None).await
    }

    // ---- create ---------------------------------------------------------

    /// Create a folder under `parent`, or a new root folder when `parent`
    /// is `None`. With `allow_rename`, a colliding name gets a ` copy`
    /// variant instead of failing.
    pub async fn create_folder(
        &self,
        actor: UserId,
        parent: Option<NodeId>,
        name: &str,
        allow_rename: bool,
    ) -> AppResult<Node> {
        validate_name(name)?;
        self.require_access(actor, parent, AccessOp::Create).await?;
        let parent_node = match parent {
            Some(id) => {
                let node = self.store.load_required(id).await?;
                if !node.is_folder_like() {
                    return Err(AppError::validation(format!(
                        "'{}' cannot contain children",
                        node.name
                    )));
                }
                Some(node)
            }
            None => None,
        };

        let lock_name = Self::parent_lock_name(parent);
        self.locks.lock(&lock_name).await?;
        let result: AppResult<Node> = async {
            let siblings = self.sibling_names(parent, actor).await?;
            let final_name = Self::resolve_new_name(name, &siblings, allow_rename)?;
            let node = match &parent_node {
                Some(p) => Node::new_folder(final_name, actor, p),
                None => Node::new_root(final_name, actor),
            };
            self.store.save(&node).await?;
            Ok(node)
        }
        .await;
        self.locks.release(&lock_name).await?;

        let node = result?;
        self.usage.apply_delta(actor, usage_delta(&node)).await?;
        self.sizes.invalidate_ancestors(node.id).await?;
        info!(node = %node.id, name = %node.name, "created folder");
        Ok(node)
    }

    /// Create a file under `parent` from an in-memory buffer. The blob is
    /// stored first; the node is linked to it under the parent lock.
    pub async fn add_file(
        &self,
        actor: UserId,
        parent: NodeId,
        name: &str,
        mime: &str,
        data: Bytes,
        allow_rename: bool,
    ) -> AppResult<Node> {
        validate_name(name)?;
        self.require_access(actor, Some(parent), AccessOp::Create)
            .await?;
        let parent_node = self.store.load_required(parent).await?;
        if !parent_node.is_folder_like() {
            return Err(AppError::validation(format!(
                "'{}' cannot contain children",
                parent_node.name
            )));
        }

        let lock_name = keys::edit(parent);
        self.locks.lock(&lock_name).await?;
        let result: AppResult<Node> = async {
            let siblings = self.sibling_names(Some(parent), actor).await?;
            let final_name = Self::resolve_new_name(name, &siblings, allow_rename)?;
            let len = data.len() as u64;
            let blob = self.blobs.store(data, &final_name).await?;
            let node = Node::new_file(final_name, mime, actor, &parent_node, blob, len);
            self.store.save(&node).await?;
            Ok(node)
        }
        .await;
        self.locks.release(&lock_name).await?;

        let node = result?;
        self.usage.apply_delta(actor, usage_delta(&node)).await?;
        self.sizes.invalidate_ancestors(node.id).await?;
        info!(node = %node.id, name = %node.name, size = node.size, "added file");
        Ok(node)
    }

    // ---- rename ---------------------------------------------------------

    /// Rename a node in place. Fails on a sibling collision; the node may
    /// keep its own name.
    pub async fn rename(&self, actor: UserId, id: NodeId, new_name: &str) -> AppResult<Node> {
        validate_name(new_name)?;
        self.require_access(actor, Some(id), AccessOp::Update)
            .await?;
        let node = self.store.load_required(id).await?;

        let mut locks = LockSet::new(self.locks.clone());
        let result: AppResult<Node> = async {
            locks.lock(&Self::parent_lock_name(node.parent_id)).await?;
            locks.lock(&keys::edit(id)).await?;
            let siblings = self.sibling_names(node.parent_id, node.owner).await?;
            if !naming::is_unique(new_name, &siblings, Some(id)) {
                return Err(AppError::validation(format!(
                    "name already taken: '{new_name}'"
                )));
            }
            let mut fresh = self.store.load_required(id).await?;
            fresh.name = new_name.to_string();
            fresh.touch();
            self.store.save(&fresh).await?;
            if let Some(blob) = fresh.blob() {
                // Advisory on-disk name only; identity is unchanged.
                self.blobs.rename(blob, new_name).await?;
            }
            Ok(fresh)
        }
        .await;
        locks.release_all().await?;

        let node = result?;
        info!(node = %node.id, name = %node.name, "renamed node");
        Ok(node)
    }

    // ---- delete ---------------------------------------------------------

    /// Delete a node and its subtree, post-order. Children that cannot be
    /// locked are skipped (and keep their ancestors alive); one aggregated
    /// `Busy` error reports the count. Usage deltas for everything that
    /// was removed are applied even on that error. `fast` bypasses both
    /// locking and per-node usage deltas.
    pub async fn delete(&self, actor: UserId, id: NodeId, fast: bool) -> AppResult<()> {
        let node = self.store.load_required(id).await?;
        self.require_access(actor, Some(id), AccessOp::Delete)
            .await?;

        let root_list_locked = node.is_root() && !fast;
        if root_list_locked {
            self.locks.lock(keys::ROOT_LIST).await?;
        }
        let parent_id = node.parent_id;
        let mut deltas = UsageDeltaMap::new();
        let result = self.delete_rec(&node, fast, &mut deltas).await;
        self.usage.apply_delta_map(&deltas).await?;
        if root_list_locked {
            self.locks.release(keys::ROOT_LIST).await?;
        }
        if let Some(parent) = parent_id {
            self.sizes.clear_size(parent).await?;
            self.sizes.invalidate_ancestors(parent).await?;
        }
        match &result {
            Ok(()) => info!(node = %id, fast, "deleted subtree"),
            Err(err) => warn!(node = %id, error = %err, "subtree partially deleted"),
        }
        result
    }

    fn delete_rec<'a>(
        &'a self,
        node: &'a Node,
        fast: bool,
        deltas: &'a mut UsageDeltaMap,
    ) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            if !fast {
                self.locks.lock(&keys::edit(node.id)).await?;
            }
            let mut failed_children: u64 = 0;
            let walk: AppResult<()> = async {
                if node.is_folder_like() {
                    for child in self.store.children(node.id).await? {
                        if let Err(err) = self.delete_rec(&child, fast, deltas).await {
                            failed_children += 1;
                            if !err.is_busy() {
                                warn!(child = %child.id, error = %err, "child delete failed");
                            }
                        }
                    }
                }
                Ok(())
            }
            .await;
            // Own lock is released before the structural remove: the node
            // either disappears or stays fully available.
            if !fast {
                self.locks.release(&keys::edit(node.id)).await?;
            }
            walk?;
            if failed_children > 0 {
                return Err(AppError::busy(format!(
                    "{failed_children} item(s) under '{}' could not be deleted",
                    node.name
                )));
            }
            if let Some(blob) = node.blob() {
                if let Err(err) = self.blobs.delete(blob).await {
                    // An orphaned blob is preferable to a dangling node.
                    warn!(blob = %blob, error = %err, "blob removal failed");
                }
            }
            self.store.remove(node.id).await?;
            if !fast {
                deltas.add(node.owner, usage_delta(node).negated());
            }
            Ok(())
        })
    }

    // ---- chown ----------------------------------------------------------

    /// Transfer ownership of a single node. Root folders get a fresh
    /// (empty) grant set, so the new owner starts private.
    pub async fn chown(&self, actor: UserId, id: NodeId, new_owner: UserId) -> AppResult<Node> {
        self.require_access(actor, Some(id), AccessOp::Chown).await?;
        self.locks.lock(&keys::edit(id)).await?;
        let mut deltas = UsageDeltaMap::new();
        let result: AppResult<Node> = async {
            let mut node = self.store.load_required(id).await?;
            let old_owner = node.owner;
            if old_owner != new_owner {
                node.owner = new_owner;
                if node.is_root() {
                    node.payload = NodePayload::Root {
                        grants: GrantSet::new(),
                    };
                }
                node.touch();
                self.store.save(&node).await?;
                deltas.reassign(old_owner, new_owner, usage_delta(&node));
            }
            Ok(node)
        }
        .await;
        self.locks.release(&keys::edit(id)).await?;
        self.usage.apply_delta_map(&deltas).await?;
        let node = result?;
        info!(node = %node.id, new_owner = %new_owner, "changed owner");
        Ok(node)
    }

    /// Transfer ownership of a whole subtree. A folder whose lock cannot
    /// be taken fails with its entire subtree; locked leaves are skipped
    /// individually. Everything reassigned stays reassigned even when the
    /// aggregated `Busy` error is raised; there is no rollback.
    pub async fn chown_recursive(
        &self,
        actor: UserId,
        id: NodeId,
        new_owner: UserId,
    ) -> AppResult<()> {
        let node = self.store.load_required(id).await?;
        self.require_access(actor, Some(id), AccessOp::Chown).await?;
        let mut deltas = UsageDeltaMap::new();
        let result = self.chown_rec(&node, new_owner, &mut deltas).await;
        self.usage.apply_delta_map(&deltas).await?;
        match &result {
            Ok(()) => info!(node = %id, new_owner = %new_owner, "changed subtree owner"),
            Err(err) => warn!(node = %id, error = %err, "subtree partially reassigned"),
        }
        result
    }

    fn chown_rec<'a>(
        &'a self,
        node: &'a Node,
        new_owner: UserId,
        deltas: &'a mut UsageDeltaMap,
    ) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            self.locks.lock(&keys::edit(node.id)).await?;
            let result: AppResult<()> = async {
                self.reassign_owner(node.id, new_owner, deltas).await?;
                let mut failed_children: u64 = 0;
                if node.is_folder_like() {
                    for child in self.store.children(node.id).await? {
                        let outcome = if child.is_folder_like() {
                            self.chown_rec(&child, new_owner, deltas).await
                        } else {
                            self.chown_leaf(&child, new_owner, deltas).await
                        };
                        if outcome.is_err() {
                            failed_children += 1;
                        }
                    }
                }
                if failed_children > 0 {
                    Err(AppError::busy(format!(
                        "{failed_children} item(s) under '{}' could not be reassigned",
                        node.name
                    )))
                } else {
                    Ok(())
                }
            }
            .await;
            // Held across the whole subtree walk.
            self.locks.release(&keys::edit(node.id)).await?;
            result
        })
    }

    async fn chown_leaf(
        &self,
        node: &Node,
        new_owner: UserId,
        deltas: &mut UsageDeltaMap,
    ) -> AppResult<()> {
        self.locks.lock(&keys::edit(node.id)).await?;
        let result = self.reassign_owner(node.id, new_owner, deltas).await;
        self.locks.release(&keys::edit(node.id)).await?;
        result
    }

    async fn reassign_owner(
        &self,
        id: NodeId,
        new_owner: UserId,
        deltas: &mut UsageDeltaMap,
    ) -> AppResult<()> {
        let mut node = self.store.load_required(id).await?;
        let old_owner = node.owner;
        if old_owner == new_owner {
            return Ok(());
        }
        node.owner = new_owner;
        if node.is_root() {
            node.payload = NodePayload::Root {
                grants: GrantSet::new(),
            };
        }
        node.touch();
        self.store.save(&node).await?;
        deltas.reassign(old_owner, new_owner, usage_delta(&node));
        Ok(())
    }

    /// Enqueue deferred size recomputation for the given nodes.
    pub fn enqueue_size_update(&self, ids: Vec<NodeId>) {
        self.size_queue.enqueue(ids);
    }
}

impl std::fmt::Debug for TreeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeService")
            .field("nodes", &self.store.count())
            .finish()
    }
}
