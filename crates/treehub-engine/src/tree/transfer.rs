//! Copy, move, and duplicate.
//!
//! Copy holds the destination lock for the whole call and takes a
//! transient per-source-node lock while reading each node; a source node
//! that cannot be locked is skipped and counted, like delete. Move
//! deep-locks the source subtree plus the destination for the whole
//! call, because the `root_id` rewrite must not interleave with other
//! structural edits.

use futures::future::BoxFuture;
use tracing::{info, warn};

use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::traits::access::AccessOp;
use treehub_core::types::{NodeId, UserId};
use treehub_entity::grants::GrantSet;
use treehub_entity::node::{Node, NodePayload};
use treehub_entity::usage::{UsageDelta, UsageDeltaMap};
use treehub_lock::{keys, LockSet};

use crate::naming;
use crate::tree::{usage_delta, Destination, TreeService};

impl TreeService {
    /// Copy a node (and its subtree) into a destination. With
    /// `allow_rename`, a name collision yields a ` copy` variant instead
    /// of failing. Copies are owned by the actor. Sub-nodes whose source
    /// lock cannot be taken are skipped; one aggregated `Busy` error
    /// reports the count, with everything copied so far kept.
    pub async fn copy(
        &self,
        actor: UserId,
        src: NodeId,
        dest: Destination,
        allow_rename: bool,
    ) -> AppResult<Node> {
        let src_node = self.store().load_required(src).await?;
        self.require_access(actor, Some(src), AccessOp::View).await?;
        self.require_access(actor, dest.node_id(), AccessOp::Create)
            .await?;
        let dest_node = self.check_transfer_target(&src_node, dest).await?;

        let dest_lock = Self::parent_lock_name(dest.node_id());
        self.locks().lock(&dest_lock).await?;
        let mut deltas = UsageDeltaMap::new();
        let result: AppResult<(Node, u64)> = self
            .copy_rec(
                &src_node,
                dest_node.as_ref(),
                true,
                allow_rename,
                actor,
                &mut deltas,
            )
            .await;
        self.locks().release(&dest_lock).await?;
        self.usage().apply_delta_map(&deltas).await?;

        let (copy, failed) = result?;
        self.sizes().invalidate_ancestors(copy.id).await?;
        if failed > 0 {
            warn!(src = %src, copied = %copy.id, failed, "copy completed partially");
            return Err(AppError::busy(format!(
                "{failed} item(s) under '{}' could not be copied",
                src_node.name
            )));
        }
        info!(src = %src, copy = %copy.id, "copied subtree");
        Ok(copy)
    }

    /// Copy a node next to itself (or into the actor's root list for a
    /// root folder), always auto-renaming.
    pub async fn duplicate(&self, actor: UserId, id: NodeId) -> AppResult<Node> {
        let node = self.store().load_required(id).await?;
        let dest = match node.parent_id {
            Some(parent) => Destination::Folder(parent),
            None => Destination::RootList,
        };
        self.copy(actor, id, dest, true).await
    }

    /// Move a node (and its subtree) into a destination. The owner is
    /// unchanged; a root folder moved under a folder becomes a plain
    /// folder (grants dropped), and a folder moved to the root list
    /// becomes a private root folder. Every descendant's `root_id` is
    /// rewritten. Destination sizes are recomputed via the deferred
    /// queue.
    pub async fn move_node(
        &self,
        actor: UserId,
        src: NodeId,
        dest: Destination,
    ) -> AppResult<Node> {
        let src_node = self.store().load_required(src).await?;
        self.require_access(actor, Some(src), AccessOp::Update)
            .await?;
        self.require_access(actor, dest.node_id(), AccessOp::Create)
            .await?;
        let dest_node = self.check_transfer_target(&src_node, dest).await?;
        let old_parent = src_node.parent_id;

        let mut locks = LockSet::new(self.locks().clone());
        let mut deltas = UsageDeltaMap::new();
        let result: AppResult<Node> = async {
            locks.lock(&Self::parent_lock_name(dest.node_id())).await?;
            let deep = self.deep_lock(src).await?;
            locks.absorb(deep);

            let siblings = self
                .sibling_names(dest.node_id(), src_node.owner)
                .await?;
            if !naming::is_unique(&src_node.name, &siblings, Some(src)) {
                return Err(AppError::validation(format!(
                    "name already taken: '{}'",
                    src_node.name
                )));
            }

            let mut moved = self.store().load_required(src).await?;
            let was_root = moved.is_root();
            match &dest_node {
                Some(d) => {
                    moved.parent_id = Some(d.id);
                    moved.root_id = d.root_id;
                    if was_root {
                        moved.payload = NodePayload::Folder;
                        deltas.add(moved.owner, UsageDelta::root_folder(0).negated());
                        deltas.add(moved.owner, UsageDelta::folder(0));
                    }
                }
                None => {
                    moved.parent_id = None;
                    moved.root_id = moved.id;
                    if !was_root {
                        moved.payload = NodePayload::Root {
                            grants: GrantSet::new(),
                        };
                        deltas.add(moved.owner, UsageDelta::folder(0).negated());
                        deltas.add(moved.owner, UsageDelta::root_folder(0));
                    }
                }
            }
            moved.touch();
            self.store().save(&moved).await?;
            if moved.is_folder_like() {
                self.rewrite_root_ids(moved.id, moved.root_id).await?;
            }
            Ok(moved)
        }
        .await;
        locks.release_all().await?;
        self.usage().apply_delta_map(&deltas).await?;

        let moved = result?;
        // The subtree left one parent chain and joined another; both go
        // stale, and the recompute is deferred.
        let mut stale = Vec::new();
        if let Some(parent) = old_parent {
            self.sizes().clear_size(parent).await?;
            self.sizes().invalidate_ancestors(parent).await?;
            stale.push(parent);
        }
        self.sizes().invalidate_ancestors(moved.id).await?;
        if let Some(parent) = moved.parent_id {
            stale.push(parent);
        }
        if !stale.is_empty() {
            self.enqueue_size_update(stale);
        }
        info!(node = %moved.id, root = %moved.root_id, "moved subtree");
        Ok(moved)
    }

    /// Shared pre-lock validation for copy and move: the destination must
    /// exist, be folder-like, and not be the source or any descendant of
    /// it; only folder-like nodes can land on the root list.
    async fn check_transfer_target(
        &self,
        src: &Node,
        dest: Destination,
    ) -> AppResult<Option<Node>> {
        match dest {
            Destination::Folder(dest_id) => {
                if dest_id == src.id {
                    return Err(AppError::validation(format!(
                        "'{}' cannot be transferred into itself",
                        src.name
                    )));
                }
                let dest_node = self.store().load_required(dest_id).await?;
                if !dest_node.is_folder_like() {
                    return Err(AppError::validation(format!(
                        "'{}' cannot contain children",
                        dest_node.name
                    )));
                }
                if self.store().ancestor_ids(dest_id).await?.contains(&src.id) {
                    return Err(AppError::validation(format!(
                        "'{}' cannot be transferred into its own descendant",
                        src.name
                    )));
                }
                Ok(Some(dest_node))
            }
            Destination::RootList => {
                if !src.is_folder_like() {
                    return Err(AppError::validation(format!(
                        "'{}' is not a folder and cannot become a root folder",
                        src.name
                    )));
                }
                Ok(None)
            }
        }
    }

    /// Copy one node, then its children. Returns the copy and the number
    /// of descendants that could not be copied.
    fn copy_rec<'a>(
        &'a self,
        src: &'a Node,
        dest: Option<&'a Node>,
        top: bool,
        allow_rename: bool,
        actor: UserId,
        deltas: &'a mut UsageDeltaMap,
    ) -> BoxFuture<'a, AppResult<(Node, u64)>> {
        Box::pin(async move {
            // Transient: held only while this one node is read and written.
            self.locks().lock(&keys::edit(src.id)).await?;
            let result: AppResult<(Node, u64)> = async {
                let fresh = self.store().load_required(src.id).await?;
                let name = if top {
                    let siblings = self
                        .sibling_names(dest.map(|d| d.id), actor)
                        .await?;
                    if allow_rename {
                        naming::make_unique(&fresh.name, &siblings, naming::COPY_SUFFIX)?
                    } else if naming::is_unique(&fresh.name, &siblings, None) {
                        fresh.name.clone()
                    } else {
                        return Err(AppError::validation(format!(
                            "name already taken: '{}'",
                            fresh.name
                        )));
                    }
                } else {
                    fresh.name.clone()
                };

                let now = chrono::Utc::now();
                let mut copy = fresh.clone();
                copy.id = NodeId::new();
                copy.name = name;
                copy.owner = actor;
                copy.created_at = now;
                copy.changed_at = now;
                match dest {
                    Some(d) => {
                        copy.parent_id = Some(d.id);
                        copy.root_id = d.root_id;
                        if copy.is_root() {
                            copy.payload = NodePayload::Folder;
                        }
                    }
                    None => {
                        copy.parent_id = None;
                        copy.root_id = copy.id;
                        if !copy.is_root() {
                            copy.payload = NodePayload::Root {
                                grants: GrantSet::new(),
                            };
                        }
                    }
                }
                if let Some(blob) = fresh.blob() {
                    let new_blob = self.blobs().duplicate(blob, &copy.name).await?;
                    match &mut copy.payload {
                        NodePayload::File { blob } | NodePayload::Image { blob, .. } => {
                            *blob = new_blob;
                        }
                        _ => {}
                    }
                }

                let mut failed: u64 = 0;
                if fresh.is_folder_like() {
                    // Save stale-sized first so children can attach.
                    copy.size = None;
                    self.store().save(&copy).await?;
                    for child in self.store().children(fresh.id).await? {
                        match self
                            .copy_rec(&child, Some(&copy), false, false, actor, deltas)
                            .await
                        {
                            Ok((_, nested)) => failed += nested,
                            Err(_) => failed += 1,
                        }
                    }
                    if failed == 0 {
                        // Source total is only trustworthy when every
                        // child made it across.
                        copy.size = fresh.size;
                        self.store().save(&copy).await?;
                    }
                } else {
                    self.store().save(&copy).await?;
                }
                deltas.add(actor, usage_delta(&copy));
                Ok((copy, failed))
            }
            .await;
            self.locks().release(&keys::edit(src.id)).await?;
            result
        })
    }

    /// Rewrite `root_id` on every node below `parent`.
    fn rewrite_root_ids<'a>(
        &'a self,
        parent: NodeId,
        root_id: NodeId,
    ) -> BoxFuture<'a, AppResult<()>> {
        Box::pin(async move {
            for mut child in self.store().children(parent).await? {
                child.root_id = root_id;
                self.store().save(&child).await?;
                if child.is_folder_like() {
                    self.rewrite_root_ids(child.id, root_id).await?;
                }
            }
            Ok(())
        })
    }
}
