//! Grant ledger service: sharing operations on root folders.
//!
//! Grant mutations are lock-guarded like every structural edit; queries
//! are lock-free reads. Grant operations on non-root nodes are answered
//! with `false` rather than an error, mirroring how the grant sets
//! themselves behave.

use std::sync::Arc;

use tracing::info;

use treehub_core::config::sharing::SharingConfig;
use treehub_core::result::AppResult;
use treehub_core::traits::access::{AccessOp, AccessOracle};
use treehub_core::types::{NodeId, UserId};
use treehub_entity::grants::{GrantLevel, SharingStatus};
use treehub_lock::{keys, LockManager};
use treehub_store::MemoryNodeStore;

use treehub_core::error::AppError;

/// Sharing operations over the grant sets stored on root folder nodes.
#[derive(Debug)]
pub struct GrantLedger {
    store: Arc<MemoryNodeStore>,
    locks: LockManager,
    oracle: Arc<dyn AccessOracle>,
    sharing: SharingConfig,
}

impl GrantLedger {
    /// Create a ledger service.
    pub fn new(
        store: Arc<MemoryNodeStore>,
        locks: LockManager,
        oracle: Arc<dyn AccessOracle>,
        sharing: SharingConfig,
    ) -> Self {
        Self {
            store,
            locks,
            oracle,
            sharing,
        }
    }

    /// Grant `level` on a root folder to `user`. Returns whether the
    /// grant sets changed; `false` for non-root nodes.
    pub async fn grant(
        &self,
        actor: UserId,
        node: NodeId,
        user: UserId,
        level: GrantLevel,
    ) -> AppResult<bool> {
        self.mutate(actor, node, |owner, grants| grants.grant(owner, user, level))
            .await
    }

    /// Revoke `level` on a root folder from `user`. Returns whether the
    /// grant sets changed; `false` for non-root nodes and for the owner.
    pub async fn revoke(
        &self,
        actor: UserId,
        node: NodeId,
        user: UserId,
        level: GrantLevel,
    ) -> AppResult<bool> {
        self.mutate(actor, node, |owner, grants| {
            grants.revoke(owner, user, level)
        })
        .await
    }

    async fn mutate<F>(&self, actor: UserId, node: NodeId, apply: F) -> AppResult<bool>
    where
        F: FnOnce(UserId, &mut treehub_entity::grants::GrantSet) -> bool,
    {
        if !self
            .oracle
            .can_access(actor, Some(node), AccessOp::Share)
            .await?
        {
            return Err(AppError::forbidden(format!(
                "actor {actor} may not change sharing here"
            )));
        }
        self.locks.lock(&keys::edit(node)).await?;
        let result: AppResult<bool> = async {
            let mut fresh = self.store.load_required(node).await?;
            let owner = fresh.owner;
            let changed = match fresh.grants_mut() {
                Some(grants) => apply(owner, grants),
                None => false,
            };
            if changed {
                fresh.touch();
                self.store.save(&fresh).await?;
            }
            Ok(changed)
        }
        .await;
        self.locks.release(&keys::edit(node)).await?;
        let changed = result?;
        if changed {
            info!(node = %node, "sharing grants updated");
        }
        Ok(changed)
    }

    /// Whether `user` effectively holds `level` on the root folder
    /// containing `node`. The owner holds everything; author implies
    /// view.
    pub async fn is_granted(
        &self,
        node: NodeId,
        user: UserId,
        level: GrantLevel,
    ) -> AppResult<bool> {
        let node = self.store.load_required(node).await?;
        let root = self.store.load_required(node.root_id).await?;
        Ok(match root.grants() {
            Some(grants) => grants.is_granted(root.owner, user, level),
            None => false,
        })
    }

    /// Whether nobody beyond the owner holds view or author.
    pub async fn is_private(&self, node: NodeId) -> AppResult<bool> {
        let root = self.load_root(node).await?;
        Ok(root.grants().is_none_or(|g| g.is_private()))
    }

    /// Whether the anonymous pseudo-user holds view or author.
    pub async fn is_public(&self, node: NodeId) -> AppResult<bool> {
        let root = self.load_root(node).await?;
        Ok(root.grants().is_some_and(|g| g.is_public()))
    }

    /// Resolve the effective sharing status of a root folder under the
    /// configured site policy.
    pub async fn sharing_status(&self, node: NodeId) -> AppResult<SharingStatus> {
        let root = self.load_root(node).await?;
        Ok(match root.grants() {
            Some(grants) => grants.sharing_status(root.owner, &self.sharing),
            None => SharingStatus::Private,
        })
    }

    async fn load_root(&self, node: NodeId) -> AppResult<treehub_entity::node::Node> {
        let node = self.store.load_required(node).await?;
        self.store.load_required(node.root_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treehub_core::config::lock::LockConfig;
    use treehub_entity::node::Node;

    use crate::access::AllowAllOracle;

    fn ledger(store: Arc<MemoryNodeStore>) -> GrantLedger {
        GrantLedger::new(
            store,
            LockManager::new(&LockConfig::default()),
            Arc::new(AllowAllOracle),
            SharingConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_grant_and_query_on_root() {
        let store = Arc::new(MemoryNodeStore::new());
        let owner = UserId::new();
        let reader = UserId::new();
        let root = Node::new_root("shared", owner);
        store.save(&root).await.unwrap();
        let ledger = ledger(store);

        assert!(ledger
            .grant(owner, root.id, reader, GrantLevel::View)
            .await
            .unwrap());
        assert!(ledger
            .is_granted(root.id, reader, GrantLevel::View)
            .await
            .unwrap());
        assert!(!ledger.is_private(root.id).await.unwrap());
        assert_eq!(
            ledger.sharing_status(root.id).await.unwrap(),
            SharingStatus::Shared
        );
    }

    #[tokio::test]
    async fn test_grant_on_plain_folder_is_refused() {
        let store = Arc::new(MemoryNodeStore::new());
        let owner = UserId::new();
        let root = Node::new_root("r", owner);
        let folder = Node::new_folder("docs", owner, &root);
        store.save(&root).await.unwrap();
        store.save(&folder).await.unwrap();
        let ledger = ledger(store);

        assert!(!ledger
            .grant(owner, folder.id, UserId::new(), GrantLevel::View)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_owner_never_revocable() {
        let store = Arc::new(MemoryNodeStore::new());
        let owner = UserId::new();
        let root = Node::new_root("r", owner);
        store.save(&root).await.unwrap();
        let ledger = ledger(store);

        assert!(!ledger
            .revoke(owner, root.id, owner, GrantLevel::View)
            .await
            .unwrap());
        assert!(ledger
            .is_granted(root.id, owner, GrantLevel::Author)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_queries_resolve_through_containing_root() {
        let store = Arc::new(MemoryNodeStore::new());
        let owner = UserId::new();
        let reader = UserId::new();
        let root = Node::new_root("r", owner);
        let folder = Node::new_folder("docs", owner, &root);
        store.save(&root).await.unwrap();
        store.save(&folder).await.unwrap();
        let ledger = ledger(store.clone());

        ledger
            .grant(owner, root.id, reader, GrantLevel::Author)
            .await
            .unwrap();
        // Author implies view, and the folder inherits from its root.
        assert!(ledger
            .is_granted(folder.id, reader, GrantLevel::View)
            .await
            .unwrap());
    }
}
