//! Permission oracle implementations.
//!
//! The permission system proper is an external collaborator; the engine
//! only ever sees the [`AccessOracle`] trait. Two implementations ship
//! with TreeHub: a grant-ledger-backed resolver and an allow-all oracle
//! for single-user (CLI) and test use.

use std::sync::Arc;

use async_trait::async_trait;

use treehub_core::config::sharing::SharingConfig;
use treehub_core::result::AppResult;
use treehub_core::traits::access::{AccessOp, AccessOracle};
use treehub_core::types::{NodeId, UserId};
use treehub_entity::grants::GrantLevel;
use treehub_store::MemoryNodeStore;

/// Oracle that resolves permissions from the grant ledger of the root
/// folder containing the target node.
///
/// The owner of the containing root folder may do anything. Author grants
/// allow structural edits; view grants allow reading; share and chown
/// remain owner-only. A disabled grant blocks everything.
#[derive(Debug)]
pub struct GrantOracle {
    store: Arc<MemoryNodeStore>,
    sharing: SharingConfig,
}

impl GrantOracle {
    /// Create a grant-backed oracle over a node store.
    pub fn new(store: Arc<MemoryNodeStore>, sharing: SharingConfig) -> Self {
        Self { store, sharing }
    }
}

#[async_trait]
impl AccessOracle for GrantOracle {
    async fn can_access(
        &self,
        actor: UserId,
        node: Option<NodeId>,
        op: AccessOp,
    ) -> AppResult<bool> {
        let Some(node_id) = node else {
            // The root-folder list: every user manages their own.
            return Ok(true);
        };
        let Some(node) = self.store.load(node_id).await? else {
            return Ok(false);
        };
        let Some(root) = self.store.load(node.root_id).await? else {
            return Ok(false);
        };
        if actor == root.owner {
            return Ok(true);
        }
        let Some(grants) = root.grants() else {
            return Ok(false);
        };
        if grants.is_granted(root.owner, actor, GrantLevel::Disabled) {
            return Ok(false);
        }
        if !self.sharing.enabled {
            return Ok(false);
        }
        // A grant to the anonymous pseudo-user covers every actor, so a
        // publicly shared root is reachable by strangers.
        let holds = |level: GrantLevel| {
            grants.is_granted(root.owner, actor, level)
                || (self.sharing.allow_public
                    && grants.is_granted(root.owner, UserId::ANONYMOUS, level))
        };
        let allowed = match op {
            AccessOp::View => holds(GrantLevel::View),
            AccessOp::Update | AccessOp::Delete | AccessOp::Create => {
                holds(GrantLevel::Author)
            }
            // Sharing and ownership transfer stay with the owner.
            AccessOp::Share | AccessOp::Chown => false,
        };
        Ok(allowed)
    }
}

/// Oracle that allows every operation. For tests and the single-user CLI.
#[derive(Debug, Default)]
pub struct AllowAllOracle;

#[async_trait]
impl AccessOracle for AllowAllOracle {
    async fn can_access(
        &self,
        _actor: UserId,
        _node: Option<NodeId>,
        _op: AccessOp,
    ) -> AppResult<bool> {
        Ok(true)
    }
}
