//! Permission oracle trait consumed by the mutation engine.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{NodeId, UserId};

/// The operations a caller can be authorized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOp {
    /// Read a node or list its children.
    View,
    /// Modify a node (rename, move, edit content).
    Update,
    /// Delete a node.
    Delete,
    /// Change a root folder's grants.
    Share,
    /// Transfer ownership.
    Chown,
    /// Create a child under a node (or a new root folder).
    Create,
}

/// Permission oracle consulted before any structural mutation.
///
/// The engine never bypasses this check. The permission/role system behind
/// it is an external collaborator; TreeHub ships a grant-ledger-backed
/// implementation and an allow-all implementation for single-user use.
#[async_trait]
pub trait AccessOracle: Send + Sync + std::fmt::Debug + 'static {
    /// Whether `actor` may perform `op` on `node`. A `node` of `None`
    /// refers to the actor's root-folder list.
    async fn can_access(&self, actor: UserId, node: Option<NodeId>, op: AccessOp)
    -> AppResult<bool>;
}
