//! Lock-guarded recursive tree mutations.

mod service;
mod transfer;

pub use service::TreeService;

use treehub_core::types::NodeId;
use treehub_entity::node::{Node, NodeKind};
use treehub_entity::usage::UsageDelta;

/// Where a copy or move places its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Under an existing folder or root folder.
    Folder(NodeId),
    /// As a new root folder in the actor's root list.
    RootList,
}

impl Destination {
    /// The destination node id the permission oracle is asked about
    /// (`None` means the root-folder list).
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::Folder(id) => Some(*id),
            Self::RootList => None,
        }
    }
}

/// The usage contribution of a single node. Bytes are counted on
/// file-like nodes only, so folder subtotals never double-count.
pub(crate) fn usage_delta(node: &Node) -> UsageDelta {
    let bytes = if node.is_file_like() {
        node.size.unwrap_or(0) as i64
    } else {
        0
    };
    match node.kind() {
        NodeKind::Root => UsageDelta::root_folder(bytes),
        NodeKind::Folder => UsageDelta::folder(bytes),
        NodeKind::File | NodeKind::Image | NodeKind::Media => UsageDelta::file(bytes),
    }
}
