//! Tree node entity model.
//!
//! A single [`Node`] struct carries the header fields common to every
//! kind; kind-specific fields live in the [`NodePayload`] union so that a
//! field meaningful only for one kind cannot exist on another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use treehub_core::types::{BlobId, NodeId, UserId};

use crate::grants::GrantSet;

/// Discriminant for the node payload variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A plain file backed by a blob.
    File,
    /// An image file backed by a blob, with optional pixel dimensions.
    Image,
    /// A media item referencing external content (no local blob).
    Media,
    /// A folder inside a tree.
    Folder,
    /// A top-level folder: the unit of ownership and sharing.
    Root,
}

/// Kind-specific node data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodePayload {
    /// A plain file.
    File {
        /// The stored content.
        blob: BlobId,
    },
    /// An image file.
    Image {
        /// The stored content.
        blob: BlobId,
        /// Pixel width, if known.
        width: Option<u32>,
        /// Pixel height, if known.
        height: Option<u32>,
    },
    /// A media item with externally hosted content.
    Media {
        /// Opaque reference to the external media.
        media_ref: String,
    },
    /// A folder.
    Folder,
    /// A root folder with its per-tree access grants.
    Root {
        /// View/author/disabled grant sets.
        grants: GrantSet,
    },
}

impl NodePayload {
    /// The discriminant for this payload.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::File { .. } => NodeKind::File,
            Self::Image { .. } => NodeKind::Image,
            Self::Media { .. } => NodeKind::Media,
            Self::Folder => NodeKind::Folder,
            Self::Root { .. } => NodeKind::Root,
        }
    }
}

/// A node in the virtual file/folder hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier.
    pub id: NodeId,
    /// Node name (1-255 chars, no `:`, `/`, or `\`). Unique among
    /// siblings; root folder names are unique per owner.
    pub name: String,
    /// MIME type.
    pub mime: String,
    /// Byte size. `None` means stale: it must be recomputed as the sum of
    /// children before being trusted.
    pub size: Option<u64>,
    /// The node owner.
    pub owner: UserId,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
    /// When the node was last changed.
    pub changed_at: DateTime<Utc>,
    /// Free-form description.
    pub description: String,
    /// Parent node ID. `None` iff this is a root folder.
    pub parent_id: Option<NodeId>,
    /// The root folder transitively containing this node; equal to `id`
    /// for root folders themselves.
    pub root_id: NodeId,
    /// Kind-specific data.
    #[serde(flatten)]
    pub payload: NodePayload,
}

impl Node {
    /// Create a new folder node under the given parent.
    pub fn new_folder(name: impl Into<String>, owner: UserId, parent: &Node) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::new(),
            name: name.into(),
            mime: "inode/directory".to_string(),
            size: Some(0),
            owner,
            created_at: now,
            changed_at: now,
            description: String::new(),
            parent_id: Some(parent.id),
            root_id: parent.root_id,
            payload: NodePayload::Folder,
        }
    }

    /// Create a new root folder node.
    pub fn new_root(name: impl Into<String>, owner: UserId) -> Self {
        let now = Utc::now();
        let id = NodeId::new();
        Self {
            id,
            name: name.into(),
            mime: "inode/directory".to_string(),
            size: Some(0),
            owner,
            created_at: now,
            changed_at: now,
            description: String::new(),
            parent_id: None,
            root_id: id,
            payload: NodePayload::Root {
                grants: GrantSet::new(),
            },
        }
    }

    /// Create a new file node under the given parent.
    pub fn new_file(
        name: impl Into<String>,
        mime: impl Into<String>,
        owner: UserId,
        parent: &Node,
        blob: BlobId,
        size: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::new(),
            name: name.into(),
            mime: mime.into(),
            size: Some(size),
            owner,
            created_at: now,
            changed_at: now,
            description: String::new(),
            parent_id: Some(parent.id),
            root_id: parent.root_id,
            payload: NodePayload::File { blob },
        }
    }

    /// The node's kind.
    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }

    /// Whether this node is a root folder.
    pub fn is_root(&self) -> bool {
        matches!(self.payload, NodePayload::Root { .. })
    }

    /// Whether this node can contain children.
    pub fn is_folder_like(&self) -> bool {
        matches!(self.payload, NodePayload::Folder | NodePayload::Root { .. })
    }

    /// Whether this node is a leaf holding content (file, image, or media).
    pub fn is_file_like(&self) -> bool {
        matches!(
            self.payload,
            NodePayload::File { .. } | NodePayload::Image { .. } | NodePayload::Media { .. }
        )
    }

    /// The backing blob, for kinds that have one.
    pub fn blob(&self) -> Option<BlobId> {
        match &self.payload {
            NodePayload::File { blob } | NodePayload::Image { blob, .. } => Some(*blob),
            _ => None,
        }
    }

    /// The grant sets, for root folders.
    pub fn grants(&self) -> Option<&GrantSet> {
        match &self.payload {
            NodePayload::Root { grants } => Some(grants),
            _ => None,
        }
    }

    /// Mutable access to the grant sets, for root folders.
    pub fn grants_mut(&mut self) -> Option<&mut GrantSet> {
        match &mut self.payload {
            NodePayload::Root { grants } => Some(grants),
            _ => None,
        }
    }

    /// Mark the node changed now.
    pub fn touch(&mut self) {
        self.changed_at = Utc::now();
    }
}
