//! Shared test fixtures for the engine integration tests.
//!
//! Each test binary uses a different slice of the fixture.
#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;

use treehub_core::config::lock::LockConfig;
use treehub_core::traits::blob::BlobStore;
use treehub_core::types::{NodeId, UserId};
use treehub_engine::{AllowAllOracle, TreeService};
use treehub_entity::node::Node;
use treehub_lock::LockManager;
use treehub_storage::MemoryBlobStore;
use treehub_store::{MemoryNodeStore, UsageAccountant};

/// A fully wired engine over in-memory state.
pub struct TestEngine {
    pub store: Arc<MemoryNodeStore>,
    pub usage: Arc<UsageAccountant>,
    pub blobs: Arc<MemoryBlobStore>,
    pub locks: LockManager,
    pub tree: Arc<TreeService>,
    pub actor: UserId,
}

impl TestEngine {
    /// Build an engine with locking enabled and an allow-all oracle.
    pub fn new() -> Self {
        let store = Arc::new(MemoryNodeStore::new());
        let usage = Arc::new(UsageAccountant::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let locks = LockManager::new(&LockConfig::default());
        let tree = Arc::new(TreeService::new(
            store.clone(),
            locks.clone(),
            usage.clone(),
            blobs.clone(),
            Arc::new(AllowAllOracle),
        ));
        Self {
            store,
            usage,
            blobs,
            locks,
            tree,
            actor: UserId::new(),
        }
    }

    /// Create a root folder owned by the default actor.
    pub async fn root(&self, name: &str) -> Node {
        self.tree
            .create_folder(self.actor, None, name, false)
            .await
            .expect("create root")
    }

    /// Create a folder under a parent.
    pub async fn folder(&self, parent: NodeId, name: &str) -> Node {
        self.tree
            .create_folder(self.actor, Some(parent), name, false)
            .await
            .expect("create folder")
    }

    /// Add a file with the given content under a parent.
    pub async fn file(&self, parent: NodeId, name: &str, content: &str) -> Node {
        self.tree
            .add_file(
                self.actor,
                parent,
                name,
                "text/plain",
                Bytes::copy_from_slice(content.as_bytes()),
                false,
            )
            .await
            .expect("add file")
    }

    /// Read a node's blob content as a string.
    pub async fn content(&self, node: &Node) -> String {
        let blob = node.blob().expect("node has a blob");
        let bytes = self.blobs.read_bytes(blob).await.expect("read blob");
        String::from_utf8(bytes.to_vec()).expect("utf-8 content")
    }
}
