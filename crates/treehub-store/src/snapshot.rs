//! JSON snapshot persistence for the node store and usage counters.
//!
//! The CLI runs one command per process, so the whole tree is loaded at
//! startup and written back after a successful command.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use treehub_core::result::AppResult;
use treehub_core::types::UserId;
use treehub_entity::node::Node;
use treehub_entity::usage::UsageCounters;

use crate::store::MemoryNodeStore;
use crate::usage::UsageAccountant;

/// Serialized form of the full store state.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// Every node in the tree.
    pub nodes: Vec<Node>,
    /// Per-user usage counters.
    pub usage: Vec<(UserId, UsageCounters)>,
}

impl TreeSnapshot {
    /// Capture the current state of a store and accountant.
    pub fn capture(store: &MemoryNodeStore, usage: &UsageAccountant) -> Self {
        Self {
            nodes: store.all_nodes(),
            usage: usage.all_counters(),
        }
    }

    /// Restore this snapshot into a store and accountant.
    pub fn restore(self, store: &MemoryNodeStore, usage: &UsageAccountant) {
        store.replace_all(self.nodes);
        usage.replace_all(self.usage);
    }

    /// Read a snapshot from a JSON file. A missing file yields an empty
    /// snapshot.
    pub async fn read(path: &Path) -> AppResult<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(Self::default());
        }
        let data = tokio::fs::read(path).await?;
        let snapshot: Self = serde_json::from_slice(&data)?;
        info!(path = %path.display(), nodes = snapshot.nodes.len(), "loaded tree snapshot");
        Ok(snapshot)
    }

    /// Write this snapshot to a JSON file, creating parent directories.
    pub async fn write(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treehub_entity::usage::UsageDelta;

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let store = MemoryNodeStore::new();
        let usage = UsageAccountant::new();
        let owner = UserId::new();
        let root = Node::new_root("root", owner);
        store.save(&root).await.unwrap();
        usage
            .apply_delta(owner, UsageDelta::root_folder(0))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        TreeSnapshot::capture(&store, &usage)
            .write(&path)
            .await
            .unwrap();

        let store2 = MemoryNodeStore::new();
        let usage2 = UsageAccountant::new();
        TreeSnapshot::read(&path)
            .await
            .unwrap()
            .restore(&store2, &usage2);

        assert_eq!(store2.count(), 1);
        assert!(store2.load(root.id).await.unwrap().unwrap().is_root());
        assert_eq!(usage2.get_usage(owner).await.unwrap().root_folders, 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let snapshot = TreeSnapshot::read(Path::new("/nonexistent/tree.json"))
            .await
            .unwrap();
        assert!(snapshot.nodes.is_empty());
    }
}
