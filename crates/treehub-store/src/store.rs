//! In-memory tree node store.

use std::collections::HashMap;

use dashmap::DashMap;

use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::types::{NodeId, UserId};
use treehub_entity::node::Node;

/// In-memory node store backed by a dashmap.
///
/// Every query tolerates dangling references: an id that fails to load is
/// treated as "no longer exists" and silently skipped, never surfaced as
/// an error. Recursive walks that hit a missing child simply omit that
/// subtree.
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    /// All nodes by id.
    nodes: DashMap<NodeId, Node>,
}

impl MemoryNodeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a node by id. `None` if it does not exist.
    pub async fn load(&self, id: NodeId) -> AppResult<Option<Node>> {
        Ok(self.nodes.get(&id).map(|n| n.clone()))
    }

    /// Load a node by id, failing with a not-found error if missing.
    pub async fn load_required(&self, id: NodeId) -> AppResult<Node> {
        self.load(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Node not found: {id}")))
    }

    /// Insert or update a node.
    pub async fn save(&self, node: &Node) -> AppResult<()> {
        self.nodes.insert(node.id, node.clone());
        Ok(())
    }

    /// Remove a node. Returns whether it existed.
    pub async fn remove(&self, id: NodeId) -> AppResult<bool> {
        Ok(self.nodes.remove(&id).is_some())
    }

    /// Total node count.
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    /// All direct children of a node, sorted by name.
    pub async fn children(&self, parent: NodeId) -> AppResult<Vec<Node>> {
        let mut children: Vec<Node> = self
            .nodes
            .iter()
            .filter(|e| e.value().parent_id == Some(parent))
            .map(|e| e.value().clone())
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    /// Direct children restricted to folder kinds.
    pub async fn child_folders(&self, parent: NodeId) -> AppResult<Vec<Node>> {
        Ok(self
            .children(parent)
            .await?
            .into_iter()
            .filter(|n| n.is_folder_like())
            .collect())
    }

    /// Direct children restricted to file-like kinds.
    pub async fn child_files(&self, parent: NodeId) -> AppResult<Vec<Node>> {
        Ok(self
            .children(parent)
            .await?
            .into_iter()
            .filter(|n| n.is_file_like())
            .collect())
    }

    /// Name-to-id map of a node's direct children.
    pub async fn child_name_map(&self, parent: NodeId) -> AppResult<HashMap<String, NodeId>> {
        Ok(self
            .children(parent)
            .await?
            .into_iter()
            .map(|n| (n.name, n.id))
            .collect())
    }

    /// All root folders, optionally filtered by owner and/or name,
    /// sorted by name.
    pub async fn roots(&self, owner: Option<UserId>, name: Option<&str>) -> AppResult<Vec<Node>> {
        let mut roots: Vec<Node> = self
            .nodes
            .iter()
            .filter(|e| {
                let n = e.value();
                n.is_root()
                    && owner.is_none_or(|o| n.owner == o)
                    && name.is_none_or(|wanted| n.name == wanted)
            })
            .map(|e| e.value().clone())
            .collect();
        roots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roots)
    }

    /// The ancestor chain of a node, nearest parent first. The walk stops
    /// silently at a dangling parent reference.
    pub async fn ancestor_ids(&self, id: NodeId) -> AppResult<Vec<NodeId>> {
        let mut ancestors = Vec::new();
        let mut current = match self.load(id).await? {
            Some(node) => node.parent_id,
            None => None,
        };
        while let Some(parent_id) = current {
            // A cycle would mean a corrupted tree; bail out rather than spin.
            if ancestors.contains(&parent_id) || parent_id == id {
                break;
            }
            ancestors.push(parent_id);
            current = match self.load(parent_id).await? {
                Some(node) => node.parent_id,
                None => None,
            };
        }
        Ok(ancestors)
    }

    /// Ids of every descendant folder of a node (the node itself is not
    /// included). Missing children are skipped.
    pub async fn descendant_folder_ids(&self, id: NodeId) -> AppResult<Vec<NodeId>> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for folder in self.child_folders(current).await? {
                result.push(folder.id);
                stack.push(folder.id);
            }
        }
        Ok(result)
    }

    /// Replace the entire contents of the store (snapshot restore).
    pub fn replace_all(&self, nodes: Vec<Node>) {
        self.nodes.clear();
        for node in nodes {
            self.nodes.insert(node.id, node);
        }
    }

    /// Clone out every node (snapshot capture).
    pub fn all_nodes(&self) -> Vec<Node> {
        self.nodes.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treehub_core::types::BlobId;

    async fn seeded() -> (MemoryNodeStore, Node, Node, Node) {
        let store = MemoryNodeStore::new();
        let owner = UserId::new();
        let root = Node::new_root("root", owner);
        let folder = Node::new_folder("docs", owner, &root);
        let file = Node::new_file("a.txt", "text/plain", owner, &folder, BlobId::new(), 4);
        store.save(&root).await.unwrap();
        store.save(&folder).await.unwrap();
        store.save(&file).await.unwrap();
        (store, root, folder, file)
    }

    #[tokio::test]
    async fn test_children_split_by_kind() {
        let (store, root, folder, file) = seeded().await;
        let kids = store.children(root.id).await.unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].id, folder.id);

        let folders = store.child_folders(folder.id).await.unwrap();
        assert!(folders.is_empty());
        let files = store.child_files(folder.id).await.unwrap();
        assert_eq!(files[0].id, file.id);
    }

    #[tokio::test]
    async fn test_ancestor_chain() {
        let (store, root, folder, file) = seeded().await;
        let ancestors = store.ancestor_ids(file.id).await.unwrap();
        assert_eq!(ancestors, vec![folder.id, root.id]);
    }

    #[tokio::test]
    async fn test_ancestor_walk_stops_at_dangling_parent() {
        let (store, root, folder, file) = seeded().await;
        store.remove(folder.id).await.unwrap();
        // folder is gone: the chain records the dangling id and stops.
        let ancestors = store.ancestor_ids(file.id).await.unwrap();
        assert_eq!(ancestors, vec![folder.id]);
        assert!(!ancestors.contains(&root.id));
    }

    #[tokio::test]
    async fn test_descendant_folders() {
        let (store, root, folder, _file) = seeded().await;
        let sub = Node::new_folder("sub", root.owner, &folder);
        store.save(&sub).await.unwrap();
        let mut descendants = store.descendant_folder_ids(root.id).await.unwrap();
        descendants.sort();
        let mut expected = vec![folder.id, sub.id];
        expected.sort();
        assert_eq!(descendants, expected);
    }

    #[tokio::test]
    async fn test_roots_filtering() {
        let (store, root, _, _) = seeded().await;
        let other = Node::new_root("other", UserId::new());
        store.save(&other).await.unwrap();

        assert_eq!(store.roots(None, None).await.unwrap().len(), 2);
        let mine = store.roots(Some(root.owner), None).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, root.id);
        let named = store.roots(None, Some("other")).await.unwrap();
        assert_eq!(named[0].id, other.id);
    }
}
