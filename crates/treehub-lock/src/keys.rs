//! Lock name builders.
//!
//! Centralising name construction prevents typos and makes it easy to
//! find every lock the application uses. There are exactly two families:
//! per-node edit locks and the single root-list sentinel.

use treehub_core::types::NodeId;

/// Lock name guarding structural edits of one node.
pub fn edit(node: NodeId) -> String {
    format!("edit:{node}")
}

/// Sentinel lock name guarding a user's root-folder list.
pub const ROOT_LIST: &str = "root-list";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_key_embeds_node_id() {
        let id = NodeId::new();
        let key = edit(id);
        assert!(key.starts_with("edit:"));
        assert!(key.contains(&id.to_string()));
    }
}
