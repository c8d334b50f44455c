//! Template tree model: canonical folder hierarchy with stable keys and
//! derived slash-joined paths.
//!
//! `resolve_paths` must run after any structural edit and before paths are
//! compared against routing decisions. Traversals are iterative with a fixed
//! depth cap so a malformed tree can never recurse without bound.

use crate::error::{ClerkError, Result};
use crate::model::FolderNode;
use uuid::Uuid;

/// Maximum tree depth honored by traversals. Nodes deeper than this are
/// ignored rather than walked.
pub const MAX_TREE_DEPTH: usize = 10;

/// The fallback destination used when no router can place a file.
pub const CATCH_ALL_NAME: &str = "Other";

impl FolderNode {
    /// A bare node with a fresh id; `key` and `path` are filled by
    /// `resolve_paths`.
    pub fn new(name: impl Into<String>) -> Self {
        FolderNode {
            id: Uuid::new_v4().to_string(),
            key: String::new(),
            name: name.into(),
            path: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_children(name: impl Into<String>, children: Vec<FolderNode>) -> Self {
        let mut node = FolderNode::new(name);
        node.children = children;
        node
    }
}

/// Recompute every node's `path` from the root and assign a key to any node
/// lacking one. Idempotent: keys already assigned are never regenerated.
pub fn resolve_paths(tree: &mut FolderNode) {
    // (node, parent path, depth) worklist, pre-order.
    let mut work: Vec<(&mut FolderNode, String, usize)> = vec![(tree, String::new(), 0)];
    while let Some((node, base, depth)) = work.pop() {
        if depth > MAX_TREE_DEPTH {
            continue;
        }
        node.path = if base.is_empty() {
            node.name.clone()
        } else {
            format!("{}/{}", base, node.name)
        };
        if node.key.is_empty() {
            node.key = if node.id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                node.id.clone()
            };
        }
        if node.id.is_empty() {
            node.id = node.key.clone();
        }
        let path = node.path.clone();
        for child in node.children.iter_mut().rev() {
            work.push((child, path.clone(), depth + 1));
        }
    }
}

/// Depth-first pre-order search by stable key. Absence is a valid
/// "not configured yet" state, so this returns `None` rather than erroring.
pub fn find_by_key<'a>(tree: &'a FolderNode, key: &str) -> Option<&'a FolderNode> {
    iter_preorder(tree).find(|node| node.key == key)
}

/// Depth-first pre-order search by derived path.
pub fn find_by_path<'a>(tree: &'a FolderNode, path: &str) -> Option<&'a FolderNode> {
    iter_preorder(tree).find(|node| node.path == path)
}

/// Every path in the tree, pre-order with children in insertion order.
/// The order is deterministic because it feeds classifier tie-breaks.
pub fn all_paths(tree: &FolderNode) -> Vec<String> {
    iter_preorder(tree).map(|node| node.path.clone()).collect()
}

/// Pre-order iterator over the tree, bounded to `MAX_TREE_DEPTH`.
pub fn iter_preorder(tree: &FolderNode) -> impl Iterator<Item = &FolderNode> {
    let mut stack: Vec<(&FolderNode, usize)> = vec![(tree, 0)];
    std::iter::from_fn(move || {
        let (node, depth) = stack.pop()?;
        if depth < MAX_TREE_DEPTH {
            for child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        Some(node)
    })
}

/// Mapping of derived path to stable key for every keyed node.
pub fn path_key_index(tree: &FolderNode) -> Vec<(String, String)> {
    iter_preorder(tree)
        .filter(|node| !node.key.is_empty())
        .map(|node| (node.path.clone(), node.key.clone()))
        .collect()
}

/// The designated catch-all node: the first node (pre-order) whose name
/// case-insensitively contains "other".
pub fn find_catch_all(tree: &FolderNode) -> Option<&FolderNode> {
    iter_preorder(tree).find(|node| node.name.to_lowercase().contains("other"))
}

/// Add a child under the node with the given id. Paths must be re-resolved
/// by the caller afterwards.
pub fn add_child(tree: &mut FolderNode, parent_id: &str, child: FolderNode) -> Result<()> {
    match find_by_id_mut(tree, parent_id) {
        Some(parent) => {
            parent.children.push(child);
            Ok(())
        }
        None => Err(ClerkError::not_found("folder node", parent_id)),
    }
}

/// Rename the node with the given id in place.
pub fn rename_node(tree: &mut FolderNode, node_id: &str, name: &str) -> Result<()> {
    match find_by_id_mut(tree, node_id) {
        Some(node) => {
            node.name = name.to_string();
            Ok(())
        }
        None => Err(ClerkError::not_found("folder node", node_id)),
    }
}

/// Remove the node with the given id (and its subtree). Removing the root is
/// a validation error; the root always exists.
pub fn remove_node(tree: &mut FolderNode, node_id: &str) -> Result<()> {
    if tree.id == node_id {
        return Err(ClerkError::validation("cannot remove the template root"));
    }
    if remove_from_children(tree, node_id, 0) {
        Ok(())
    } else {
        Err(ClerkError::not_found("folder node", node_id))
    }
}

fn remove_from_children(node: &mut FolderNode, node_id: &str, depth: usize) -> bool {
    if depth > MAX_TREE_DEPTH {
        return false;
    }
    if let Some(pos) = node.children.iter().position(|c| c.id == node_id) {
        node.children.remove(pos);
        return true;
    }
    node.children
        .iter_mut()
        .any(|child| remove_from_children(child, node_id, depth + 1))
}

fn find_by_id_mut<'a>(tree: &'a mut FolderNode, node_id: &str) -> Option<&'a mut FolderNode> {
    let mut stack: Vec<(&mut FolderNode, usize)> = vec![(tree, 0)];
    while let Some((node, depth)) = stack.pop() {
        if node.id == node_id {
            return Some(node);
        }
        if depth < MAX_TREE_DEPTH {
            for child in node.children.iter_mut().rev() {
                stack.push((child, depth + 1));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> FolderNode {
        let mut tree = FolderNode::with_children(
            "Root",
            vec![
                FolderNode::with_children(
                    "Finance",
                    vec![FolderNode::new("Invoices"), FolderNode::new("Receipts")],
                ),
                FolderNode::new("Legal"),
                FolderNode::new("Other"),
            ],
        );
        resolve_paths(&mut tree);
        tree
    }

    #[test]
    fn resolve_paths_derives_slash_joined_paths() {
        let tree = sample_tree();
        let paths = all_paths(&tree);
        assert_eq!(
            paths,
            vec![
                "Root",
                "Root/Finance",
                "Root/Finance/Invoices",
                "Root/Finance/Receipts",
                "Root/Legal",
                "Root/Other",
            ]
        );
    }

    #[test]
    fn resolve_paths_is_idempotent_for_keys() {
        let mut tree = sample_tree();
        let keys_before: Vec<String> =
            iter_preorder(&tree).map(|n| n.key.clone()).collect();
        resolve_paths(&mut tree);
        let keys_after: Vec<String> = iter_preorder(&tree).map(|n| n.key.clone()).collect();
        assert_eq!(keys_before, keys_after);
    }

    #[test]
    fn paths_and_lookup_are_inverses() {
        let tree = sample_tree();
        for path in all_paths(&tree) {
            let node = find_by_path(&tree, &path).expect("path resolves");
            assert_eq!(node.path, path);
        }
    }

    #[test]
    fn find_by_key_returns_none_for_unknown_key() {
        let tree = sample_tree();
        assert!(find_by_key(&tree, "no-such-key").is_none());
    }

    #[test]
    fn rename_changes_derived_paths_after_resolve() {
        let mut tree = sample_tree();
        let legal_id = find_by_path(&tree, "Root/Legal").unwrap().id.clone();
        let legal_key = find_by_path(&tree, "Root/Legal").unwrap().key.clone();
        rename_node(&mut tree, &legal_id, "Contracts").unwrap();
        resolve_paths(&mut tree);
        assert!(find_by_path(&tree, "Root/Legal").is_none());
        let renamed = find_by_path(&tree, "Root/Contracts").unwrap();
        // The stable key survives the rename.
        assert_eq!(renamed.key, legal_key);
    }

    #[test]
    fn remove_root_is_rejected() {
        let mut tree = sample_tree();
        let root_id = tree.id.clone();
        assert!(matches!(
            remove_node(&mut tree, &root_id),
            Err(ClerkError::Validation(_))
        ));
    }

    #[test]
    fn remove_node_drops_subtree() {
        let mut tree = sample_tree();
        let finance_id = find_by_path(&tree, "Root/Finance").unwrap().id.clone();
        remove_node(&mut tree, &finance_id).unwrap();
        resolve_paths(&mut tree);
        assert!(find_by_path(&tree, "Root/Finance/Invoices").is_none());
        assert_eq!(all_paths(&tree), vec!["Root", "Root/Legal", "Root/Other"]);
    }

    #[test]
    fn catch_all_matches_case_insensitively() {
        let mut tree = FolderNode::with_children(
            "Root",
            vec![FolderNode::new("Misc"), FolderNode::new("OTHER docs")],
        );
        resolve_paths(&mut tree);
        assert_eq!(find_catch_all(&tree).unwrap().name, "OTHER docs");
    }
}
