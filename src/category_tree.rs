//! Category tree cache and flattened index
//!
//! The backend sends the whole category hierarchy as nested nodes. We keep
//! the raw tree for hierarchical rendering and derive a flat index in
//! pre-order (parent before children, sibling order preserved) that answers
//! id lookups, parent-chain walks, and descendant queries without
//! re-walking the tree.
//!
//! Descendancy is decided by path-prefix comparison. The separator is part
//! of the compared prefix, so sibling names that share a string prefix
//! ("Math" vs "Mathematics") never false-match.

use std::collections::HashMap;

use crate::models::{CategoryNode, FlatCategory};

/// Joins ancestor category names into a path, root-to-node order
pub const PATH_SEPARATOR: &str = "::";

/// Structural fault in the fetched tree. The backend is authoritative, so
/// these indicate corrupt data rather than client bugs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("category {0} not found")]
    NotFound(i64),
    #[error("parent chain from category {0} never reaches a root (cycle in parent links)")]
    ParentCycle(i64),
}

#[derive(Debug, Default)]
pub struct CategoryTree {
    roots: Vec<CategoryNode>,
    flat: Vec<FlatCategory>,
    by_id: HashMap<i64, usize>,
    duplicate_ids: Vec<i64>,
}

impl CategoryTree {
    /// Build the flattened index from the fetched tree (depth-first,
    /// pre-order).
    ///
    /// Duplicate ids should never happen; if they do, the last occurrence
    /// wins in the index and the id is recorded in [`duplicate_ids`]
    /// so callers can flag the data-integrity fault.
    ///
    /// [`duplicate_ids`]: CategoryTree::duplicate_ids
    pub fn build(roots: Vec<CategoryNode>) -> Self {
        let mut flat = Vec::new();
        let mut by_id = HashMap::new();
        let mut duplicate_ids = Vec::new();

        fn walk(
            nodes: &[CategoryNode],
            parent_path: &str,
            flat: &mut Vec<FlatCategory>,
            by_id: &mut HashMap<i64, usize>,
            duplicate_ids: &mut Vec<i64>,
        ) {
            for node in nodes {
                let path = if parent_path.is_empty() {
                    node.name.clone()
                } else {
                    format!("{}{}{}", parent_path, PATH_SEPARATOR, node.name)
                };
                if by_id.insert(node.id, flat.len()).is_some() {
                    duplicate_ids.push(node.id);
                }
                flat.push(FlatCategory {
                    id: node.id,
                    name: node.name.clone(),
                    parent_id: node.parent_id,
                    path: path.clone(),
                });
                walk(&node.children, &path, flat, by_id, duplicate_ids);
            }
        }
        walk(&roots, "", &mut flat, &mut by_id, &mut duplicate_ids);

        if !duplicate_ids.is_empty() {
            eprintln!(
                "[Tree] backend tree contains duplicate category ids: {:?}",
                duplicate_ids
            );
        }

        Self {
            roots,
            flat,
            by_id,
            duplicate_ids,
        }
    }

    /// Raw nested tree as fetched, for hierarchical rendering
    pub fn raw_roots(&self) -> &[CategoryNode] {
        &self.roots
    }

    /// Ids that appeared more than once in the fetched tree (normally empty)
    pub fn duplicate_ids(&self) -> &[i64] {
        &self.duplicate_ids
    }

    pub fn lookup(&self, id: i64) -> Option<&FlatCategory> {
        self.by_id.get(&id).map(|&idx| &self.flat[idx])
    }

    /// Walk `parent_id` links up to the top-level ancestor.
    ///
    /// The walk is bounded by the total node count: a tree whose parent
    /// links form a cycle (or point at a missing node) fails instead of
    /// looping forever.
    pub fn root_of(&self, id: i64) -> Result<&FlatCategory, TreeError> {
        let mut current = self.lookup(id).ok_or(TreeError::NotFound(id))?;
        let mut hops = 0usize;
        while let Some(parent_id) = current.parent_id {
            hops += 1;
            if hops > self.flat.len() {
                return Err(TreeError::ParentCycle(id));
            }
            current = self.lookup(parent_id).ok_or(TreeError::NotFound(parent_id))?;
        }
        Ok(current)
    }

    /// Direct children of `id`, in pre-order (original sibling order)
    pub fn children_of(&self, id: i64) -> Vec<&FlatCategory> {
        self.flat
            .iter()
            .filter(|c| c.parent_id == Some(id))
            .collect()
    }

    /// Every category nested under `id`, at any depth, excluding `id`
    /// itself. Empty for an unknown id.
    pub fn descendants_of(&self, id: i64) -> Vec<&FlatCategory> {
        let Some(base) = self.lookup(id) else {
            return Vec::new();
        };
        let prefix = format!("{}{}", base.path, PATH_SEPARATOR);
        self.flat
            .iter()
            .filter(|c| c.path.starts_with(&prefix))
            .collect()
    }

    /// Root categories (no parent), in display order
    pub fn top_level(&self) -> Vec<&FlatCategory> {
        self.flat.iter().filter(|c| c.parent_id.is_none()).collect()
    }

    /// Case-insensitive name search over the nested tree, first match in
    /// pre-order. Drives name-based navigation from the CLI.
    pub fn find_by_name(&self, name: &str) -> Option<&FlatCategory> {
        fn search<'a>(nodes: &'a [CategoryNode], target: &str) -> Option<&'a CategoryNode> {
            for node in nodes {
                if node.name.eq_ignore_ascii_case(target) {
                    return Some(node);
                }
                if let Some(found) = search(&node.children, target) {
                    return Some(found);
                }
            }
            None
        }
        let found = search(&self.roots, name)?;
        self.lookup(found.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlatCategory> {
        self.flat.iter()
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, name: &str, parent_id: Option<i64>, children: Vec<CategoryNode>) -> CategoryNode {
        CategoryNode {
            id,
            name: name.to_string(),
            parent_id,
            children,
            slug: None,
            description: None,
        }
    }

    /// A(1) -> B(2) -> C(3), plus a second root D(4)
    fn sample_tree() -> CategoryTree {
        CategoryTree::build(vec![
            node(
                1,
                "A",
                None,
                vec![node(2, "B", Some(1), vec![node(3, "C", Some(2), vec![])])],
            ),
            node(4, "D", None, vec![]),
        ])
    }

    #[test]
    fn test_build_counts_every_node_once() {
        let tree = sample_tree();
        assert_eq!(tree.len(), 4);
        assert!(tree.duplicate_ids().is_empty());
        for id in [1, 2, 3, 4] {
            assert!(tree.lookup(id).is_some(), "missing id {}", id);
        }
    }

    #[test]
    fn test_paths_join_ancestor_names() {
        let tree = sample_tree();
        assert_eq!(tree.lookup(1).unwrap().path, "A");
        assert_eq!(tree.lookup(2).unwrap().path, "A::B");
        assert_eq!(tree.lookup(3).unwrap().path, "A::B::C");
        assert_eq!(tree.lookup(4).unwrap().path, "D");
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let raw = vec![
            node(
                1,
                "A",
                None,
                vec![node(2, "B", Some(1), vec![node(3, "C", Some(2), vec![])])],
            ),
            node(4, "D", None, vec![]),
        ];
        let first = CategoryTree::build(raw.clone());
        let second = CategoryTree::build(raw);
        for entry in first.iter() {
            assert_eq!(Some(entry), second.lookup(entry.id));
        }
    }

    #[test]
    fn test_lookup_unknown_id() {
        let tree = sample_tree();
        assert!(tree.lookup(99).is_none());
    }

    #[test]
    fn test_root_of_walks_to_parentless_node() {
        let tree = sample_tree();
        let root = tree.root_of(3).unwrap();
        assert_eq!(root.id, 1);
        assert_eq!(root.name, "A");
        assert!(root.parent_id.is_none());
        // a root is its own root
        assert_eq!(tree.root_of(4).unwrap().id, 4);
    }

    #[test]
    fn test_root_of_unknown_id() {
        let tree = sample_tree();
        assert_eq!(tree.root_of(99), Err(TreeError::NotFound(99)));
    }

    #[test]
    fn test_root_of_detects_parent_cycle() {
        // Nesting is a tree, but the parent_id fields loop: 1 -> 2 -> 1
        let tree = CategoryTree::build(vec![node(
            1,
            "A",
            Some(2),
            vec![node(2, "B", Some(1), vec![])],
        )]);
        assert_eq!(tree.root_of(2), Err(TreeError::ParentCycle(2)));
    }

    #[test]
    fn test_root_of_dangling_parent_is_not_found() {
        let tree = CategoryTree::build(vec![node(5, "Orphan", Some(42), vec![])]);
        assert_eq!(tree.root_of(5), Err(TreeError::NotFound(42)));
    }

    #[test]
    fn test_children_preserve_sibling_order() {
        let tree = CategoryTree::build(vec![node(
            1,
            "Root",
            None,
            vec![
                node(2, "Zeta", Some(1), vec![]),
                node(3, "Alpha", Some(1), vec![]),
                node(4, "Mid", Some(1), vec![]),
            ],
        )]);
        let names: Vec<&str> = tree.children_of(1).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_descendants_of_whole_subtree() {
        let tree = sample_tree();
        let ids: Vec<i64> = tree.descendants_of(1).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(tree.descendants_of(3).is_empty());
        assert!(tree.descendants_of(99).is_empty());
    }

    #[test]
    fn test_descendants_prefix_is_separator_bounded() {
        // "Math" must not claim "Mathematics"'s children
        let tree = CategoryTree::build(vec![
            node(1, "Math", None, vec![node(2, "Algebra", Some(1), vec![])]),
            node(
                3,
                "Mathematics",
                None,
                vec![node(4, "History", Some(3), vec![])],
            ),
        ]);
        let math: Vec<i64> = tree.descendants_of(1).iter().map(|c| c.id).collect();
        assert_eq!(math, vec![2]);
        let mathematics: Vec<i64> = tree.descendants_of(3).iter().map(|c| c.id).collect();
        assert_eq!(mathematics, vec![4]);
    }

    #[test]
    fn test_duplicate_ids_flagged_last_write_wins() {
        let tree = CategoryTree::build(vec![
            node(1, "First", None, vec![]),
            node(1, "Second", None, vec![]),
        ]);
        assert_eq!(tree.duplicate_ids(), &[1]);
        assert_eq!(tree.lookup(1).unwrap().name, "Second");
    }

    #[test]
    fn test_top_level() {
        let tree = sample_tree();
        let names: Vec<&str> = tree.top_level().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "D"]);
    }

    #[test]
    fn test_find_by_name_case_insensitive() {
        let tree = sample_tree();
        assert_eq!(tree.find_by_name("b").unwrap().id, 2);
        assert_eq!(tree.find_by_name("C").unwrap().path, "A::B::C");
        assert!(tree.find_by_name("missing").is_none());
    }
}
