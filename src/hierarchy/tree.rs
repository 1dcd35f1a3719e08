//! In-memory category tree: an arena of records plus explicit child lists.
//!
//! Records live in a flat id-indexed map and parent/child relationships are
//! materialized once as ordered `Vec<Uuid>` child lists, so the recursive
//! algorithms (cascade scheduling, validation, leaf collection) run purely in
//! memory with no live object references to manage. Multiple roots are
//! supported; a forest traverses each root independently.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::models::{sibling_order, Category};

#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    roots: Vec<Uuid>,
    nodes: HashMap<Uuid, Category>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

impl CategoryTree {
    /// Assemble a tree from a flat record batch.
    ///
    /// Child lists are sorted per sibling group (`sequence` ascending,
    /// creation time descending on ties). Records whose parent is absent
    /// from the batch simply hang off nothing; a child reachable twice
    /// (malformed data forming a cycle) is attached only the first time, so
    /// traversal always terminates.
    pub fn from_records(roots: Vec<Uuid>, records: Vec<Category>) -> Self {
        let mut nodes: HashMap<Uuid, Category> = HashMap::with_capacity(records.len());
        for record in records {
            nodes.insert(record.category_id, record);
        }

        let mut raw_children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for node in nodes.values() {
            if let Some(parent) = node.parent_id {
                if nodes.contains_key(&parent) {
                    raw_children.entry(parent).or_default().push(node.category_id);
                }
            }
        }
        for ids in raw_children.values_mut() {
            ids.sort_by(|a, b| sibling_order(&nodes[a], &nodes[b]));
        }

        let roots: Vec<Uuid> = roots.into_iter().filter(|id| nodes.contains_key(id)).collect();

        // Keep only edges discovered on a first visit from the roots, so the
        // child lists always form a proper forest.
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut visited: HashSet<Uuid> = roots.iter().copied().collect();
        let mut stack: Vec<Uuid> = roots.clone();
        while let Some(id) = stack.pop() {
            let kids: Vec<Uuid> = raw_children
                .get(&id)
                .map(|ids| {
                    ids.iter()
                        .copied()
                        .filter(|kid| visited.insert(*kid))
                        .collect()
                })
                .unwrap_or_default();
            for &kid in &kids {
                stack.push(kid);
            }
            children.insert(id, kids);
        }

        Self {
            roots,
            nodes,
            children,
        }
    }

    /// Single-root convenience used by the builder.
    pub fn single_rooted(root_id: Uuid, records: Vec<Category>) -> Self {
        Self::from_records(vec![root_id], records)
    }

    pub fn roots(&self) -> &[Uuid] {
        &self.roots
    }

    pub fn node(&self, id: Uuid) -> Option<&Category> {
        self.nodes.get(&id)
    }

    pub fn children(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of records in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_leaf(&self, id: Uuid) -> bool {
        self.children(id).is_empty()
    }

    /// At least one child, and every child is itself a leaf.
    pub fn is_last_level_parent(&self, id: Uuid) -> bool {
        let kids = self.children(id);
        !kids.is_empty() && kids.iter().all(|&kid| self.is_leaf(kid))
    }

    /// All transitive descendants of `id`, excluding `id` itself.
    pub fn descendants(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut stack: Vec<Uuid> = self.children(id).to_vec();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend_from_slice(self.children(current));
        }
        out
    }

    /// Deletion schedule: every child precedes its parent.
    pub fn post_order(&self) -> Vec<Uuid> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            self.post_order_from(root, &mut out);
        }
        out
    }

    fn post_order_from(&self, id: Uuid, out: &mut Vec<Uuid>) {
        for &kid in self.children(id) {
            self.post_order_from(kid, out);
        }
        out.push(id);
    }

    /// Nested view for serialization (API responses).
    pub fn to_view(&self) -> Vec<CategoryTreeView> {
        self.roots
            .iter()
            .filter_map(|&root| self.view_of(root))
            .collect()
    }

    fn view_of(&self, id: Uuid) -> Option<CategoryTreeView> {
        let category = self.nodes.get(&id)?.clone();
        let children = self
            .children(id)
            .iter()
            .filter_map(|&kid| self.view_of(kid))
            .collect();
        Some(CategoryTreeView { category, children })
    }
}

/// Owned nested rendering of a [`CategoryTree`].
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTreeView {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryTreeView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(name: &str, parent: Option<Uuid>, sequence: i32) -> Category {
        Category {
            category_id: Uuid::new_v4(),
            name: name.to_string(),
            parent_id: parent,
            sequence,
            price: None,
            terms: None,
            image_url: None,
            free_text_enabled: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// A -> [B -> [C, D]] with C, D leaves.
    fn sample_tree() -> (CategoryTree, Uuid, Uuid, Uuid, Uuid) {
        let a = record("A", None, 0);
        let b = record("B", Some(a.category_id), 0);
        let c = record("C", Some(b.category_id), 0);
        let d = record("D", Some(b.category_id), 1);
        let (aid, bid, cid, did) = (a.category_id, b.category_id, c.category_id, d.category_id);
        let tree = CategoryTree::from_records(vec![aid], vec![a, b, c, d]);
        (tree, aid, bid, cid, did)
    }

    #[test]
    fn children_sorted_by_sequence() {
        let root = record("root", None, 0);
        let rid = root.category_id;
        let late = record("late", Some(rid), 5);
        let early = record("early", Some(rid), 1);
        let tree = CategoryTree::from_records(vec![rid], vec![root, late, early]);

        let names: Vec<&str> = tree
            .children(rid)
            .iter()
            .map(|&id| tree.node(id).map(|n| n.name.as_str()).unwrap_or(""))
            .collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn leaf_and_last_level_parent() {
        let (tree, aid, bid, cid, did) = sample_tree();
        assert!(!tree.is_leaf(aid));
        assert!(tree.is_leaf(cid));
        assert!(tree.is_leaf(did));
        assert!(tree.is_last_level_parent(bid));
        assert!(!tree.is_last_level_parent(aid));
        assert!(!tree.is_last_level_parent(cid));
    }

    #[test]
    fn post_order_puts_children_first() {
        let (tree, aid, bid, _, _) = sample_tree();
        let schedule = tree.post_order();
        assert_eq!(schedule.len(), 4);
        assert_eq!(*schedule.last().expect("non-empty"), aid);
        let pos =
            |id: Uuid| schedule.iter().position(|&x| x == id).expect("scheduled");
        for &kid in tree.children(bid) {
            assert!(pos(kid) < pos(bid));
        }
        assert!(pos(bid) < pos(aid));
    }

    #[test]
    fn dangling_parent_is_tolerated() {
        let root = record("root", None, 0);
        let rid = root.category_id;
        let orphan = record("orphan", Some(Uuid::new_v4()), 0);
        let tree = CategoryTree::from_records(vec![rid], vec![root, orphan]);
        assert_eq!(tree.children(rid).len(), 0);
        assert_eq!(tree.post_order().len(), 1);
    }

    #[test]
    fn cycle_in_batch_does_not_hang_traversal() {
        let mut a = record("a", None, 0);
        let b = record("b", Some(a.category_id), 0);
        // Malformed upstream data: the root claims its own child as parent.
        a.parent_id = Some(b.category_id);
        let aid = a.category_id;
        let tree = CategoryTree::from_records(vec![aid], vec![a, b]);
        let schedule = tree.post_order();
        assert_eq!(schedule.len(), 2);
        assert_eq!(*schedule.last().expect("non-empty"), aid);
    }

    #[test]
    fn descendants_excludes_self() {
        let (tree, aid, bid, cid, did) = sample_tree();
        let mut desc = tree.descendants(aid);
        desc.sort();
        let mut expected = vec![bid, cid, did];
        expected.sort();
        assert_eq!(desc, expected);
    }

    #[test]
    fn forest_has_independent_roots() {
        let r1 = record("r1", None, 0);
        let r2 = record("r2", None, 1);
        let kid = record("kid", Some(r2.category_id), 0);
        let (id1, id2) = (r1.category_id, r2.category_id);
        let tree = CategoryTree::from_records(vec![id1, id2], vec![r1, r2, kid]);
        assert_eq!(tree.roots(), &[id1, id2]);
        assert_eq!(tree.children(id2).len(), 1);
        assert_eq!(tree.to_view().len(), 2);
    }
}
