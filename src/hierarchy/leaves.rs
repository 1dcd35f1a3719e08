//! Leaf collector: flattens a tree or forest into its ordered leaf set.

use serde::Serialize;
use uuid::Uuid;

use crate::models::Category;

use super::tree::CategoryTree;

/// One leaf with its full name path and id path from the traversal root.
#[derive(Debug, Clone, Serialize)]
pub struct LeafPath {
    /// Names from the root down to the leaf, in order.
    pub levels: Vec<String>,
    /// Ids paralleling `levels`.
    pub ids: Vec<Uuid>,
    pub category: Category,
}

/// Depth-first flattening. Traversal order is stable - it respects each
/// sibling group's ordering - because downstream consumers present leaves in
/// this order without re-sorting. Forests traverse each root independently
/// and concatenate.
pub fn collect_leaves(tree: &CategoryTree) -> Vec<LeafPath> {
    let mut out = Vec::new();
    let mut levels = Vec::new();
    let mut ids = Vec::new();
    for &root in tree.roots() {
        walk(tree, root, &mut levels, &mut ids, &mut out);
    }
    out
}

fn walk(
    tree: &CategoryTree,
    id: Uuid,
    levels: &mut Vec<String>,
    ids: &mut Vec<Uuid>,
    out: &mut Vec<LeafPath>,
) {
    let Some(node) = tree.node(id) else {
        return;
    };
    levels.push(node.name.clone());
    ids.push(id);

    let kids = tree.children(id);
    if kids.is_empty() {
        out.push(LeafPath {
            levels: levels.clone(),
            ids: ids.clone(),
            category: node.clone(),
        });
    } else {
        for &kid in kids {
            walk(tree, kid, levels, ids, out);
        }
    }

    levels.pop();
    ids.pop();
}
