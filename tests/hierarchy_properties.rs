//! Property tests over randomly shaped forests.

use std::collections::HashMap;

use chrono::Utc;
use proptest::prelude::*;
use uuid::Uuid;

use vendor_catalog::models::Category;
use vendor_catalog::{collect_leaves, CategoryTree};

/// Forest shapes as parent indices: entry `i` is `Some(j)` with `j < i`, or
/// `None` for a root. Earlier-parent-only keeps the graph acyclic by
/// construction, the same guarantee creation-time parent assignment gives
/// the real store.
fn arb_forest() -> impl Strategy<Value = Vec<Option<usize>>> {
    prop::collection::vec((any::<u8>(), prop::bool::weighted(0.15)), 1..40).prop_map(
        |choices| {
            choices
                .into_iter()
                .enumerate()
                .map(|(i, (pick, is_root))| {
                    if i == 0 || is_root {
                        None
                    } else {
                        Some(pick as usize % i)
                    }
                })
                .collect()
        },
    )
}

fn materialize(parents: &[Option<usize>]) -> (Vec<Uuid>, Vec<Category>) {
    let ids: Vec<Uuid> = parents.iter().map(|_| Uuid::new_v4()).collect();
    let now = Utc::now();
    let records: Vec<Category> = parents
        .iter()
        .enumerate()
        .map(|(i, parent)| Category {
            category_id: ids[i],
            name: format!("node-{i}"),
            parent_id: parent.map(|p| ids[p]),
            sequence: i as i32,
            price: None,
            terms: None,
            image_url: None,
            free_text_enabled: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .collect();
    let roots = records
        .iter()
        .filter(|r| r.parent_id.is_none())
        .map(|r| r.category_id)
        .collect();
    (roots, records)
}

fn child_counts(records: &[Category]) -> HashMap<Uuid, usize> {
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for record in records {
        if let Some(parent) = record.parent_id {
            *counts.entry(parent).or_insert(0) += 1;
        }
    }
    counts
}

proptest! {
    /// Re-walking parent pointers from any collected leaf reproduces the
    /// leaf's id path and name path, reversed.
    #[test]
    fn leaf_paths_rewalk_to_the_root(parents in arb_forest()) {
        let (roots, records) = materialize(&parents);
        let by_id: HashMap<Uuid, Category> = records
            .iter()
            .map(|r| (r.category_id, r.clone()))
            .collect();
        let tree = CategoryTree::from_records(roots, records);

        for leaf in collect_leaves(&tree) {
            let mut walked_ids = Vec::new();
            let mut walked_names = Vec::new();
            let mut current = leaf.ids.last().copied();
            while let Some(id) = current {
                let node = &by_id[&id];
                walked_ids.push(id);
                walked_names.push(node.name.clone());
                current = node.parent_id;
            }
            walked_ids.reverse();
            walked_names.reverse();
            prop_assert_eq!(walked_ids, leaf.ids);
            prop_assert_eq!(walked_names, leaf.levels);
        }
    }

    /// The tree's leaf and last-level-parent predicates agree with the raw
    /// parent-pointer data, for every node.
    #[test]
    fn leaf_definitions_agree(parents in arb_forest()) {
        let (roots, records) = materialize(&parents);
        let counts = child_counts(&records);
        let tree = CategoryTree::from_records(roots, records.clone());

        for record in &records {
            let id = record.category_id;
            let expected_leaf = counts.get(&id).copied().unwrap_or(0) == 0;
            prop_assert_eq!(tree.is_leaf(id), expected_leaf);

            let kids: Vec<Uuid> = records
                .iter()
                .filter(|r| r.parent_id == Some(id))
                .map(|r| r.category_id)
                .collect();
            let expected_llp = !kids.is_empty()
                && kids
                    .iter()
                    .all(|kid| counts.get(kid).copied().unwrap_or(0) == 0);
            prop_assert_eq!(tree.is_last_level_parent(id), expected_llp);
        }
    }

    /// The deletion schedule covers every node and never orders a parent
    /// before one of its children.
    #[test]
    fn deletion_schedule_orders_children_first(parents in arb_forest()) {
        let (roots, records) = materialize(&parents);
        let tree = CategoryTree::from_records(roots, records.clone());

        let schedule = tree.post_order();
        prop_assert_eq!(schedule.len(), records.len());
        let position: HashMap<Uuid, usize> = schedule
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();
        for record in &records {
            if let Some(parent) = record.parent_id {
                prop_assert!(position[&record.category_id] < position[&parent]);
            }
        }
    }

    /// Collected leaves are exactly the zero-child nodes, once each.
    #[test]
    fn leaves_cover_every_terminal_node(parents in arb_forest()) {
        let (roots, records) = materialize(&parents);
        let counts = child_counts(&records);
        let tree = CategoryTree::from_records(roots, records.clone());

        let mut collected: Vec<Uuid> = collect_leaves(&tree)
            .into_iter()
            .filter_map(|leaf| leaf.ids.last().copied())
            .collect();
        let mut expected: Vec<Uuid> = records
            .iter()
            .filter(|r| counts.get(&r.category_id).copied().unwrap_or(0) == 0)
            .map(|r| r.category_id)
            .collect();
        collected.sort();
        expected.sort();
        prop_assert_eq!(collected, expected);
    }
}
