//! Tree builder: loads flat records and assembles [`CategoryTree`]s.
//!
//! Loading is level-batched - one grouped children query per depth level
//! instead of one query per node - then every algorithm downstream runs
//! purely in memory.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::models::{Category, Hierarchy};
use crate::store::CategoryStore;

use super::tree::CategoryTree;

/// Read-only tree assembly over a [`CategoryStore`].
#[derive(Clone)]
pub struct TreeBuilder {
    store: Arc<dyn CategoryStore>,
}

impl TreeBuilder {
    pub fn new(store: Arc<dyn CategoryStore>) -> Self {
        Self { store }
    }

    /// Load `root_id` plus all transitive children and assemble the tree.
    ///
    /// A missing root yields `Ok(None)` - absence is the caller's decision
    /// to surface, not an engine error. A child already seen is not
    /// re-queued, so malformed parent data cannot loop the loader.
    pub async fn build_subtree(
        &self,
        hierarchy: Hierarchy,
        root_id: Uuid,
    ) -> Result<Option<CategoryTree>, CatalogError> {
        let Some(root) = self.store.get_node(hierarchy, root_id).await? else {
            return Ok(None);
        };

        let mut records = vec![root];
        let mut seen: HashSet<Uuid> = HashSet::from([root_id]);
        let mut frontier = vec![root_id];
        while !frontier.is_empty() {
            let grouped = self.store.children_of_many(hierarchy, &frontier).await?;
            let mut next = Vec::new();
            for children in grouped.into_values() {
                for child in children {
                    if seen.insert(child.category_id) {
                        next.push(child.category_id);
                        records.push(child);
                    }
                }
            }
            frontier = next;
        }

        debug!(root = %root_id, nodes = records.len(), "subtree loaded");
        Ok(Some(CategoryTree::single_rooted(root_id, records)))
    }

    /// Ancestor chain from the root down to `node_id` (inclusive).
    ///
    /// Walks `parent_id` upward until a root. Terminates on a missing
    /// ancestor (returning the partial chain walked so far) and on a
    /// revisited id, so dangling references and malformed cycles degrade
    /// instead of looping. A missing start node yields an empty chain.
    pub async fn ancestor_chain(
        &self,
        hierarchy: Hierarchy,
        node_id: Uuid,
    ) -> Result<Vec<Category>, CatalogError> {
        let mut chain = Vec::new();
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut current = Some(node_id);
        while let Some(id) = current {
            if !visited.insert(id) {
                debug!(node = %id, "ancestor walk revisited a node; stopping");
                break;
            }
            let Some(node) = self.store.get_node(hierarchy, id).await? else {
                debug!(node = %id, "ancestor walk hit a dangling reference; stopping");
                break;
            };
            current = node.parent_id;
            chain.push(node);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Name path from the root down to `node_id`, for display and for
    /// object-path segmentation.
    pub async fn ancestor_names(
        &self,
        hierarchy: Hierarchy,
        node_id: Uuid,
    ) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .ancestor_chain(hierarchy, node_id)
            .await?
            .into_iter()
            .map(|node| node.name)
            .collect())
    }

    /// Id path variant of [`TreeBuilder::ancestor_names`].
    pub async fn ancestor_ids(
        &self,
        hierarchy: Hierarchy,
        node_id: Uuid,
    ) -> Result<Vec<Uuid>, CatalogError> {
        Ok(self
            .ancestor_chain(hierarchy, node_id)
            .await?
            .into_iter()
            .map(|node| node.category_id)
            .collect())
    }
}
