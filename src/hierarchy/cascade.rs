//! Cascade operator: subtree deletion and flag propagation.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::CatalogError;
use crate::models::{CategoryFlag, Hierarchy};
use crate::store::{AssetStore, CategoryStore};

use super::builder::TreeBuilder;

pub struct CascadeOperator {
    store: Arc<dyn CategoryStore>,
    assets: Arc<dyn AssetStore>,
}

impl CascadeOperator {
    pub fn new(store: Arc<dyn CategoryStore>, assets: Arc<dyn AssetStore>) -> Self {
        Self { store, assets }
    }

    /// Delete `node_id` and every descendant, children before parents.
    ///
    /// Leaf images are unlinked best-effort first; an asset failure is
    /// logged and never blocks the row deletion. The first row-deletion
    /// failure aborts the cascade before the parent is touched, so no
    /// surviving child ever references a deleted parent. There is no
    /// rollback: a mid-cascade failure leaves a smaller, still-valid
    /// subtree (at-least-once semantics).
    pub async fn delete_subtree(
        &self,
        hierarchy: Hierarchy,
        node_id: Uuid,
    ) -> Result<u64, CatalogError> {
        let builder = TreeBuilder::new(self.store.clone());
        let Some(tree) = builder.build_subtree(hierarchy, node_id).await? else {
            return Err(CatalogError::CategoryNotFound(node_id));
        };

        let mut deleted = 0u64;
        for id in tree.post_order() {
            if let Some(record) = tree.node(id) {
                if tree.is_leaf(id) {
                    if let Some(url) = &record.image_url {
                        if let Err(err) = self.assets.delete_asset(url).await {
                            warn!(category = %id, error = %err, "asset removal failed; continuing");
                        }
                    }
                }
            }
            match self.store.delete_node(hierarchy, id).await {
                Ok(_) => deleted += 1,
                Err(err) => {
                    return Err(CatalogError::CascadeAborted {
                        category_id: id,
                        source: err.into(),
                    })
                }
            }
        }

        info!(root = %node_id, deleted, "subtree deleted");
        Ok(deleted)
    }

    /// Set `flag` on every direct and transitive descendant of `node_id`.
    ///
    /// The node's own flag is the caller's direct write; this only fans the
    /// value down. Idempotent per node, written as one batched update.
    pub async fn propagate_flag(
        &self,
        hierarchy: Hierarchy,
        node_id: Uuid,
        flag: CategoryFlag,
        value: bool,
    ) -> Result<u64, CatalogError> {
        let builder = TreeBuilder::new(self.store.clone());
        let Some(tree) = builder.build_subtree(hierarchy, node_id).await? else {
            return Err(CatalogError::CategoryNotFound(node_id));
        };

        let ids = tree.descendants(node_id);
        if ids.is_empty() {
            return Ok(0);
        }
        let touched = self.store.set_flag_many(hierarchy, &ids, flag, value).await?;
        info!(root = %node_id, touched, ?flag, value, "flag propagated");
        Ok(touched)
    }
}
