//! Vendor flow synchronizer - the top-level reconciliation job.
//!
//! Takes a vendor's category tree (from the draft-system collaborator when a
//! scope is supplied, otherwise rebuilt from the node store), flattens it to
//! leaves, merges each leaf's legacy attribute selections, and replaces the
//! vendor's canonical flattened service list in one versioned write.

pub mod attributes;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CatalogError;
use crate::hierarchy::{collect_leaves, CategoryTree, LeafPath, TreeBuilder};
use crate::models::{
    FlattenedService, Hierarchy, ServiceLogEntry, ServiceStatus,
};
use crate::store::{CategoryStore, InventoryTreeSource, SelectionSource, VendorServiceStore};

/// Log action stamped on every service a sync run creates.
const SYNC_LOG_ACTION: &str = "Synced from old system";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound on concurrent selection fetches.
    pub fetch_concurrency: usize,
    /// Per-fetch deadline; a slower fetch degrades to empty attributes.
    pub fetch_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 8,
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

/// One synchronization request. `category_root` is the vendor's assigned
/// category; resolving it from a vendor profile is the caller's concern.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub vendor_id: Uuid,
    pub category_root: Uuid,
    /// Draft-system scope; when set, the inventory tree source is preferred
    /// over rebuilding from the node store.
    pub scope_id: Option<Uuid>,
    /// Without this, a vendor that already has a list keeps it untouched.
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// False when an existing list was returned instead of a new one.
    pub created: bool,
    pub count: usize,
    pub services: Vec<FlattenedService>,
}

pub struct VendorFlowSynchronizer {
    categories: Arc<dyn CategoryStore>,
    services: Arc<dyn VendorServiceStore>,
    selections: Arc<dyn SelectionSource>,
    inventory: Option<Arc<dyn InventoryTreeSource>>,
    config: SyncConfig,
}

impl VendorFlowSynchronizer {
    pub fn new(
        categories: Arc<dyn CategoryStore>,
        services: Arc<dyn VendorServiceStore>,
        selections: Arc<dyn SelectionSource>,
    ) -> Self {
        Self {
            categories,
            services,
            selections,
            inventory: None,
            config: SyncConfig::default(),
        }
    }

    pub fn with_inventory_source(mut self, source: Arc<dyn InventoryTreeSource>) -> Self {
        self.inventory = Some(source);
        self
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one synchronization.
    ///
    /// Idempotent without `force`: an already-synced vendor gets its existing
    /// list back with `created = false` and nothing is written. The final
    /// replace is guarded by the version observed here, so two concurrent
    /// forced runs cannot double-write - the loser surfaces
    /// [`CatalogError::VersionMismatch`].
    pub async fn sync(&self, request: &SyncRequest) -> Result<SyncReport, CatalogError> {
        let existing = self.services.get(request.vendor_id).await?;
        if !existing.services.is_empty() && !request.force {
            info!(
                vendor = %request.vendor_id,
                count = existing.services.len(),
                "already synced; returning existing list"
            );
            return Ok(SyncReport {
                created: false,
                count: existing.services.len(),
                services: existing.services,
            });
        }
        let expected_version = existing.version;

        let Some(tree) = self.effective_tree(request).await? else {
            return Err(CatalogError::CategoryNotFound(request.category_root));
        };
        let leaves = collect_leaves(&tree);
        debug!(
            vendor = %request.vendor_id,
            leaves = leaves.len(),
            "tree flattened"
        );

        let cache = self
            .fetch_selection_maps(request.vendor_id, &leaves)
            .await;

        let now = Utc::now();
        let services: Vec<FlattenedService> = leaves
            .iter()
            .map(|leaf| {
                let attributes = cache
                    .get(&leaf.category.category_id)
                    .cloned()
                    .unwrap_or_default();
                FlattenedService {
                    service_id: Uuid::new_v4(),
                    vendor_id: request.vendor_id,
                    category_path: leaf.levels.clone(),
                    category_ids: leaf.ids.clone(),
                    price: leaf.category.price.unwrap_or(Decimal::ZERO),
                    terms: leaf
                        .category
                        .terms
                        .as_deref()
                        .map(attributes::split_terms)
                        .unwrap_or_default(),
                    status: ServiceStatus::Inactive,
                    attributes,
                    logs: vec![ServiceLogEntry {
                        action: SYNC_LOG_ACTION.to_string(),
                        details: None,
                        timestamp: now,
                    }],
                }
            })
            .collect();

        let count = services.len();
        let version = self
            .services
            .replace_all(request.vendor_id, services.clone(), expected_version)
            .await?;
        info!(
            vendor = %request.vendor_id,
            count,
            version,
            "vendor service list replaced"
        );
        Ok(SyncReport {
            created: true,
            count,
            services,
        })
    }

    async fn effective_tree(
        &self,
        request: &SyncRequest,
    ) -> Result<Option<CategoryTree>, CatalogError> {
        if let (Some(source), Some(scope_id)) = (&self.inventory, request.scope_id) {
            if let Some(tree) = source.vendor_tree(request.vendor_id, scope_id).await? {
                return Ok(Some(tree));
            }
            debug!(
                vendor = %request.vendor_id,
                scope = %scope_id,
                "inventory source had no tree for this scope; rebuilding from node store"
            );
        }
        TreeBuilder::new(self.categories.clone())
            .build_subtree(Hierarchy::Live, request.category_root)
            .await
    }

    /// Fetch selections once per unique leaf id, concurrently but bounded.
    ///
    /// Results are keyed by leaf id, so repeated category ids across branches
    /// cost one fetch and completion order never affects the output. A
    /// failed or timed-out fetch resolves - and is cached - as an empty map,
    /// so one bad leaf cannot abort the run or trigger a retry storm.
    async fn fetch_selection_maps(
        &self,
        vendor_id: Uuid,
        leaves: &[LeafPath],
    ) -> HashMap<Uuid, BTreeMap<String, String>> {
        let mut unique: Vec<Uuid> = Vec::new();
        let mut seen: HashSet<Uuid> = HashSet::new();
        for leaf in leaves {
            if seen.insert(leaf.category.category_id) {
                unique.push(leaf.category.category_id);
            }
        }

        let timeout = self.config.fetch_timeout;
        let fetches = unique.into_iter().map(|leaf_id| {
            let selections = self.selections.clone();
            async move {
                let attributes = match tokio::time::timeout(
                    timeout,
                    selections.get_selections(vendor_id, leaf_id),
                )
                .await
                {
                    Ok(Ok(payload)) => attributes::normalize_selections(&payload),
                    Ok(Err(err)) => {
                        warn!(
                            leaf = %leaf_id,
                            error = %err,
                            "selection fetch failed; using empty attributes"
                        );
                        BTreeMap::new()
                    }
                    Err(_) => {
                        warn!(leaf = %leaf_id, "selection fetch timed out; using empty attributes");
                        BTreeMap::new()
                    }
                };
                (leaf_id, attributes)
            }
        });

        futures::stream::iter(fetches)
            .buffer_unordered(self.config.fetch_concurrency.max(1))
            .collect()
            .await
    }
}
