//! End-to-end reconciliation flow over the in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use vendor_catalog::error::CatalogError;
use vendor_catalog::models::{Hierarchy, NewCategoryFields, ServiceStatus};
use vendor_catalog::store::{
    CategoryStore, InMemoryCategoryStore, InMemoryInventoryTreeSource, InMemorySelectionSource,
    InMemoryVendorServiceStore, VendorServiceStore,
};
use vendor_catalog::sync::{SyncConfig, SyncRequest, VendorFlowSynchronizer};
use vendor_catalog::{CategoryTree, TreeBuilder};

// =========================================================================
// TEST INFRASTRUCTURE
// =========================================================================

struct TestRig {
    categories: Arc<InMemoryCategoryStore>,
    services: Arc<InMemoryVendorServiceStore>,
    selections: Arc<InMemorySelectionSource>,
    vendor_id: Uuid,
}

impl TestRig {
    fn new() -> Self {
        Self {
            categories: Arc::new(InMemoryCategoryStore::new()),
            services: Arc::new(InMemoryVendorServiceStore::new()),
            selections: Arc::new(InMemorySelectionSource::new()),
            vendor_id: Uuid::new_v4(),
        }
    }

    fn synchronizer(&self) -> VendorFlowSynchronizer {
        VendorFlowSynchronizer::new(
            self.categories.clone(),
            self.services.clone(),
            self.selections.clone(),
        )
    }

    async fn create(&self, name: &str, parent: Option<Uuid>) -> Uuid {
        self.create_with(name, parent, None, None).await
    }

    async fn create_with(
        &self,
        name: &str,
        parent: Option<Uuid>,
        price: Option<Decimal>,
        terms: Option<&str>,
    ) -> Uuid {
        self.categories
            .create_node(
                Hierarchy::Live,
                NewCategoryFields {
                    name: name.to_string(),
                    parent_id: parent,
                    price,
                    terms: terms.map(str::to_string),
                    ..NewCategoryFields::default()
                },
            )
            .await
            .expect("create category")
            .category_id
    }

    fn request(&self, root: Uuid, force: bool) -> SyncRequest {
        SyncRequest {
            vendor_id: self.vendor_id,
            category_root: root,
            scope_id: None,
            force,
        }
    }
}

// =========================================================================
// SYNC SHAPE
// =========================================================================

#[tokio::test]
async fn single_chain_produces_one_inactive_service() {
    let rig = TestRig::new();
    let root = rig.create("Root", None).await;
    let x = rig.create("X", Some(root)).await;
    let y = rig
        .create_with("Y", Some(x), Some(Decimal::new(4999, 2)), Some("prepaid, weekdays only"))
        .await;

    let report = rig
        .synchronizer()
        .sync(&rig.request(root, false))
        .await
        .expect("sync");

    assert!(report.created);
    assert_eq!(report.count, 1);
    let service = &report.services[0];
    assert_eq!(service.category_path, vec!["Root", "X", "Y"]);
    assert_eq!(service.category_ids, vec![root, x, y]);
    assert_eq!(service.status, ServiceStatus::Inactive);
    assert_eq!(service.price, Decimal::new(4999, 2));
    assert_eq!(service.terms, vec!["prepaid", "weekdays only"]);
    assert_eq!(service.logs.len(), 1);
    assert_eq!(service.logs[0].action, "Synced from old system");
}

#[tokio::test]
async fn missing_price_defaults_to_zero() {
    let rig = TestRig::new();
    let root = rig.create("Root", None).await;
    rig.create("Leaf", Some(root)).await;

    let report = rig
        .synchronizer()
        .sync(&rig.request(root, false))
        .await
        .expect("sync");
    assert_eq!(report.services[0].price, Decimal::ZERO);
}

#[tokio::test]
async fn attributes_are_normalized_per_leaf() {
    let rig = TestRig::new();
    let root = rig.create("Root", None).await;
    let left = rig.create("Left", Some(root)).await;
    let right = rig.create("Right", Some(root)).await;

    rig.selections
        .set_response(
            rig.vendor_id,
            left,
            json!({"items": [{"key": "fabric", "value": "cotton"}]}),
        )
        .await;
    rig.selections
        .set_response(
            rig.vendor_id,
            right,
            json!({"selections": {"delivery": {"window": "morning"}}}),
        )
        .await;

    let report = rig
        .synchronizer()
        .sync(&rig.request(root, false))
        .await
        .expect("sync");
    assert_eq!(report.count, 2);

    let by_leaf = |id: Uuid| {
        report
            .services
            .iter()
            .find(|s| s.leaf_id() == Some(id))
            .expect("leaf service")
    };
    assert_eq!(
        by_leaf(left).attributes.get("fabric").map(String::as_str),
        Some("cotton")
    );
    assert_eq!(
        by_leaf(right)
            .attributes
            .get("delivery.window")
            .map(String::as_str),
        Some("morning")
    );
}

#[tokio::test]
async fn missing_root_is_not_found() {
    let rig = TestRig::new();
    let err = rig
        .synchronizer()
        .sync(&rig.request(Uuid::new_v4(), false))
        .await
        .expect_err("no root");
    assert!(matches!(err, CatalogError::CategoryNotFound(_)));
}

// =========================================================================
// IDEMPOTENCE AND FORCE
// =========================================================================

#[tokio::test]
async fn resync_without_force_returns_existing_list() {
    let rig = TestRig::new();
    let root = rig.create("Root", None).await;
    let leaf = rig.create("Leaf", Some(root)).await;

    let first = rig
        .synchronizer()
        .sync(&rig.request(root, false))
        .await
        .expect("first sync");
    assert!(first.created);

    let second = rig
        .synchronizer()
        .sync(&rig.request(root, false))
        .await
        .expect("second sync");
    assert!(!second.created);
    assert_eq!(second.count, first.count);
    let paths =
        |r: &vendor_catalog::SyncReport| -> Vec<Vec<String>> {
            r.services.iter().map(|s| s.category_path.clone()).collect()
        };
    assert_eq!(paths(&second), paths(&first));
    // Same service ids too: the list was surfaced, not rebuilt.
    assert_eq!(second.services[0].service_id, first.services[0].service_id);
    // And the selection source was not consulted again.
    assert_eq!(rig.selections.call_count(rig.vendor_id, leaf).await, 1);
}

#[tokio::test]
async fn forced_resync_rebuilds_and_bumps_version() {
    let rig = TestRig::new();
    let root = rig.create("Root", None).await;
    rig.create("Leaf", Some(root)).await;

    rig.synchronizer()
        .sync(&rig.request(root, false))
        .await
        .expect("first sync");
    assert_eq!(rig.services.get(rig.vendor_id).await.unwrap().version, 1);

    // The tree grows between runs; a forced resync must not leave stale rows.
    rig.create("Newcomer", Some(root)).await;
    let report = rig
        .synchronizer()
        .sync(&rig.request(root, true))
        .await
        .expect("forced sync");
    assert!(report.created);
    assert_eq!(report.count, 2);

    let stored = rig.services.get(rig.vendor_id).await.unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.services.len(), 2);
}

#[tokio::test]
async fn stale_version_replace_is_rejected() {
    let rig = TestRig::new();
    let root = rig.create("Root", None).await;
    rig.create("Leaf", Some(root)).await;

    let report = rig
        .synchronizer()
        .sync(&rig.request(root, false))
        .await
        .expect("sync");

    // A replace carrying the pre-sync version is a lost race.
    let err = rig
        .services
        .replace_all(rig.vendor_id, report.services, 0)
        .await
        .expect_err("stale version");
    assert!(matches!(
        err,
        CatalogError::VersionMismatch {
            expected: 0,
            found: 1,
            ..
        }
    ));
}

// =========================================================================
// FETCH CACHE AND DEGRADATION
// =========================================================================

#[tokio::test]
async fn each_leaf_is_fetched_exactly_once_per_run() {
    let rig = TestRig::new();
    let root = rig.create("Root", None).await;
    let mut leaves = Vec::new();
    for name in ["A", "B", "C"] {
        let parent = rig.create(name, Some(root)).await;
        leaves.push(rig.create(&format!("{name}-leaf"), Some(parent)).await);
    }

    rig.synchronizer()
        .sync(&rig.request(root, false))
        .await
        .expect("sync");
    for leaf in &leaves {
        assert_eq!(rig.selections.call_count(rig.vendor_id, *leaf).await, 1);
    }

    // A second forced run gets a fresh per-run cache, nothing more.
    rig.synchronizer()
        .sync(&rig.request(root, true))
        .await
        .expect("forced sync");
    for leaf in &leaves {
        assert_eq!(rig.selections.call_count(rig.vendor_id, *leaf).await, 2);
    }
}

#[tokio::test]
async fn failed_fetch_degrades_to_empty_attributes() {
    let rig = TestRig::new();
    let root = rig.create("Root", None).await;
    let good = rig.create("Good", Some(root)).await;
    let bad = rig.create("Bad", Some(root)).await;

    rig.selections
        .set_response(
            rig.vendor_id,
            good,
            json!({"items": [{"key": "kept", "value": "yes"}]}),
        )
        .await;
    rig.selections.fail_for(rig.vendor_id, bad).await;

    let report = rig
        .synchronizer()
        .sync(&rig.request(root, false))
        .await
        .expect("sync survives one bad leaf");
    assert_eq!(report.count, 2);

    let by_leaf = |id: Uuid| {
        report
            .services
            .iter()
            .find(|s| s.leaf_id() == Some(id))
            .expect("leaf service")
    };
    assert!(!by_leaf(good).attributes.is_empty());
    assert!(by_leaf(bad).attributes.is_empty());
}

#[tokio::test]
async fn fetch_order_does_not_change_the_list() {
    let rig = TestRig::new();
    let root = rig.create("Root", None).await;
    for i in 0..12 {
        let leaf = rig.create(&format!("Leaf-{i}"), Some(root)).await;
        rig.selections
            .set_response(
                rig.vendor_id,
                leaf,
                json!({"items": [{"key": "slot", "value": i}]}),
            )
            .await;
    }

    let sequential = rig
        .synchronizer()
        .with_config(SyncConfig {
            fetch_concurrency: 1,
            fetch_timeout: Duration::from_secs(5),
        })
        .sync(&rig.request(root, false))
        .await
        .expect("sequential sync");

    let concurrent = rig
        .synchronizer()
        .with_config(SyncConfig {
            fetch_concurrency: 16,
            fetch_timeout: Duration::from_secs(5),
        })
        .sync(&rig.request(root, true))
        .await
        .expect("concurrent sync");

    let shape = |r: &vendor_catalog::SyncReport| {
        r.services
            .iter()
            .map(|s| (s.category_ids.clone(), s.attributes.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&sequential), shape(&concurrent));
}

// =========================================================================
// TREE SOURCE SELECTION
// =========================================================================

#[tokio::test]
async fn inventory_tree_is_preferred_when_scoped() {
    let rig = TestRig::new();
    let root = rig.create("Root", None).await;
    rig.create("StoreLeaf", Some(root)).await;

    // The draft system serves a different shape for this vendor+scope.
    let draft_root = rig.create("DraftRoot", None).await;
    let draft_leaf = rig.create("DraftLeaf", Some(draft_root)).await;
    let builder = TreeBuilder::new(rig.categories.clone());
    let draft_tree: CategoryTree = builder
        .build_subtree(Hierarchy::Live, draft_root)
        .await
        .expect("build")
        .expect("exists");

    let inventory = Arc::new(InMemoryInventoryTreeSource::new());
    let scope = Uuid::new_v4();
    inventory
        .set_tree(rig.vendor_id, scope, draft_tree)
        .await;

    let synchronizer = rig.synchronizer().with_inventory_source(inventory.clone());

    let mut request = rig.request(root, false);
    request.scope_id = Some(scope);
    let report = synchronizer.sync(&request).await.expect("scoped sync");
    assert_eq!(report.count, 1);
    assert_eq!(report.services[0].category_path, vec!["DraftRoot", "DraftLeaf"]);
    assert_eq!(report.services[0].leaf_id(), Some(draft_leaf));

    // An unknown scope falls back to the node store.
    let mut fallback = rig.request(root, true);
    fallback.scope_id = Some(Uuid::new_v4());
    let report = synchronizer.sync(&fallback).await.expect("fallback sync");
    assert_eq!(report.services[0].category_path, vec!["Root", "StoreLeaf"]);
}

// =========================================================================
// POST-SYNC UPDATES
// =========================================================================

#[tokio::test]
async fn price_and_status_updates_append_logs() {
    let rig = TestRig::new();
    let root = rig.create("Root", None).await;
    rig.create("Leaf", Some(root)).await;

    let report = rig
        .synchronizer()
        .sync(&rig.request(root, false))
        .await
        .expect("sync");
    let service_id = report.services[0].service_id;

    let updated = rig
        .services
        .update_price(rig.vendor_id, service_id, Decimal::new(1500, 2))
        .await
        .expect("price update");
    assert_eq!(updated.price, Decimal::new(1500, 2));
    assert_eq!(updated.logs.len(), 2);
    assert_eq!(updated.logs[1].action, "Price updated");

    let updated = rig
        .services
        .update_status(rig.vendor_id, service_id, ServiceStatus::Active)
        .await
        .expect("status update");
    assert_eq!(updated.status, ServiceStatus::Active);
    assert_eq!(updated.logs.len(), 3);
    assert_eq!(updated.logs[2].action, "Status updated");

    let err = rig
        .services
        .update_price(rig.vendor_id, Uuid::new_v4(), Decimal::ONE)
        .await
        .expect_err("unknown service");
    assert!(matches!(err, CatalogError::ServiceNotFound { .. }));
}
