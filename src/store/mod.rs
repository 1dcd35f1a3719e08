//! Collaborator interfaces consumed by the engine, plus their backends.
//!
//! The engine only ever talks to these traits. `memory` backs the test suite
//! and offline runs; `postgres` (feature `database`) is the production
//! backend. All trait objects are `Send + Sync` so they can be shared behind
//! `Arc` across the server's handlers.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::hierarchy::CategoryTree;
use crate::models::{
    Category, CategoryFlag, Combo, FlattenedService, Hierarchy, NewCategoryFields, NewComboFields,
    ServiceLogEntry, ServiceStatus, UpdateCategoryFields, VersionedServices,
};

pub mod assets;
pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

pub use assets::LocalAssetStore;
pub use memory::{
    InMemoryAssetStore, InMemoryCategoryStore, InMemoryComboStore, InMemoryInventoryTreeSource,
    InMemorySelectionSource, InMemoryVendorServiceStore,
};
#[cfg(feature = "database")]
pub use postgres::{
    DatabaseConfig, PgCategoryStore, PgComboStore, PgSelectionSource, PgVendorServiceStore,
};

/// Flat node store for either hierarchy.
///
/// Children are always returned ordered (`sequence` ascending, creation time
/// descending on ties); [`CategoryStore::children_of_many`] groups one round
/// trip by parent id so callers never degrade into N+1 lookups.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn get_node(
        &self,
        hierarchy: Hierarchy,
        id: Uuid,
    ) -> Result<Option<Category>, CatalogError>;

    async fn get_nodes(
        &self,
        hierarchy: Hierarchy,
        ids: &[Uuid],
    ) -> Result<Vec<Category>, CatalogError>;

    async fn get_children(
        &self,
        hierarchy: Hierarchy,
        parent_id: Uuid,
    ) -> Result<Vec<Category>, CatalogError>;

    /// Children of many parents in one round trip, grouped by parent id.
    /// Parents with no children may be absent from the map.
    async fn children_of_many(
        &self,
        hierarchy: Hierarchy,
        parent_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Category>>, CatalogError>;

    async fn create_node(
        &self,
        hierarchy: Hierarchy,
        fields: NewCategoryFields,
    ) -> Result<Category, CatalogError>;

    async fn update_node(
        &self,
        hierarchy: Hierarchy,
        id: Uuid,
        fields: UpdateCategoryFields,
    ) -> Result<bool, CatalogError>;

    async fn delete_node(&self, hierarchy: Hierarchy, id: Uuid) -> Result<bool, CatalogError>;

    /// Bulk flag write; one round trip where the backend supports it.
    /// Returns the number of rows touched.
    async fn set_flag_many(
        &self,
        hierarchy: Hierarchy,
        ids: &[Uuid],
        flag: CategoryFlag,
        value: bool,
    ) -> Result<u64, CatalogError>;
}

/// Legacy per-category attribute selections for a vendor.
///
/// The payload shape is not fixed; the synchronizer normalizes whatever
/// comes back.
#[async_trait]
pub trait SelectionSource: Send + Sync {
    async fn get_selections(
        &self,
        vendor_id: Uuid,
        leaf_id: Uuid,
    ) -> Result<JsonValue, CatalogError>;
}

/// The vendor's canonical flattened service list.
#[async_trait]
pub trait VendorServiceStore: Send + Sync {
    /// Current list; a never-synced vendor yields version 0 and no services.
    async fn get(&self, vendor_id: Uuid) -> Result<VersionedServices, CatalogError>;

    /// Replace the vendor's entire list (delete-then-recreate).
    ///
    /// `expected_version` is the version observed before the run started; a
    /// moved version means a concurrent replace won and the call fails with
    /// [`CatalogError::VersionMismatch`]. Returns the new version.
    async fn replace_all(
        &self,
        vendor_id: Uuid,
        services: Vec<FlattenedService>,
        expected_version: u64,
    ) -> Result<u64, CatalogError>;

    /// Narrow in-place price update; appends a log entry.
    async fn update_price(
        &self,
        vendor_id: Uuid,
        service_id: Uuid,
        price: Decimal,
    ) -> Result<FlattenedService, CatalogError>;

    /// Narrow in-place status update; appends a log entry.
    async fn update_status(
        &self,
        vendor_id: Uuid,
        service_id: Uuid,
        status: ServiceStatus,
    ) -> Result<FlattenedService, CatalogError>;

    async fn append_log(
        &self,
        vendor_id: Uuid,
        service_id: Uuid,
        entry: ServiceLogEntry,
    ) -> Result<(), CatalogError>;
}

/// Binary asset removal. Strictly best-effort: the cascade operator logs and
/// continues on failure, so implementations should not retry aggressively.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn delete_asset(&self, url: &str) -> anyhow::Result<()>;
}

/// Draft-system view of a vendor's category tree, scoped by an inventory id.
/// `None` means the draft system does not know this scope and the caller
/// should rebuild from the node store instead.
#[async_trait]
pub trait InventoryTreeSource: Send + Sync {
    async fn vendor_tree(
        &self,
        vendor_id: Uuid,
        scope_id: Uuid,
    ) -> Result<Option<CategoryTree>, CatalogError>;
}

/// Combo persistence. Validation lives in [`crate::hierarchy::ComboService`];
/// the store itself is shape-only.
#[async_trait]
pub trait ComboStore: Send + Sync {
    async fn create(&self, fields: NewComboFields) -> Result<Combo, CatalogError>;

    async fn update(&self, combo_id: Uuid, fields: NewComboFields)
        -> Result<Combo, CatalogError>;

    async fn get(&self, combo_id: Uuid) -> Result<Option<Combo>, CatalogError>;

    async fn list_for_parent(
        &self,
        parent_category_id: Uuid,
    ) -> Result<Vec<Combo>, CatalogError>;

    async fn delete(&self, combo_id: Uuid) -> Result<bool, CatalogError>;
}
