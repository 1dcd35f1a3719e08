//! In-memory backends: the unit/integration-test substrate and a useful
//! stand-in for offline runs. All state lives in `tokio::sync::RwLock`'d
//! maps keyed the same way the Postgres tables are.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::hierarchy::CategoryTree;
use crate::models::{
    sibling_order, Category, CategoryFlag, Combo, FlattenedService, Hierarchy, NewCategoryFields,
    NewComboFields, ServiceLogEntry, ServiceStatus, UpdateCategoryFields, VersionedServices,
};

use super::{
    AssetStore, CategoryStore, ComboStore, InventoryTreeSource, SelectionSource,
    VendorServiceStore,
};

// ============================================================================
// Categories
// ============================================================================

#[derive(Default)]
pub struct InMemoryCategoryStore {
    maps: RwLock<HashMap<Hierarchy, HashMap<Uuid, Category>>>,
}

impl InMemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategoryStore for InMemoryCategoryStore {
    async fn get_node(
        &self,
        hierarchy: Hierarchy,
        id: Uuid,
    ) -> Result<Option<Category>, CatalogError> {
        Ok(self
            .maps
            .read()
            .await
            .get(&hierarchy)
            .and_then(|m| m.get(&id))
            .cloned())
    }

    async fn get_nodes(
        &self,
        hierarchy: Hierarchy,
        ids: &[Uuid],
    ) -> Result<Vec<Category>, CatalogError> {
        let maps = self.maps.read().await;
        let map = maps.get(&hierarchy);
        Ok(ids
            .iter()
            .filter_map(|id| map.and_then(|m| m.get(id)).cloned())
            .collect())
    }

    async fn get_children(
        &self,
        hierarchy: Hierarchy,
        parent_id: Uuid,
    ) -> Result<Vec<Category>, CatalogError> {
        let maps = self.maps.read().await;
        let mut children: Vec<Category> = maps
            .get(&hierarchy)
            .map(|m| {
                m.values()
                    .filter(|c| c.parent_id == Some(parent_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        children.sort_by(sibling_order);
        Ok(children)
    }

    async fn children_of_many(
        &self,
        hierarchy: Hierarchy,
        parent_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Category>>, CatalogError> {
        let wanted: std::collections::HashSet<Uuid> = parent_ids.iter().copied().collect();
        let maps = self.maps.read().await;
        let mut grouped: HashMap<Uuid, Vec<Category>> = HashMap::new();
        if let Some(map) = maps.get(&hierarchy) {
            for category in map.values() {
                if let Some(parent) = category.parent_id {
                    if wanted.contains(&parent) {
                        grouped.entry(parent).or_default().push(category.clone());
                    }
                }
            }
        }
        for children in grouped.values_mut() {
            children.sort_by(sibling_order);
        }
        Ok(grouped)
    }

    async fn create_node(
        &self,
        hierarchy: Hierarchy,
        fields: NewCategoryFields,
    ) -> Result<Category, CatalogError> {
        let now = Utc::now();
        let category = Category {
            category_id: Uuid::new_v4(),
            name: fields.name,
            parent_id: fields.parent_id,
            sequence: fields.sequence,
            price: fields.price,
            terms: fields.terms,
            image_url: fields.image_url,
            free_text_enabled: fields.free_text_enabled,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.maps
            .write()
            .await
            .entry(hierarchy)
            .or_default()
            .insert(category.category_id, category.clone());
        Ok(category)
    }

    async fn update_node(
        &self,
        hierarchy: Hierarchy,
        id: Uuid,
        fields: UpdateCategoryFields,
    ) -> Result<bool, CatalogError> {
        let mut maps = self.maps.write().await;
        let Some(category) = maps.get_mut(&hierarchy).and_then(|m| m.get_mut(&id)) else {
            return Ok(false);
        };
        if let Some(name) = fields.name {
            category.name = name;
        }
        if let Some(sequence) = fields.sequence {
            category.sequence = sequence;
        }
        if let Some(price) = fields.price {
            category.price = Some(price);
        }
        if let Some(terms) = fields.terms {
            category.terms = Some(terms);
        }
        if let Some(image_url) = fields.image_url {
            category.image_url = Some(image_url);
        }
        if let Some(free_text) = fields.free_text_enabled {
            category.free_text_enabled = free_text;
        }
        if let Some(active) = fields.is_active {
            category.is_active = active;
        }
        category.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete_node(&self, hierarchy: Hierarchy, id: Uuid) -> Result<bool, CatalogError> {
        Ok(self
            .maps
            .write()
            .await
            .get_mut(&hierarchy)
            .and_then(|m| m.remove(&id))
            .is_some())
    }

    async fn set_flag_many(
        &self,
        hierarchy: Hierarchy,
        ids: &[Uuid],
        flag: CategoryFlag,
        value: bool,
    ) -> Result<u64, CatalogError> {
        let mut maps = self.maps.write().await;
        let Some(map) = maps.get_mut(&hierarchy) else {
            return Ok(0);
        };
        let mut touched = 0;
        for id in ids {
            if let Some(category) = map.get_mut(id) {
                category.set_flag(flag, value);
                category.updated_at = Utc::now();
                touched += 1;
            }
        }
        Ok(touched)
    }
}

// ============================================================================
// Selections
// ============================================================================

/// Scriptable selection source: responses and failures per (vendor, leaf),
/// with per-key call counts so tests can assert the fetch cache.
#[derive(Default)]
pub struct InMemorySelectionSource {
    responses: RwLock<HashMap<(Uuid, Uuid), JsonValue>>,
    failures: RwLock<std::collections::HashSet<(Uuid, Uuid)>>,
    calls: RwLock<HashMap<(Uuid, Uuid), usize>>,
}

impl InMemorySelectionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_response(&self, vendor_id: Uuid, leaf_id: Uuid, payload: JsonValue) {
        self.responses
            .write()
            .await
            .insert((vendor_id, leaf_id), payload);
    }

    pub async fn fail_for(&self, vendor_id: Uuid, leaf_id: Uuid) {
        self.failures.write().await.insert((vendor_id, leaf_id));
    }

    pub async fn call_count(&self, vendor_id: Uuid, leaf_id: Uuid) -> usize {
        self.calls
            .read()
            .await
            .get(&(vendor_id, leaf_id))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl SelectionSource for InMemorySelectionSource {
    async fn get_selections(
        &self,
        vendor_id: Uuid,
        leaf_id: Uuid,
    ) -> Result<JsonValue, CatalogError> {
        *self
            .calls
            .write()
            .await
            .entry((vendor_id, leaf_id))
            .or_insert(0) += 1;
        if self.failures.read().await.contains(&(vendor_id, leaf_id)) {
            return Err(CatalogError::Storage(anyhow::anyhow!(
                "selection source unavailable"
            )));
        }
        Ok(self
            .responses
            .read()
            .await
            .get(&(vendor_id, leaf_id))
            .cloned()
            .unwrap_or(JsonValue::Null))
    }
}

// ============================================================================
// Vendor services
// ============================================================================

#[derive(Default)]
pub struct InMemoryVendorServiceStore {
    lists: RwLock<HashMap<Uuid, VersionedServices>>,
}

impl InMemoryVendorServiceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VendorServiceStore for InMemoryVendorServiceStore {
    async fn get(&self, vendor_id: Uuid) -> Result<VersionedServices, CatalogError> {
        Ok(self
            .lists
            .read()
            .await
            .get(&vendor_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_all(
        &self,
        vendor_id: Uuid,
        services: Vec<FlattenedService>,
        expected_version: u64,
    ) -> Result<u64, CatalogError> {
        let mut lists = self.lists.write().await;
        let entry = lists.entry(vendor_id).or_default();
        if entry.version != expected_version {
            return Err(CatalogError::VersionMismatch {
                vendor_id,
                expected: expected_version,
                found: entry.version,
            });
        }
        entry.version += 1;
        entry.services = services;
        Ok(entry.version)
    }

    async fn update_price(
        &self,
        vendor_id: Uuid,
        service_id: Uuid,
        price: Decimal,
    ) -> Result<FlattenedService, CatalogError> {
        let mut lists = self.lists.write().await;
        let service = find_service(&mut lists, vendor_id, service_id)?;
        let old = service.price;
        service.price = price;
        service.logs.push(ServiceLogEntry::with_details(
            "Price updated",
            format!("{old} -> {price}"),
        ));
        Ok(service.clone())
    }

    async fn update_status(
        &self,
        vendor_id: Uuid,
        service_id: Uuid,
        status: ServiceStatus,
    ) -> Result<FlattenedService, CatalogError> {
        let mut lists = self.lists.write().await;
        let service = find_service(&mut lists, vendor_id, service_id)?;
        service.status = status;
        service.logs.push(ServiceLogEntry::with_details(
            "Status updated",
            status.as_str(),
        ));
        Ok(service.clone())
    }

    async fn append_log(
        &self,
        vendor_id: Uuid,
        service_id: Uuid,
        entry: ServiceLogEntry,
    ) -> Result<(), CatalogError> {
        let mut lists = self.lists.write().await;
        let service = find_service(&mut lists, vendor_id, service_id)?;
        service.logs.push(entry);
        Ok(())
    }
}

fn find_service<'a>(
    lists: &'a mut HashMap<Uuid, VersionedServices>,
    vendor_id: Uuid,
    service_id: Uuid,
) -> Result<&'a mut FlattenedService, CatalogError> {
    let list = lists
        .get_mut(&vendor_id)
        .ok_or(CatalogError::VendorNotSynced(vendor_id))?;
    list.services
        .iter_mut()
        .find(|s| s.service_id == service_id)
        .ok_or(CatalogError::ServiceNotFound {
            vendor_id,
            service_id,
        })
}

// ============================================================================
// Assets
// ============================================================================

/// Records deletions; can be told to fail for specific urls.
#[derive(Default)]
pub struct InMemoryAssetStore {
    deleted: RwLock<Vec<String>>,
    failures: RwLock<std::collections::HashSet<String>>,
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_for(&self, url: &str) {
        self.failures.write().await.insert(url.to_string());
    }

    pub async fn deleted(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn delete_asset(&self, url: &str) -> anyhow::Result<()> {
        if self.failures.read().await.contains(url) {
            anyhow::bail!("asset backend rejected {url}");
        }
        self.deleted.write().await.push(url.to_string());
        Ok(())
    }
}

// ============================================================================
// Inventory trees
// ============================================================================

/// Pre-seeded vendor-scoped trees keyed by (vendor, scope).
#[derive(Default)]
pub struct InMemoryInventoryTreeSource {
    trees: RwLock<HashMap<(Uuid, Uuid), CategoryTree>>,
}

impl InMemoryInventoryTreeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_tree(&self, vendor_id: Uuid, scope_id: Uuid, tree: CategoryTree) {
        self.trees.write().await.insert((vendor_id, scope_id), tree);
    }
}

#[async_trait]
impl InventoryTreeSource for InMemoryInventoryTreeSource {
    async fn vendor_tree(
        &self,
        vendor_id: Uuid,
        scope_id: Uuid,
    ) -> Result<Option<CategoryTree>, CatalogError> {
        Ok(self
            .trees
            .read()
            .await
            .get(&(vendor_id, scope_id))
            .cloned())
    }
}

// ============================================================================
// Combos
// ============================================================================

#[derive(Default)]
pub struct InMemoryComboStore {
    combos: RwLock<HashMap<Uuid, Combo>>,
}

impl InMemoryComboStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComboStore for InMemoryComboStore {
    async fn create(&self, fields: NewComboFields) -> Result<Combo, CatalogError> {
        let now = Utc::now();
        let combo = Combo {
            combo_id: Uuid::new_v4(),
            parent_category_id: fields.parent_category_id,
            name: fields.name,
            items: fields.items,
            sizes: fields.sizes,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.combos
            .write()
            .await
            .insert(combo.combo_id, combo.clone());
        Ok(combo)
    }

    async fn update(
        &self,
        combo_id: Uuid,
        fields: NewComboFields,
    ) -> Result<Combo, CatalogError> {
        let mut combos = self.combos.write().await;
        let combo = combos
            .get_mut(&combo_id)
            .ok_or(CatalogError::ComboNotFound(combo_id))?;
        combo.parent_category_id = fields.parent_category_id;
        combo.name = fields.name;
        combo.items = fields.items;
        combo.sizes = fields.sizes;
        combo.updated_at = Utc::now();
        Ok(combo.clone())
    }

    async fn get(&self, combo_id: Uuid) -> Result<Option<Combo>, CatalogError> {
        Ok(self.combos.read().await.get(&combo_id).cloned())
    }

    async fn list_for_parent(
        &self,
        parent_category_id: Uuid,
    ) -> Result<Vec<Combo>, CatalogError> {
        let mut combos: Vec<Combo> = self
            .combos
            .read()
            .await
            .values()
            .filter(|c| c.parent_category_id == parent_category_id)
            .cloned()
            .collect();
        combos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(combos)
    }

    async fn delete(&self, combo_id: Uuid) -> Result<bool, CatalogError> {
        Ok(self.combos.write().await.remove(&combo_id).is_some())
    }
}
