//! Postgres backends (feature `database`).
//!
//! Runtime-checked queries over a shared `PgPool`. The live and draft
//! hierarchies are two tables of identical shape; every category query is
//! routed by the `Hierarchy` selector.
//!
//! Expected schema:
//! - `categories` / `draft_categories`: one row per node, self-referential
//!   `parent_id`.
//! - `vendor_service_lists(vendor_id, version)`: the optimistic-replacement
//!   token per vendor.
//! - `vendor_services`: one row per flattened service, `position` preserving
//!   traversal order, `attributes`/`logs` as jsonb.
//! - `vendor_selected_attributes(vendor_id, category_id, payload)`: legacy
//!   per-category selections consumed by the synchronizer.
//! - `combos`: `items`/`sizes` as jsonb.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::models::{
    Category, CategoryFlag, Combo, ComboItem, ComboSize, FlattenedService, Hierarchy,
    NewCategoryFields, NewComboFields, ServiceLogEntry, ServiceStatus, UpdateCategoryFields,
    VersionedServices,
};

use super::{CategoryStore, ComboStore, SelectionSource, VendorServiceStore};

/// Connection settings, environment-driven by default.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost:5432/vendor-catalog".to_string()),
            max_connections: std::env::var("DATABASE_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            connection_timeout: Duration::from_secs(30),
        }
    }
}

impl DatabaseConfig {
    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connection_timeout)
            .connect(&self.database_url)
            .await
            .context("Failed to connect to database")?;
        info!(max_connections = self.max_connections, "database pool ready");
        Ok(pool)
    }
}

fn table(hierarchy: Hierarchy) -> &'static str {
    match hierarchy {
        Hierarchy::Live => "categories",
        Hierarchy::Draft => "draft_categories",
    }
}

const CATEGORY_COLUMNS: &str = "category_id, name, parent_id, sequence, price, terms, \
     image_url, free_text_enabled, is_active, created_at, updated_at";

// ============================================================================
// Categories
// ============================================================================

#[derive(Clone)]
pub struct PgCategoryStore {
    pool: PgPool,
}

impl PgCategoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CategoryStore for PgCategoryStore {
    async fn get_node(
        &self,
        hierarchy: Hierarchy,
        id: Uuid,
    ) -> Result<Option<Category>, CatalogError> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM {} WHERE category_id = $1",
            table(hierarchy)
        );
        let node = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch category")?;
        Ok(node)
    }

    async fn get_nodes(
        &self,
        hierarchy: Hierarchy,
        ids: &[Uuid],
    ) -> Result<Vec<Category>, CatalogError> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM {} WHERE category_id = ANY($1)",
            table(hierarchy)
        );
        let nodes = sqlx::query_as::<_, Category>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch categories")?;
        Ok(nodes)
    }

    async fn get_children(
        &self,
        hierarchy: Hierarchy,
        parent_id: Uuid,
    ) -> Result<Vec<Category>, CatalogError> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM {} WHERE parent_id = $1 \
             ORDER BY sequence ASC, created_at DESC",
            table(hierarchy)
        );
        let children = sqlx::query_as::<_, Category>(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch children")?;
        Ok(children)
    }

    async fn children_of_many(
        &self,
        hierarchy: Hierarchy,
        parent_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Category>>, CatalogError> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM {} WHERE parent_id = ANY($1) \
             ORDER BY parent_id, sequence ASC, created_at DESC",
            table(hierarchy)
        );
        let rows = sqlx::query_as::<_, Category>(&sql)
            .bind(parent_ids)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch children of many parents")?;

        let mut grouped: HashMap<Uuid, Vec<Category>> = HashMap::new();
        for row in rows {
            if let Some(parent) = row.parent_id {
                grouped.entry(parent).or_default().push(row);
            }
        }
        Ok(grouped)
    }

    async fn create_node(
        &self,
        hierarchy: Hierarchy,
        fields: NewCategoryFields,
    ) -> Result<Category, CatalogError> {
        let sql = format!(
            "INSERT INTO {} \
             (category_id, name, parent_id, sequence, price, terms, image_url, \
              free_text_enabled, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, NOW(), NOW()) \
             RETURNING {CATEGORY_COLUMNS}",
            table(hierarchy)
        );
        let node = sqlx::query_as::<_, Category>(&sql)
            .bind(Uuid::new_v4())
            .bind(&fields.name)
            .bind(fields.parent_id)
            .bind(fields.sequence)
            .bind(fields.price)
            .bind(&fields.terms)
            .bind(&fields.image_url)
            .bind(fields.free_text_enabled)
            .fetch_one(&self.pool)
            .await
            .context("Failed to create category")?;
        info!(category = %node.category_id, name = %node.name, "category created");
        Ok(node)
    }

    async fn update_node(
        &self,
        hierarchy: Hierarchy,
        id: Uuid,
        fields: UpdateCategoryFields,
    ) -> Result<bool, CatalogError> {
        let sql = format!(
            "UPDATE {} SET \
             name = COALESCE($2, name), \
             sequence = COALESCE($3, sequence), \
             price = COALESCE($4, price), \
             terms = COALESCE($5, terms), \
             image_url = COALESCE($6, image_url), \
             free_text_enabled = COALESCE($7, free_text_enabled), \
             is_active = COALESCE($8, is_active), \
             updated_at = NOW() \
             WHERE category_id = $1",
            table(hierarchy)
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(&fields.name)
            .bind(fields.sequence)
            .bind(fields.price)
            .bind(&fields.terms)
            .bind(&fields.image_url)
            .bind(fields.free_text_enabled)
            .bind(fields.is_active)
            .execute(&self.pool)
            .await
            .context("Failed to update category")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_node(&self, hierarchy: Hierarchy, id: Uuid) -> Result<bool, CatalogError> {
        let sql = format!("DELETE FROM {} WHERE category_id = $1", table(hierarchy));
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete category")?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_flag_many(
        &self,
        hierarchy: Hierarchy,
        ids: &[Uuid],
        flag: CategoryFlag,
        value: bool,
    ) -> Result<u64, CatalogError> {
        let sql = format!(
            "UPDATE {} SET {} = $1, updated_at = NOW() WHERE category_id = ANY($2)",
            table(hierarchy),
            flag.column()
        );
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(ids)
            .execute(&self.pool)
            .await
            .context("Failed to set flag on categories")?;
        Ok(result.rows_affected())
    }
}

// ============================================================================
// Selections
// ============================================================================

/// Legacy per-category selections, kept in their original open-shape jsonb.
#[derive(Clone)]
pub struct PgSelectionSource {
    pool: PgPool,
}

impl PgSelectionSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SelectionSource for PgSelectionSource {
    async fn get_selections(
        &self,
        vendor_id: Uuid,
        leaf_id: Uuid,
    ) -> Result<JsonValue, CatalogError> {
        let payload: Option<(JsonValue,)> = sqlx::query_as(
            "SELECT payload FROM vendor_selected_attributes \
             WHERE vendor_id = $1 AND category_id = $2",
        )
        .bind(vendor_id)
        .bind(leaf_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch vendor selections")?;
        Ok(payload.map(|(value,)| value).unwrap_or(JsonValue::Null))
    }
}

// ============================================================================
// Vendor services
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ServiceRow {
    service_id: Uuid,
    vendor_id: Uuid,
    category_path: Vec<String>,
    category_ids: Vec<Uuid>,
    price: Decimal,
    terms: Vec<String>,
    status: String,
    attributes: JsonValue,
    logs: JsonValue,
}

impl From<ServiceRow> for FlattenedService {
    fn from(row: ServiceRow) -> Self {
        FlattenedService {
            service_id: row.service_id,
            vendor_id: row.vendor_id,
            category_path: row.category_path,
            category_ids: row.category_ids,
            price: row.price,
            terms: row.terms,
            status: ServiceStatus::parse(&row.status).unwrap_or(ServiceStatus::Inactive),
            attributes: serde_json::from_value(row.attributes).unwrap_or_default(),
            logs: serde_json::from_value(row.logs).unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct PgVendorServiceStore {
    pool: PgPool,
}

impl PgVendorServiceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_service(
        &self,
        vendor_id: Uuid,
        service_id: Uuid,
    ) -> Result<FlattenedService, CatalogError> {
        let row = sqlx::query_as::<_, ServiceRow>(
            "SELECT service_id, vendor_id, category_path, category_ids, price, terms, \
                    status, attributes, logs \
             FROM vendor_services WHERE vendor_id = $1 AND service_id = $2",
        )
        .bind(vendor_id)
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch vendor service")?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                let list: Option<(i64,)> = sqlx::query_as(
                    "SELECT version FROM vendor_service_lists WHERE vendor_id = $1",
                )
                .bind(vendor_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch vendor service list version")?;
                if list.is_none() {
                    Err(CatalogError::VendorNotSynced(vendor_id))
                } else {
                    Err(CatalogError::ServiceNotFound {
                        vendor_id,
                        service_id,
                    })
                }
            }
        }
    }

    async fn append_log_entry(
        &self,
        vendor_id: Uuid,
        service_id: Uuid,
        entry: &ServiceLogEntry,
    ) -> Result<(), CatalogError> {
        let appended = serde_json::to_value(vec![entry])
            .map_err(|err| anyhow!("Failed to encode log entry: {err}"))?;
        sqlx::query(
            "UPDATE vendor_services SET logs = logs || $3::jsonb \
             WHERE vendor_id = $1 AND service_id = $2",
        )
        .bind(vendor_id)
        .bind(service_id)
        .bind(appended)
        .execute(&self.pool)
        .await
        .context("Failed to append service log entry")?;
        Ok(())
    }
}

#[async_trait]
impl VendorServiceStore for PgVendorServiceStore {
    async fn get(&self, vendor_id: Uuid) -> Result<VersionedServices, CatalogError> {
        let version: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM vendor_service_lists WHERE vendor_id = $1")
                .bind(vendor_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch vendor service list version")?;

        let rows = sqlx::query_as::<_, ServiceRow>(
            "SELECT service_id, vendor_id, category_path, category_ids, price, terms, \
                    status, attributes, logs \
             FROM vendor_services WHERE vendor_id = $1 ORDER BY position",
        )
        .bind(vendor_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch vendor services")?;

        Ok(VersionedServices {
            version: version.map(|(v,)| v as u64).unwrap_or(0),
            services: rows.into_iter().map(FlattenedService::from).collect(),
        })
    }

    async fn replace_all(
        &self,
        vendor_id: Uuid,
        services: Vec<FlattenedService>,
        expected_version: u64,
    ) -> Result<u64, CatalogError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open replace transaction")?;

        let current: Option<(i64,)> = sqlx::query_as(
            "SELECT version FROM vendor_service_lists WHERE vendor_id = $1 FOR UPDATE",
        )
        .bind(vendor_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock vendor service list")?;
        let current = current.map(|(v,)| v as u64).unwrap_or(0);
        if current != expected_version {
            return Err(CatalogError::VersionMismatch {
                vendor_id,
                expected: expected_version,
                found: current,
            });
        }
        let new_version = current + 1;

        sqlx::query(
            "INSERT INTO vendor_service_lists (vendor_id, version) VALUES ($1, $2) \
             ON CONFLICT (vendor_id) DO UPDATE SET version = $2",
        )
        .bind(vendor_id)
        .bind(new_version as i64)
        .execute(&mut *tx)
        .await
        .context("Failed to bump vendor service list version")?;

        sqlx::query("DELETE FROM vendor_services WHERE vendor_id = $1")
            .bind(vendor_id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear previous vendor services")?;

        for (position, service) in services.iter().enumerate() {
            let attributes = serde_json::to_value(&service.attributes)
                .map_err(|err| anyhow!("Failed to encode attributes: {err}"))?;
            let logs = serde_json::to_value(&service.logs)
                .map_err(|err| anyhow!("Failed to encode logs: {err}"))?;
            sqlx::query(
                "INSERT INTO vendor_services \
                 (service_id, vendor_id, position, category_path, category_ids, price, \
                  terms, status, attributes, logs) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(service.service_id)
            .bind(vendor_id)
            .bind(position as i32)
            .bind(&service.category_path)
            .bind(&service.category_ids)
            .bind(service.price)
            .bind(&service.terms)
            .bind(service.status.as_str())
            .bind(attributes)
            .bind(logs)
            .execute(&mut *tx)
            .await
            .context("Failed to insert vendor service")?;
        }

        tx.commit()
            .await
            .context("Failed to commit replace transaction")?;
        info!(
            vendor = %vendor_id,
            count = services.len(),
            version = new_version,
            "vendor services replaced"
        );
        Ok(new_version)
    }

    async fn update_price(
        &self,
        vendor_id: Uuid,
        service_id: Uuid,
        price: Decimal,
    ) -> Result<FlattenedService, CatalogError> {
        let before = self.fetch_service(vendor_id, service_id).await?;
        sqlx::query(
            "UPDATE vendor_services SET price = $3 \
             WHERE vendor_id = $1 AND service_id = $2",
        )
        .bind(vendor_id)
        .bind(service_id)
        .bind(price)
        .execute(&self.pool)
        .await
        .context("Failed to update service price")?;
        self.append_log_entry(
            vendor_id,
            service_id,
            &ServiceLogEntry::with_details("Price updated", format!("{} -> {price}", before.price)),
        )
        .await?;
        self.fetch_service(vendor_id, service_id).await
    }

    async fn update_status(
        &self,
        vendor_id: Uuid,
        service_id: Uuid,
        status: ServiceStatus,
    ) -> Result<FlattenedService, CatalogError> {
        self.fetch_service(vendor_id, service_id).await?;
        sqlx::query(
            "UPDATE vendor_services SET status = $3 \
             WHERE vendor_id = $1 AND service_id = $2",
        )
        .bind(vendor_id)
        .bind(service_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to update service status")?;
        self.append_log_entry(
            vendor_id,
            service_id,
            &ServiceLogEntry::with_details("Status updated", status.as_str()),
        )
        .await?;
        self.fetch_service(vendor_id, service_id).await
    }

    async fn append_log(
        &self,
        vendor_id: Uuid,
        service_id: Uuid,
        entry: ServiceLogEntry,
    ) -> Result<(), CatalogError> {
        self.fetch_service(vendor_id, service_id).await?;
        self.append_log_entry(vendor_id, service_id, &entry).await
    }
}

// ============================================================================
// Combos
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ComboRow {
    combo_id: Uuid,
    parent_category_id: Uuid,
    name: String,
    items: JsonValue,
    sizes: JsonValue,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ComboRow {
    fn into_combo(self) -> anyhow::Result<Combo> {
        let items: Vec<ComboItem> =
            serde_json::from_value(self.items).context("Failed to decode combo items")?;
        let sizes: Vec<ComboSize> =
            serde_json::from_value(self.sizes).context("Failed to decode combo sizes")?;
        Ok(Combo {
            combo_id: self.combo_id,
            parent_category_id: self.parent_category_id,
            name: self.name,
            items,
            sizes,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const COMBO_COLUMNS: &str =
    "combo_id, parent_category_id, name, items, sizes, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgComboStore {
    pool: PgPool,
}

impl PgComboStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ComboStore for PgComboStore {
    async fn create(&self, fields: NewComboFields) -> Result<Combo, CatalogError> {
        let items = serde_json::to_value(&fields.items)
            .map_err(|err| anyhow!("Failed to encode combo items: {err}"))?;
        let sizes = serde_json::to_value(&fields.sizes)
            .map_err(|err| anyhow!("Failed to encode combo sizes: {err}"))?;
        let sql = format!(
            "INSERT INTO combos \
             (combo_id, parent_category_id, name, items, sizes, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, true, NOW(), NOW()) \
             RETURNING {COMBO_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ComboRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(fields.parent_category_id)
            .bind(&fields.name)
            .bind(items)
            .bind(sizes)
            .fetch_one(&self.pool)
            .await
            .context("Failed to create combo")?;
        let combo = row.into_combo()?;
        info!(combo = %combo.combo_id, name = %combo.name, "combo created");
        Ok(combo)
    }

    async fn update(
        &self,
        combo_id: Uuid,
        fields: NewComboFields,
    ) -> Result<Combo, CatalogError> {
        let items = serde_json::to_value(&fields.items)
            .map_err(|err| anyhow!("Failed to encode combo items: {err}"))?;
        let sizes = serde_json::to_value(&fields.sizes)
            .map_err(|err| anyhow!("Failed to encode combo sizes: {err}"))?;
        let sql = format!(
            "UPDATE combos SET parent_category_id = $2, name = $3, items = $4, sizes = $5, \
             updated_at = NOW() WHERE combo_id = $1 \
             RETURNING {COMBO_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ComboRow>(&sql)
            .bind(combo_id)
            .bind(fields.parent_category_id)
            .bind(&fields.name)
            .bind(items)
            .bind(sizes)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update combo")?
            .ok_or(CatalogError::ComboNotFound(combo_id))?;
        Ok(row.into_combo()?)
    }

    async fn get(&self, combo_id: Uuid) -> Result<Option<Combo>, CatalogError> {
        let sql = format!("SELECT {COMBO_COLUMNS} FROM combos WHERE combo_id = $1");
        let row = sqlx::query_as::<_, ComboRow>(&sql)
            .bind(combo_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch combo")?;
        Ok(match row {
            Some(row) => Some(row.into_combo()?),
            None => None,
        })
    }

    async fn list_for_parent(
        &self,
        parent_category_id: Uuid,
    ) -> Result<Vec<Combo>, CatalogError> {
        let sql = format!(
            "SELECT {COMBO_COLUMNS} FROM combos \
             WHERE parent_category_id = $1 ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, ComboRow>(&sql)
            .bind(parent_category_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list combos")?;
        let mut combos = Vec::with_capacity(rows.len());
        for row in rows {
            combos.push(row.into_combo()?);
        }
        Ok(combos)
    }

    async fn delete(&self, combo_id: Uuid) -> Result<bool, CatalogError> {
        let result = sqlx::query("DELETE FROM combos WHERE combo_id = $1")
            .bind(combo_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete combo")?;
        Ok(result.rows_affected() > 0)
    }
}
