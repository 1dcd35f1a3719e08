//! Category records - flat, self-referential rows forming the hierarchy.
//!
//! A category points at its parent; `None` marks a root. Parentage is set
//! once at creation, so the parent graph stays a forest by construction.
//! Price/terms are meaningful on leaves only but tolerated anywhere, since
//! upstream data may set them on parents.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which of the two parallel hierarchies a query targets.
///
/// The live and draft hierarchies share the same shape; every engine
/// operation works identically over either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hierarchy {
    Live,
    Draft,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Hierarchy::Live
    }
}

/// Boolean flags that cascade down a subtree via the cascade operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFlag {
    /// Free-text entry enabled for the whole subtree.
    FreeText,
    /// Visibility toggle.
    Active,
}

impl CategoryFlag {
    /// Backing column name.
    pub fn column(&self) -> &'static str {
        match self {
            CategoryFlag::FreeText => "free_text_enabled",
            CategoryFlag::Active => "is_active",
        }
    }
}

/// One category or subcategory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Category {
    pub category_id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    /// Ordering hint among siblings; ties break by creation time, newest first.
    pub sequence: i32,
    pub price: Option<Decimal>,
    pub terms: Option<String>,
    pub image_url: Option<String>,
    pub free_text_enabled: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn set_flag(&mut self, flag: CategoryFlag, value: bool) {
        match flag {
            CategoryFlag::FreeText => self.free_text_enabled = value,
            CategoryFlag::Active => self.is_active = value,
        }
    }
}

/// Sibling ordering: `sequence` ascending, creation time descending on ties.
pub fn sibling_order(a: &Category, b: &Category) -> Ordering {
    a.sequence
        .cmp(&b.sequence)
        .then(b.created_at.cmp(&a.created_at))
}

/// Fields for creating a category. Parentage is fixed at creation; there is
/// no move operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCategoryFields {
    pub name: String,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub sequence: i32,
    pub price: Option<Decimal>,
    pub terms: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub free_text_enabled: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryFields {
    pub name: Option<String>,
    pub sequence: Option<i32>,
    pub price: Option<Decimal>,
    pub terms: Option<String>,
    pub image_url: Option<String>,
    pub free_text_enabled: Option<bool>,
    pub is_active: Option<bool>,
}
