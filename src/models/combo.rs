//! Combos - administrator-defined composite offerings.
//!
//! A combo bundles leaf or last-level-parent categories, and optionally
//! free-form custom items, under one subtree root. Membership is validated
//! against the live hierarchy at every write, never cached.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combo {
    pub combo_id: Uuid,
    /// Subtree root the combo is scoped under.
    pub parent_category_id: Uuid,
    pub name: String,
    pub items: Vec<ComboItem>,
    pub sizes: Vec<ComboSize>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One combo entry: either a category reference or a custom line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ComboItem {
    Category { category_id: Uuid },
    Custom { name: String },
}

impl ComboItem {
    pub fn category_id(&self) -> Option<Uuid> {
        match self {
            ComboItem::Category { category_id } => Some(*category_id),
            ComboItem::Custom { .. } => None,
        }
    }
}

/// Per-size price/terms. Items sharing the same size set are assumed aligned
/// for summary purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboSize {
    pub label: String,
    pub price: Option<Decimal>,
    pub terms: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComboFields {
    pub parent_category_id: Uuid,
    pub name: String,
    pub items: Vec<ComboItem>,
    #[serde(default)]
    pub sizes: Vec<ComboSize>,
}
