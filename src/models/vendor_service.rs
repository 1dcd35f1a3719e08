//! Flattened vendor services - one sellable unit per leaf category.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Active,
    Inactive,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Active => "ACTIVE",
            ServiceStatus::Inactive => "INACTIVE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACTIVE" => Some(ServiceStatus::Active),
            "INACTIVE" => Some(ServiceStatus::Inactive),
            _ => None,
        }
    }
}

/// Append-only history entry on a flattened service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLogEntry {
    pub action: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ServiceLogEntry {
    pub fn with_details(action: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            details: Some(details.into()),
            timestamp: Utc::now(),
        }
    }
}

/// One leaf-level sellable unit for a vendor, with its full category path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenedService {
    pub service_id: Uuid,
    pub vendor_id: Uuid,
    /// Names from the vendor's root category down to the leaf.
    pub category_path: Vec<String>,
    /// Ids paralleling `category_path`.
    pub category_ids: Vec<Uuid>,
    pub price: Decimal,
    pub terms: Vec<String>,
    pub status: ServiceStatus,
    pub attributes: BTreeMap<String, String>,
    pub logs: Vec<ServiceLogEntry>,
}

impl FlattenedService {
    /// Leaf category id (last entry of the id path).
    pub fn leaf_id(&self) -> Option<Uuid> {
        self.category_ids.last().copied()
    }
}

/// A vendor's whole service list plus the optimistic-replacement version.
///
/// `version` is 0 for a vendor that has never synced; every successful
/// replace bumps it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionedServices {
    pub version: u64,
    pub services: Vec<FlattenedService>,
}
