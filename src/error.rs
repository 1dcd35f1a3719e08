//! Error taxonomy for the catalog engine.
//!
//! Domain failures get typed variants; storage-level failures from the
//! backends arrive as `anyhow` chains and are wrapped transparently.

use thiserror::Error;
use uuid::Uuid;

/// Engine-level errors surfaced to callers.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("category {0} not found")]
    CategoryNotFound(Uuid),

    #[error("combo {0} not found")]
    ComboNotFound(Uuid),

    #[error("vendor {0} has no synced service list")]
    VendorNotSynced(Uuid),

    #[error("service {service_id} not found for vendor {vendor_id}")]
    ServiceNotFound { vendor_id: Uuid, service_id: Uuid },

    #[error("combo item {0} does not resolve to a category")]
    UnknownComboItem(Uuid),

    #[error("combo item {category_id} is neither a leaf nor a last-level parent")]
    InvalidComboItem { category_id: Uuid },

    #[error(
        "service list for vendor {vendor_id} moved during the run \
         (expected version {expected}, found {found})"
    )]
    VersionMismatch {
        vendor_id: Uuid,
        expected: u64,
        found: u64,
    },

    #[error("cascade aborted at category {category_id}")]
    CascadeAborted {
        category_id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl CatalogError {
    /// True for failures caused by the request rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CatalogError::CategoryNotFound(_)
                | CatalogError::ComboNotFound(_)
                | CatalogError::VendorNotSynced(_)
                | CatalogError::ServiceNotFound { .. }
                | CatalogError::UnknownComboItem(_)
                | CatalogError::InvalidComboItem { .. }
                | CatalogError::VersionMismatch { .. }
        )
    }
}
