//! REST API module for the catalog engine.
//!
//! Thin axum routers over the engine: category CRUD + cascade, combo
//! validation and persistence, vendor synchronization and the narrow
//! price/status updates. Authentication, upload handling, and audit
//! persistence live in outer layers.

#[cfg(feature = "server")]
pub mod category_routes;

#[cfg(feature = "server")]
pub mod combo_routes;

#[cfg(feature = "server")]
pub mod vendor_routes;

#[cfg(feature = "server")]
pub use category_routes::create_category_router;

#[cfg(feature = "server")]
pub use combo_routes::create_combo_router;

#[cfg(feature = "server")]
pub use vendor_routes::create_vendor_router;

#[cfg(feature = "server")]
mod server_state {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use tracing::error;

    use crate::error::CatalogError;
    use crate::hierarchy::{CascadeOperator, ComboService, TreeBuilder};
    use crate::store::{
        AssetStore, CategoryStore, ComboStore, InventoryTreeSource, SelectionSource,
        VendorServiceStore,
    };
    use crate::sync::{SyncConfig, VendorFlowSynchronizer};

    /// Shared application state for all routers.
    #[derive(Clone)]
    pub struct AppState {
        pub categories: Arc<dyn CategoryStore>,
        pub builder: TreeBuilder,
        pub cascade: Arc<CascadeOperator>,
        pub combos: ComboService,
        pub services: Arc<dyn VendorServiceStore>,
        pub synchronizer: Arc<VendorFlowSynchronizer>,
    }

    impl AppState {
        pub fn new(
            categories: Arc<dyn CategoryStore>,
            combos: Arc<dyn ComboStore>,
            services: Arc<dyn VendorServiceStore>,
            selections: Arc<dyn SelectionSource>,
            assets: Arc<dyn AssetStore>,
            inventory: Option<Arc<dyn InventoryTreeSource>>,
            sync_config: SyncConfig,
        ) -> Self {
            let builder = TreeBuilder::new(categories.clone());
            let cascade = Arc::new(CascadeOperator::new(categories.clone(), assets));
            let combo_service = ComboService::new(categories.clone(), combos);
            let mut synchronizer =
                VendorFlowSynchronizer::new(categories.clone(), services.clone(), selections)
                    .with_config(sync_config);
            if let Some(source) = inventory {
                synchronizer = synchronizer.with_inventory_source(source);
            }
            Self {
                categories,
                builder,
                cascade,
                combos: combo_service,
                services,
                synchronizer: Arc::new(synchronizer),
            }
        }
    }

    /// Map an engine error onto an HTTP status, logging server-side faults.
    pub fn into_status(err: CatalogError) -> StatusCode {
        if !err.is_client_error() {
            error!(error = %err, "request failed");
        }
        match &err {
            CatalogError::CategoryNotFound(_)
            | CatalogError::ComboNotFound(_)
            | CatalogError::VendorNotSynced(_)
            | CatalogError::ServiceNotFound { .. } => StatusCode::NOT_FOUND,
            CatalogError::UnknownComboItem(_) | CatalogError::InvalidComboItem { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CatalogError::VersionMismatch { .. } => StatusCode::CONFLICT,
            CatalogError::CascadeAborted { .. } | CatalogError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(feature = "server")]
pub use server_state::{into_status, AppState};
