//! Catalog server: wires the Postgres backends to the REST surface.

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use vendor_catalog::api::{
    create_category_router, create_combo_router, create_vendor_router, AppState,
};
use vendor_catalog::store::{
    DatabaseConfig, LocalAssetStore, PgCategoryStore, PgComboStore, PgSelectionSource,
    PgVendorServiceStore,
};
use vendor_catalog::sync::SyncConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "catalog_server=info,vendor_catalog=info,tower_http=debug".into()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Database connection
    let config = DatabaseConfig::default();
    info!("Connecting to database: {}", config.database_url);
    let pool = config.connect().await?;

    let asset_root =
        std::env::var("ASSET_ROOT").unwrap_or_else(|_| "/var/lib/vendor-catalog/assets".into());

    let state = AppState::new(
        Arc::new(PgCategoryStore::new(pool.clone())),
        Arc::new(PgComboStore::new(pool.clone())),
        Arc::new(PgVendorServiceStore::new(pool.clone())),
        Arc::new(PgSelectionSource::new(pool)),
        Arc::new(LocalAssetStore::new(asset_root)),
        None,
        SyncConfig::default(),
    );

    let app = Router::new()
        .merge(create_category_router())
        .merge(create_combo_router())
        .merge(create_vendor_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Catalog server listening on port {port}");
    axum::serve(listener, app).await?;

    Ok(())
}
