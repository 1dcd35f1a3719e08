//! REST API routes for vendor service synchronization and updates.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{FlattenedService, ServiceStatus, VersionedServices};
use crate::sync::{SyncReport, SyncRequest};

use super::{into_status, AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SyncBody {
    /// The vendor's assigned category root.
    pub category_root: Uuid,
    /// Draft-system scope; when present the inventory view is preferred.
    pub scope_id: Option<Uuid>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ServiceStatus,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /api/vendors/:id/services/sync
///
/// Without `force`, a vendor that already has a list gets it back with
/// `created = false`; nothing is rewritten.
async fn sync_vendor(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
    Json(body): Json<SyncBody>,
) -> Result<Json<SyncReport>, StatusCode> {
    let request = SyncRequest {
        vendor_id,
        category_root: body.category_root,
        scope_id: body.scope_id,
        force: body.force,
    };
    let report = state
        .synchronizer
        .sync(&request)
        .await
        .map_err(into_status)?;
    Ok(Json(report))
}

/// GET /api/vendors/:id/services
async fn list_services(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
) -> Result<Json<VersionedServices>, StatusCode> {
    let list = state.services.get(vendor_id).await.map_err(into_status)?;
    Ok(Json(list))
}

/// PUT /api/vendors/:id/services/:service_id/price
async fn update_price(
    State(state): State<AppState>,
    Path((vendor_id, service_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdatePriceRequest>,
) -> Result<Json<FlattenedService>, StatusCode> {
    let service = state
        .services
        .update_price(vendor_id, service_id, request.price)
        .await
        .map_err(into_status)?;
    Ok(Json(service))
}

/// PUT /api/vendors/:id/services/:service_id/status
async fn update_status(
    State(state): State<AppState>,
    Path((vendor_id, service_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<FlattenedService>, StatusCode> {
    let service = state
        .services
        .update_status(vendor_id, service_id, request.status)
        .await
        .map_err(into_status)?;
    Ok(Json(service))
}

// ============================================================================
// Router
// ============================================================================

pub fn create_vendor_router() -> Router<AppState> {
    Router::new()
        .route("/api/vendors/:id/services/sync", post(sync_vendor))
        .route("/api/vendors/:id/services", get(list_services))
        .route(
            "/api/vendors/:id/services/:service_id/price",
            put(update_price),
        )
        .route(
            "/api/vendors/:id/services/:service_id/status",
            put(update_status),
        )
}
