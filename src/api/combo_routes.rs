//! REST API routes for combo offerings.
//!
//! Writes re-validate membership against the live hierarchy on every call;
//! the validate route lets the admin UI pre-check a selection without
//! persisting anything.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CatalogError;
use crate::models::{Combo, ComboItem, Hierarchy, NewComboFields};

use super::{into_status, AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ValidateComboRequest {
    pub items: Vec<ComboItem>,
}

#[derive(Debug, Serialize)]
pub struct ValidateComboResponse {
    pub valid: bool,
    pub message: String,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /api/combos/validate
async fn validate_combo(
    State(state): State<AppState>,
    Json(request): Json<ValidateComboRequest>,
) -> Result<Json<ValidateComboResponse>, StatusCode> {
    match state
        .combos
        .validator()
        .validate_combo_items(Hierarchy::Live, &request.items)
        .await
    {
        Ok(()) => Ok(Json(ValidateComboResponse {
            valid: true,
            message: "All items are leaves or last-level parents".to_string(),
        })),
        Err(
            err @ (CatalogError::InvalidComboItem { .. } | CatalogError::UnknownComboItem(_)),
        ) => Ok(Json(ValidateComboResponse {
            valid: false,
            message: err.to_string(),
        })),
        Err(err) => Err(into_status(err)),
    }
}

/// POST /api/combos
async fn create_combo(
    State(state): State<AppState>,
    Json(fields): Json<NewComboFields>,
) -> Result<Json<Combo>, StatusCode> {
    let combo = state
        .combos
        .create_combo(fields)
        .await
        .map_err(into_status)?;
    Ok(Json(combo))
}

/// PUT /api/combos/:id
async fn update_combo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(fields): Json<NewComboFields>,
) -> Result<Json<Combo>, StatusCode> {
    let combo = state
        .combos
        .update_combo(id, fields)
        .await
        .map_err(into_status)?;
    Ok(Json(combo))
}

/// GET /api/combos/:id
async fn get_combo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Combo>, StatusCode> {
    state
        .combos
        .get_combo(id)
        .await
        .map_err(into_status)?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// DELETE /api/combos/:id
async fn delete_combo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let removed = state.combos.delete_combo(id).await.map_err(into_status)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

/// GET /api/categories/:id/combos
async fn list_combos(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Combo>>, StatusCode> {
    let combos = state
        .combos
        .list_for_parent(id)
        .await
        .map_err(into_status)?;
    Ok(Json(combos))
}

// ============================================================================
// Router
// ============================================================================

pub fn create_combo_router() -> Router<AppState> {
    Router::new()
        .route("/api/combos", post(create_combo))
        .route("/api/combos/validate", post(validate_combo))
        .route(
            "/api/combos/:id",
            get(get_combo).put(update_combo).delete(delete_combo),
        )
        .route("/api/categories/:id/combos", get(list_combos))
}
