//! REST API routes for category hierarchy operations.
//!
//! Every route takes a `hierarchy` query parameter (`live` default, `draft`
//! for the dummy hierarchy) and is otherwise identical over either.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hierarchy::CategoryTreeView;
use crate::models::{
    Category, CategoryFlag, Hierarchy, NewCategoryFields, UpdateCategoryFields,
};

use super::{into_status, AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HierarchyQuery {
    #[serde(default)]
    pub hierarchy: Hierarchy,
}

#[derive(Debug, Serialize)]
pub struct CategoryPathResponse {
    pub levels: Vec<String>,
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DeleteSubtreeResponse {
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct PropagateFlagRequest {
    pub flag: CategoryFlag,
    pub value: bool,
}

#[derive(Debug, Serialize)]
pub struct PropagateFlagResponse {
    /// Descendants touched; the node's own write is included separately.
    pub touched: u64,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /api/categories
async fn create_category(
    State(state): State<AppState>,
    Query(query): Query<HierarchyQuery>,
    Json(fields): Json<NewCategoryFields>,
) -> Result<Json<Category>, StatusCode> {
    let category = state
        .categories
        .create_node(query.hierarchy, fields)
        .await
        .map_err(into_status)?;
    Ok(Json(category))
}

/// PUT /api/categories/:id
async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HierarchyQuery>,
    Json(fields): Json<UpdateCategoryFields>,
) -> Result<Json<Category>, StatusCode> {
    let updated = state
        .categories
        .update_node(query.hierarchy, id, fields)
        .await
        .map_err(into_status)?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }
    state
        .categories
        .get_node(query.hierarchy, id)
        .await
        .map_err(into_status)?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// DELETE /api/categories/:id
///
/// Cascades: the node and every descendant go together, never the node alone.
async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HierarchyQuery>,
) -> Result<Json<DeleteSubtreeResponse>, StatusCode> {
    let deleted = state
        .cascade
        .delete_subtree(query.hierarchy, id)
        .await
        .map_err(into_status)?;
    Ok(Json(DeleteSubtreeResponse { deleted }))
}

/// GET /api/categories/:id/tree
async fn get_tree(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HierarchyQuery>,
) -> Result<Json<CategoryTreeView>, StatusCode> {
    let tree = state
        .builder
        .build_subtree(query.hierarchy, id)
        .await
        .map_err(into_status)?
        .ok_or(StatusCode::NOT_FOUND)?;
    tree.to_view()
        .into_iter()
        .next()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/categories/:id/children
async fn get_children(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HierarchyQuery>,
) -> Result<Json<Vec<Category>>, StatusCode> {
    let children = state
        .categories
        .get_children(query.hierarchy, id)
        .await
        .map_err(into_status)?;
    Ok(Json(children))
}

/// GET /api/categories/:id/path
async fn get_path(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HierarchyQuery>,
) -> Result<Json<CategoryPathResponse>, StatusCode> {
    let chain = state
        .builder
        .ancestor_chain(query.hierarchy, id)
        .await
        .map_err(into_status)?;
    if chain.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }
    let levels = chain.iter().map(|node| node.name.clone()).collect();
    let ids = chain.iter().map(|node| node.category_id).collect();
    Ok(Json(CategoryPathResponse { levels, ids }))
}

/// POST /api/categories/:id/flags
///
/// Writes the node's own flag, then fans the value down the whole subtree.
async fn propagate_flag(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HierarchyQuery>,
    Json(request): Json<PropagateFlagRequest>,
) -> Result<Json<PropagateFlagResponse>, StatusCode> {
    let own = match request.flag {
        CategoryFlag::FreeText => UpdateCategoryFields {
            free_text_enabled: Some(request.value),
            ..UpdateCategoryFields::default()
        },
        CategoryFlag::Active => UpdateCategoryFields {
            is_active: Some(request.value),
            ..UpdateCategoryFields::default()
        },
    };
    let updated = state
        .categories
        .update_node(query.hierarchy, id, own)
        .await
        .map_err(into_status)?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }
    let touched = state
        .cascade
        .propagate_flag(query.hierarchy, id, request.flag, request.value)
        .await
        .map_err(into_status)?;
    Ok(Json(PropagateFlagResponse { touched }))
}

// ============================================================================
// Router
// ============================================================================

pub fn create_category_router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", post(create_category))
        .route(
            "/api/categories/:id",
            axum::routing::put(update_category).delete(delete_category),
        )
        .route("/api/categories/:id/tree", get(get_tree))
        .route("/api/categories/:id/children", get(get_children))
        .route("/api/categories/:id/path", get(get_path))
        .route("/api/categories/:id/flags", post(propagate_flag))
}
