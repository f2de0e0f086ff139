//! Item and category API handlers
//!
//! GET /api/constructions/:construction_id/items
//! GET /api/constructions/:construction_id/items/search?q=
//! GET /api/constructions/:construction_id/categories

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    db::{categories, items},
    error::ApiResult,
    models::{Category, Item},
    AppState,
};

const DEFAULT_SEARCH_LIMIT: i64 = 50;
const MAX_SEARCH_LIMIT: i64 = 500;

/// Search query parameters
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

/// GET /api/constructions/:construction_id/items
pub async fn get_items(
    State(state): State<AppState>,
    Path(construction_id): Path<i64>,
) -> ApiResult<Json<Vec<Item>>> {
    let items = items::list_items(&state.db, construction_id).await?;
    Ok(Json(items))
}

/// GET /api/constructions/:construction_id/items/search
///
/// Case-insensitive substring match on code and description. An empty
/// query returns no items.
pub async fn search_items(
    State(state): State<AppState>,
    Path(construction_id): Path<i64>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Item>>> {
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    tracing::debug!(construction_id, query, limit, "Item search");
    let found = items::search_items(&state.db, construction_id, query, limit).await?;
    Ok(Json(found))
}

/// GET /api/constructions/:construction_id/categories
pub async fn get_categories(
    State(state): State<AppState>,
    Path(construction_id): Path<i64>,
) -> ApiResult<Json<Vec<Category>>> {
    let categories = categories::list_categories(&state.db, construction_id).await?;
    Ok(Json(categories))
}

/// Build item routes
pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/api/constructions/:construction_id/items", get(get_items))
        .route(
            "/api/constructions/:construction_id/items/search",
            get(search_items),
        )
        .route(
            "/api/constructions/:construction_id/categories",
            get(get_categories),
        )
}
