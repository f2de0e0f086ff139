//! Import API handlers
//!
//! POST /api/constructions/:construction_id/imports
//! GET  /api/constructions/:construction_id/imports
//! POST /api/imports/:import_id/revert

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    db::imports,
    error::{ApiError, ApiResult},
    models::{ImportBatch, ImportRequest, RowFailure},
    services::importer,
    AppState,
};

/// POST /api/constructions/:construction_id/imports response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub imported: usize,
    pub errors: Vec<RowFailure>,
    pub ids: Vec<i64>,
    pub import_id: i64,
}

/// POST /api/imports/:import_id/revert response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertResponse {
    pub success: bool,
    pub deleted_items: usize,
}

/// POST /api/constructions/:construction_id/imports
///
/// Rows that fail are listed in `errors`; the call itself still succeeds.
pub async fn import_items(
    State(state): State<AppState>,
    Path(construction_id): Path<i64>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportResponse>> {
    if request.items.is_empty() {
        return Err(ApiError::BadRequest("No items to import".to_string()));
    }

    let outcome =
        importer::import_items(&state.db, &state.event_bus, construction_id, &request).await?;

    Ok(Json(ImportResponse {
        success: true,
        imported: outcome.imported(),
        errors: outcome.failed,
        ids: outcome.succeeded,
        import_id: outcome.import_id,
    }))
}

/// GET /api/constructions/:construction_id/imports
pub async fn get_import_history(
    State(state): State<AppState>,
    Path(construction_id): Path<i64>,
) -> ApiResult<Json<Vec<ImportBatch>>> {
    let history = imports::list_import_history(&state.db, construction_id).await?;
    Ok(Json(history))
}

/// POST /api/imports/:import_id/revert
///
/// 404 for an unknown import, 409 when it was already reverted.
pub async fn revert_import(
    State(state): State<AppState>,
    Path(import_id): Path<i64>,
) -> ApiResult<Json<RevertResponse>> {
    let outcome = importer::revert_import(&state.db, &state.event_bus, import_id).await?;

    Ok(Json(RevertResponse {
        success: true,
        deleted_items: outcome.deleted_items,
    }))
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/constructions/:construction_id/imports",
            get(get_import_history).post(import_items),
        )
        .route("/api/imports/:import_id/revert", post(revert_import))
}
