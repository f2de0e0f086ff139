//! Import preview handler
//!
//! POST /api/constructions/:construction_id/preview

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    services::{preview_csv, preview_sheet, PreviewReport},
    AppState,
};

/// Exactly one of `csv` and `sheetsUrl` must be given
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    #[serde(default)]
    pub csv: Option<String>,
    #[serde(default)]
    pub sheets_url: Option<String>,
}

/// POST /api/constructions/:construction_id/preview
pub async fn preview_import(
    State(state): State<AppState>,
    Path(construction_id): Path<i64>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewReport>> {
    let report = match (request.csv, request.sheets_url) {
        (Some(csv), None) => preview_csv(&state.db, construction_id, &csv).await?,
        (None, Some(url)) => preview_sheet(&state.db, &state.sheets, construction_id, &url).await?,
        _ => {
            return Err(ApiError::BadRequest(
                "Provide either csv or sheetsUrl".to_string(),
            ))
        }
    };

    Ok(Json(report))
}

/// Build preview routes
pub fn preview_routes() -> Router<AppState> {
    Router::new().route(
        "/api/constructions/:construction_id/preview",
        post(preview_import),
    )
}
