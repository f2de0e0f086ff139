//! Validation rule API handlers
//!
//! GET    /api/constructions/:construction_id/validation-rules
//! POST   /api/constructions/:construction_id/validation-rules
//! POST   /api/constructions/:construction_id/validation-rules/defaults
//! PATCH  /api/validation-rules/:rule_id
//! DELETE /api/validation-rules/:rule_id
//! POST   /api/validation-rules/:rule_id/toggle

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::rules,
    error::ApiResult,
    models::{NewValidationRule, ValidationRule, ValidationRuleUpdate},
    services::rule_store,
    AppState,
};

/// POST /api/validation-rules/:rule_id/toggle request
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// GET /api/constructions/:construction_id/validation-rules
pub async fn get_validation_rules(
    State(state): State<AppState>,
    Path(construction_id): Path<i64>,
) -> ApiResult<Json<Vec<ValidationRule>>> {
    let rules = rules::list_rules(&state.db, construction_id).await?;
    Ok(Json(rules))
}

/// POST /api/constructions/:construction_id/validation-rules
pub async fn create_validation_rule(
    State(state): State<AppState>,
    Path(construction_id): Path<i64>,
    Json(request): Json<NewValidationRule>,
) -> ApiResult<(StatusCode, Json<ValidationRule>)> {
    let rule =
        rule_store::create_rule(&state.db, &state.event_bus, construction_id, &request).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// POST /api/constructions/:construction_id/validation-rules/defaults
pub async fn seed_default_rules(
    State(state): State<AppState>,
    Path(construction_id): Path<i64>,
) -> ApiResult<Json<Vec<ValidationRule>>> {
    let created =
        rule_store::seed_default_rules(&state.db, &state.event_bus, construction_id).await?;
    Ok(Json(created))
}

/// PATCH /api/validation-rules/:rule_id
pub async fn update_validation_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<i64>,
    Json(request): Json<ValidationRuleUpdate>,
) -> ApiResult<Json<ValidationRule>> {
    let rule = rule_store::update_rule(&state.db, &state.event_bus, rule_id, &request).await?;
    Ok(Json(rule))
}

/// DELETE /api/validation-rules/:rule_id
pub async fn delete_validation_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<i64>,
) -> ApiResult<Json<SuccessResponse>> {
    rule_store::delete_rule(&state.db, &state.event_bus, rule_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/validation-rules/:rule_id/toggle
pub async fn toggle_validation_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<i64>,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<Json<ValidationRule>> {
    let rule =
        rule_store::toggle_rule(&state.db, &state.event_bus, rule_id, request.enabled).await?;
    Ok(Json(rule))
}

/// Build validation rule routes
pub fn rule_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/constructions/:construction_id/validation-rules",
            get(get_validation_rules).post(create_validation_rule),
        )
        .route(
            "/api/constructions/:construction_id/validation-rules/defaults",
            post(seed_default_rules),
        )
        .route(
            "/api/validation-rules/:rule_id",
            patch(update_validation_rule).delete(delete_validation_rule),
        )
        .route(
            "/api/validation-rules/:rule_id/toggle",
            post(toggle_validation_rule),
        )
}
