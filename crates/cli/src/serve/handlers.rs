//! Route handlers: health, checklist, shifts, authorization, reconciliation.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use planta_coordinator::{Operator, ShiftScopedAction, CHECKLIST_ITEMS};
use serde::Deserialize;

use super::error::ApiError;
use super::json_error;
use super::state::AppState;

const DEFAULT_SHIFT_LIST_LIMIT: usize = 20;

/// Body of every request made on behalf of an operator.
#[derive(Debug, Deserialize)]
pub(crate) struct OperatorBody {
    pub(crate) operator: Operator,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthorizeBody {
    operator: Operator,
    action: ShiftScopedAction,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LimitParams {
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReconcileParams {
    equipment: Option<String>,
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// GET /checklist
pub(crate) async fn handle_checklist() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "items": CHECKLIST_ITEMS })),
    )
}

/// GET /shifts?limit=N
pub(crate) async fn handle_list_shifts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_SHIFT_LIST_LIMIT);
    let shifts = state.coordinator.shifts().list_shifts(limit).await?;
    Ok(Json(serde_json::json!({ "shifts": shifts })))
}

/// GET /shifts/active
pub(crate) async fn handle_active_shift(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let active = state.coordinator.shifts().get_active_shift().await?;
    Ok(Json(serde_json::json!({ "active": active })))
}

/// POST /shifts
pub(crate) async fn handle_open_shift(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OperatorBody>,
) -> Result<impl IntoResponse, ApiError> {
    let shift = state
        .coordinator
        .shifts()
        .open_shift(&body.operator.id, &body.operator.name)
        .await?;
    Ok((StatusCode::CREATED, Json(shift)))
}

/// POST /shifts/{id}/close
pub(crate) async fn handle_close_shift(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<OperatorBody>,
) -> Result<impl IntoResponse, ApiError> {
    let shift = state
        .coordinator
        .shifts()
        .close_shift(&id, &body.operator.name)
        .await?;
    Ok(Json(shift))
}

/// POST /authorize
///
/// Always 200; the decision is in the body.
pub(crate) async fn handle_authorize(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AuthorizeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let decision = state
        .coordinator
        .authorize(&body.operator, body.action)
        .await?;
    Ok(Json(decision))
}

/// GET /reconcile/startups?equipment=ID
pub(crate) async fn handle_reconcile(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReconcileParams>,
) -> Result<impl IntoResponse, ApiError> {
    let unaudited = state
        .coordinator
        .find_unaudited_startups(params.equipment.as_deref())
        .await?;
    Ok(Json(serde_json::json!({
        "count": unaudited.len(),
        "unaudited": unaudited,
    })))
}
