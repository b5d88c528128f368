//! Equipment routes: listing, power state, history, monitoring ledger.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use planta_coordinator::monitoring::check_continuity;
use planta_coordinator::{Operator, PowerState, Readings, StartupChecklist};
use serde::Deserialize;

use super::error::ApiError;
use super::handlers::LimitParams;
use super::json_error;
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct SetStateBody {
    operator: Operator,
    /// "Encendido"/"Apagado" or "on"/"off".
    state: String,
    #[serde(default)]
    checklist: Option<StartupChecklist>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MonitoringBody {
    operator: Operator,
    readings: Readings,
}

/// GET /equipment
pub(crate) async fn handle_list_equipment(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let equipment = state.coordinator.equipment().list_equipment().await?;
    Ok(Json(serde_json::json!({ "equipment": equipment })))
}

/// GET /equipment/{id}/state
pub(crate) async fn handle_current_state(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let equipment = state.coordinator.equipment().get_equipment(&id).await?;
    let current = state.coordinator.equipment().get_current_state(&id).await?;
    Ok(Json(serde_json::json!({
        "equipment": equipment,
        "current": current,
    })))
}

/// POST /equipment/{id}/state
pub(crate) async fn handle_set_state(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SetStateBody>,
) -> Result<axum::response::Response, ApiError> {
    let target = match body.state.parse::<PowerState>() {
        Ok(target) => target,
        Err(msg) => return Ok(json_error(StatusCode::BAD_REQUEST, &msg).into_response()),
    };
    let transition = state
        .coordinator
        .equipment()
        .set_state(
            &id,
            target,
            &body.operator,
            body.checklist.as_ref(),
            body.notes.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(transition)).into_response())
}

/// GET /equipment/{id}/history?limit=N
pub(crate) async fn handle_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, ApiError> {
    state.coordinator.equipment().get_equipment(&id).await?;
    let history = state
        .coordinator
        .equipment()
        .history(&id, params.limit)
        .await?;
    Ok(Json(serde_json::json!({ "equipment_id": id, "history": history })))
}

/// POST /equipment/{id}/monitoring
pub(crate) async fn handle_record_monitoring(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<MonitoringBody>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .coordinator
        .record_monitoring(&body.operator, &id, body.readings)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /equipment/{id}/monitoring
pub(crate) async fn handle_ledger(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.coordinator.equipment().get_equipment(&id).await?;
    let ledger = state.coordinator.monitoring().ledger(&id).await?;
    let report = check_continuity(&id, &ledger);
    Ok(Json(serde_json::json!({
        "intervals": ledger,
        "report": report,
    })))
}
