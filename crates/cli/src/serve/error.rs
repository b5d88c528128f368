//! Mapping of coordinator errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use planta_coordinator::CoordinatorError;
use planta_storage::StoreError;

/// Handler error: renders a `CoordinatorError` as a JSON body with a status
/// code callers can branch on.
pub(crate) struct ApiError(pub(crate) CoordinatorError);

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        let (status, body) = match self.0 {
            CoordinatorError::NotFound { kind, id } => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": message, "kind": kind, "id": id }),
            ),
            CoordinatorError::Forbidden(denial) => (
                StatusCode::FORBIDDEN,
                serde_json::json!({ "error": message, "denial": denial }),
            ),
            CoordinatorError::IncompleteChecklist { missing } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::json!({ "error": message, "missing": missing }),
            ),
            CoordinatorError::ShiftAlreadyActive {
                shift_id,
                owner,
                started_at,
            } => (
                StatusCode::CONFLICT,
                serde_json::json!({
                    "error": message,
                    "shift_id": shift_id,
                    "owner": owner,
                    "started_at": started_at,
                }),
            ),
            CoordinatorError::ShiftAlreadyClosed { shift_id, ended_at } => (
                StatusCode::CONFLICT,
                serde_json::json!({
                    "error": message,
                    "shift_id": shift_id,
                    "ended_at": ended_at,
                }),
            ),
            CoordinatorError::InvalidReadings { field, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::json!({ "error": message, "field": field }),
            ),
            CoordinatorError::PartialWriteInconsistency {
                equipment_id,
                state_record_id,
                ..
            } => {
                tracing::error!(
                    %equipment_id,
                    %state_record_id,
                    "partial write surfaced to client"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({
                        "error": message,
                        "equipment_id": equipment_id,
                        "state_record_id": state_record_id,
                    }),
                )
            }
            CoordinatorError::MalformedRecord { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": message }),
            ),
            CoordinatorError::Store(err) => {
                (store_status(&err), serde_json::json!({ "error": message }))
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Upstream store failures are a bad gateway unless the store said the
/// record does not exist.
fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: CoordinatorError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn statuses_by_variant() {
        assert_eq!(
            status_of(CoordinatorError::IncompleteChecklist { missing: vec![] }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(CoordinatorError::ShiftAlreadyClosed {
                shift_id: "recS".to_string(),
                ended_at: "2026-05-01T14:00:00.000Z".to_string(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CoordinatorError::InvalidReadings {
                field: "horometer",
                value: f64::NAN,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(CoordinatorError::Store(StoreError::Status {
                status: 503,
                message: "down".to_string(),
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(CoordinatorError::NotFound {
                kind: "equipment",
                id: "motor-9".to_string(),
            }),
            StatusCode::NOT_FOUND
        );
    }
}
