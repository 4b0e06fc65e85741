//! `GET /operations/{operationId}`: poll an async mutation.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::{ApiError, AppState};
use crate::service::{operation_status, StatusOutcome};

/// 202 with the record while processing, 200 once terminal, 404 when the id
/// is unknown, expired, or malformed.
pub async fn operation_status_handler(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
) -> Result<Response, ApiError> {
    let outcome = operation_status(state.services.operations.as_ref(), &operation_id).await?;
    let status = outcome.http_status();
    match outcome {
        StatusOutcome::NotFound => Err(ApiError::NotFound("Operation not found".into())),
        StatusOutcome::InProgress(op) | StatusOutcome::Terminal(op) => {
            Ok((status, Json(op)).into_response())
        }
    }
}
