//! Resource CRUD handlers shared by every entity kind.
//!
//! The first path segment selects the [`ResourceKind`]; unknown segments are
//! 404 before any body is looked at.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use schedule_hub_core::{Entity, ResourceId, ResourceKind};
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::traits::ListFilter;

fn parse_kind(segment: &str) -> Result<ResourceKind, ApiError> {
    ResourceKind::from_path_segment(segment)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown resource `{segment}`")))
}

fn parse_id(raw: &str) -> Result<ResourceId, ApiError> {
    raw.parse::<ResourceId>()
        .map_err(|_| ApiError::BadRequest(format!("invalid id `{raw}`")))
}

fn body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    Ok(payload?.0)
}

pub async fn list_resources_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    filter: Result<Query<ListFilter>, QueryRejection>,
) -> Result<Json<Vec<Entity>>, ApiError> {
    let kind = parse_kind(&resource)?;
    let Query(filter) = filter?;
    Ok(Json(state.services.resources.list(kind, &filter).await?))
}

/// `GET /{resource}/users/{user_id}`: every row owned by one user.
pub async fn list_user_resources_handler(
    State(state): State<AppState>,
    Path((resource, user_id)): Path<(String, String)>,
) -> Result<Json<Vec<Entity>>, ApiError> {
    let kind = parse_kind(&resource)?;
    let filter = ListFilter::by_user(parse_id(&user_id)?);
    Ok(Json(state.services.resources.list(kind, &filter).await?))
}

pub async fn create_resource_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Entity>), ApiError> {
    let kind = parse_kind(&resource)?;
    let entity = state
        .services
        .resources
        .create(kind, &body(payload)?)
        .await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

pub async fn get_resource_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Entity>, ApiError> {
    let kind = parse_kind(&resource)?;
    Ok(Json(state.services.resources.get(kind, parse_id(&id)?).await?))
}

pub async fn update_resource_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Entity>, ApiError> {
    let kind = parse_kind(&resource)?;
    let id = parse_id(&id)?;
    let entity = state
        .services
        .resources
        .update(kind, id, &body(payload)?)
        .await?;
    Ok(Json(entity))
}

/// `PUT /{resource}/{id}/async`: acknowledge with 202 and a `Location` header
/// pointing at the operation status URL. The update runs after the response.
pub async fn update_resource_async_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let kind = parse_kind(&resource)?;
    let id = parse_id(&id)?;
    let submission = state
        .services
        .coordinator
        .submit(kind, id, body(payload)?)
        .await?;
    let ack = submission.ack;
    Ok((
        StatusCode::ACCEPTED,
        [(header::LOCATION, ack.status_url.clone())],
        Json(ack),
    )
        .into_response())
}

pub async fn cancel_resource_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Entity>, ApiError> {
    let kind = parse_kind(&resource)?;
    Ok(Json(state.services.resources.cancel(kind, parse_id(&id)?).await?))
}

pub async fn delete_resource_handler(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&resource)?;
    state.services.resources.delete(kind, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_user_resources_handler(
    State(state): State<AppState>,
    Path((resource, user_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(&resource)?;
    let deleted = state
        .services
        .resources
        .delete_for_user(kind, parse_id(&user_id)?)
        .await?;
    Ok(Json(json!({ "deleted": deleted })))
}
