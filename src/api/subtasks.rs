use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use super::auth::AuthUser;
use super::extract::{ApiJson, non_empty};
use super::server::AppState;
use super::tasks::parse_status;
use crate::error::{ApiError, ApiResult};
use crate::types::Subtask;

pub async fn list_subtasks(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<Vec<Subtask>>> {
    if state.db.get_task(user.id, task_id)?.is_none() {
        return Err(ApiError::task_not_found(task_id));
    }
    Ok(Json(state.db.list_subtasks(user.id, task_id)?))
}

#[derive(Debug, Deserialize)]
pub struct SubtaskRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

pub async fn add_subtask(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
    ApiJson(body): ApiJson<SubtaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = non_empty(body.title).ok_or_else(|| ApiError::missing_field("title"))?;
    let status = non_empty(body.status)
        .map(|s| parse_status(&s))
        .transpose()?
        .unwrap_or_default();

    let subtask = state
        .db
        .add_subtask(user.id, task_id, &title, status)?
        .ok_or_else(|| ApiError::task_not_found(task_id))?;
    Ok((StatusCode::CREATED, Json(subtask)))
}

pub async fn update_subtask(
    State(state): State<AppState>,
    user: AuthUser,
    Path(subtask_id): Path<i64>,
    ApiJson(body): ApiJson<SubtaskRequest>,
) -> ApiResult<Json<Subtask>> {
    let title = match body.title {
        Some(t) => Some(non_empty(Some(t)).ok_or_else(|| ApiError::missing_field("title"))?),
        None => None,
    };
    let status = body.status.map(|s| parse_status(&s)).transpose()?;

    let subtask = state
        .db
        .update_subtask(user.id, subtask_id, title.as_deref(), status)?
        .ok_or_else(|| ApiError::subtask_not_found(subtask_id))?;
    Ok(Json(subtask))
}

pub async fn delete_subtask(
    State(state): State<AppState>,
    user: AuthUser,
    Path(subtask_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.db.delete_subtask(user.id, subtask_id)? {
        return Err(ApiError::subtask_not_found(subtask_id));
    }
    Ok(Json(json!({"message": "deleted"})))
}
