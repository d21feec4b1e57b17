//! Task handlers: parsing, CRUD, listing and progress notes.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::auth::AuthUser;
use super::extract::{ApiJson, non_empty};
use super::server::AppState;
use crate::db::now_local;
use crate::error::{ApiError, ApiResult};
use crate::parser::{ParsedTask, parse_datetime, parse_task_text};
use crate::scorer::ScoreInput;
use crate::types::{
    NewTask, Priority, ProgressLog, Task, TaskFilter, TaskPatch, TaskStatus, TaskView,
    double_option,
};

pub(super) fn parse_status(value: &str) -> ApiResult<TaskStatus> {
    TaskStatus::parse(value).ok_or_else(|| {
        ApiError::invalid_value(
            "status",
            format!(
                "invalid status '{}': expected pending, in_progress or completed",
                value
            ),
        )
    })
}

fn parse_priority(value: &str) -> ApiResult<Priority> {
    Priority::parse(value).ok_or_else(|| {
        ApiError::invalid_value(
            "priority",
            format!("invalid priority '{}': expected low, medium or high", value),
        )
    })
}

fn parse_date_field(field: &str, value: &str) -> ApiResult<NaiveDateTime> {
    parse_datetime(value).ok_or_else(|| {
        ApiError::invalid_value(field, format!("invalid {} '{}': expected ISO 8601", field, value))
    })
}

fn check_hours(hours: Option<f64>) -> ApiResult<Option<f64>> {
    match hours {
        Some(h) if !h.is_finite() || h < 0.0 => Err(ApiError::invalid_value(
            "estimated_hours",
            "estimated_hours must be a non-negative number",
        )),
        other => Ok(other),
    }
}

/// Score a task with the configured scorer.
async fn score(state: &AppState, task: &ScoreFields<'_>) -> f64 {
    let input = ScoreInput {
        title: task.title.to_string(),
        description: task.description.map(str::to_string),
        priority: task.priority,
        due_date: task.due_date,
        estimated_hours: task.estimated_hours,
        now: now_local(),
    };
    state.scorer.score(&input).await
}

struct ScoreFields<'a> {
    title: &'a str,
    description: Option<&'a str>,
    priority: Priority,
    due_date: Option<NaiveDateTime>,
    estimated_hours: Option<f64>,
}

impl<'a> From<&'a Task> for ScoreFields<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            title: &task.title,
            description: task.description.as_deref(),
            priority: task.priority,
            due_date: task.due_date,
            estimated_hours: task.estimated_hours,
        }
    }
}

impl<'a> From<&'a NewTask> for ScoreFields<'a> {
    fn from(task: &'a NewTask) -> Self {
        Self {
            title: &task.title,
            description: task.description.as_deref(),
            priority: task.priority,
            due_date: task.due_date,
            estimated_hours: task.estimated_hours,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    text: String,
}

pub async fn parse(
    _user: AuthUser,
    ApiJson(body): ApiJson<ParseRequest>,
) -> ApiResult<Json<ParsedTask>> {
    Ok(Json(parse_task_text(&body.text, now_local())))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    estimated_hours: Option<f64>,
    #[serde(default)]
    reminder_date: Option<String>,
    /// Titles of subtasks to create along with the task.
    #[serde(default)]
    subtasks: Vec<String>,
}

impl CreateTaskRequest {
    fn into_new_task(self) -> ApiResult<(NewTask, Vec<String>)> {
        let title = non_empty(self.title).ok_or_else(|| ApiError::missing_field("title"))?;
        let status = non_empty(self.status)
            .map(|s| parse_status(&s))
            .transpose()?
            .unwrap_or_default();
        let priority = non_empty(self.priority)
            .map(|p| parse_priority(&p))
            .transpose()?
            .unwrap_or_default();
        let due_date = non_empty(self.due_date)
            .map(|d| parse_date_field("due_date", &d))
            .transpose()?;
        let reminder_date = non_empty(self.reminder_date)
            .map(|d| parse_date_field("reminder_date", &d))
            .transpose()?;

        let subtasks = self
            .subtasks
            .into_iter()
            .filter_map(|t| non_empty(Some(t)))
            .collect();

        Ok((
            NewTask {
                title,
                description: non_empty(self.description),
                category: non_empty(self.category),
                status,
                priority,
                due_date,
                estimated_hours: check_hours(self.estimated_hours)?,
                reminder_date,
            },
            subtasks,
        ))
    }
}

pub async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let (new, subtasks) = body.into_new_task()?;
    let priority_score = score(&state, &ScoreFields::from(&new)).await;

    let (task, _) = state.db.create_task_with_subtasks(
        user.id,
        &new,
        &subtasks,
        priority_score,
        now_local(),
    )?;

    info!(task_id = task.id, user_id = user.id, priority_score, "Task created");
    Ok((StatusCode::CREATED, Json(json!({"id": task.id}))))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    status: Option<String>,
    priority: Option<String>,
    category: Option<String>,
    q: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> ApiResult<TaskFilter> {
        Ok(TaskFilter {
            status: non_empty(self.status)
                .map(|s| parse_status(&s))
                .transpose()?,
            priority: non_empty(self.priority)
                .map(|p| parse_priority(&p))
                .transpose()?,
            category: non_empty(self.category),
            search: non_empty(self.q),
        })
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let filter = query.into_filter()?;
    let tasks = state.db.list_tasks(user.id, &filter)?;
    let mut subtasks = state.db.subtasks_by_task(user.id)?;
    let now = now_local();

    let views = tasks
        .into_iter()
        .map(|task| TaskView {
            overdue: task.is_overdue(now),
            subtasks: subtasks.remove(&task.id).unwrap_or_default(),
            task,
        })
        .collect();
    Ok(Json(views))
}

fn load_task(state: &AppState, user: AuthUser, task_id: i64) -> ApiResult<Task> {
    state
        .db
        .get_task(user.id, task_id)?
        .ok_or_else(|| ApiError::task_not_found(task_id))
}

pub async fn get_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<TaskView>> {
    let task = load_task(&state, user, task_id)?;
    let subtasks = state.db.list_subtasks(user.id, task_id)?;
    Ok(Json(TaskView {
        overdue: task.is_overdue(now_local()),
        subtasks,
        task,
    }))
}

/// Partial update. Absent fields are kept; `null` clears nullable ones.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    category: Option<Option<String>>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    estimated_hours: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    reminder_date: Option<Option<String>>,
}

impl UpdateTaskRequest {
    fn into_patch(self) -> ApiResult<TaskPatch> {
        let title = match self.title {
            Some(t) => Some(non_empty(Some(t)).ok_or_else(|| ApiError::missing_field("title"))?),
            None => None,
        };
        let date = |field: &str, value: Option<Option<String>>| -> ApiResult<_> {
            value
                .map(|v| non_empty(v).map(|d| parse_date_field(field, &d)).transpose())
                .transpose()
        };

        Ok(TaskPatch {
            title,
            description: self.description.map(non_empty),
            category: self.category.map(non_empty),
            status: self.status.map(|s| parse_status(&s)).transpose()?,
            priority: self.priority.map(|p| parse_priority(&p)).transpose()?,
            due_date: date("due_date", self.due_date)?,
            estimated_hours: self
                .estimated_hours
                .map(check_hours)
                .transpose()?,
            reminder_date: date("reminder_date", self.reminder_date)?,
        })
    }
}

pub async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
    ApiJson(body): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let patch = body.into_patch()?;
    let mut task = load_task(&state, user, task_id)?;

    let reminder_changed = patch.reminder_date.is_some();
    task.apply(patch);
    task.priority_score = score(&state, &ScoreFields::from(&task)).await;

    let saved = if reminder_changed {
        state.db.save_task_with_reminder(&task)?
    } else {
        state.db.save_task(&task)?
    };
    if !saved {
        return Err(ApiError::task_not_found(task_id));
    }
    debug!(task_id, priority_score = task.priority_score, "Task updated");
    Ok(Json(json!({"message": "updated"})))
}

pub async fn delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.db.delete_task(user.id, task_id)? {
        return Err(ApiError::task_not_found(task_id));
    }
    info!(task_id, user_id = user.id, "Task deleted");
    Ok(Json(json!({"message": "deleted"})))
}

pub async fn list_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<Vec<ProgressLog>>> {
    load_task(&state, user, task_id)?;
    Ok(Json(state.db.list_progress(user.id, task_id)?))
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
}

pub async fn add_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<i64>,
    ApiJson(body): ApiJson<ProgressRequest>,
) -> ApiResult<impl IntoResponse> {
    let note = non_empty(body.note);
    let progress = body.progress.unwrap_or(0.0);
    if note.is_none() && body.progress.is_none() {
        return Err(ApiError::missing_field("progress"));
    }

    let log = state
        .db
        .add_progress(user.id, task_id, note.as_deref(), progress, now_local())?
        .ok_or_else(|| ApiError::task_not_found(task_id))?;
    Ok((StatusCode::CREATED, Json(log)))
}
