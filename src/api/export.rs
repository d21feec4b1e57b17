use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::auth::AuthUser;
use super::server::AppState;
use crate::error::{ApiError, ApiResult};
use crate::export::{ExportFormat, render};

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    format: Option<String>,
}

/// Download all of the user's tasks as an attachment. Defaults to CSV.
pub async fn export_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ExportQuery>,
) -> ApiResult<impl IntoResponse> {
    let format = match query.format.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        Some(name) => ExportFormat::parse(name).ok_or_else(|| {
            ApiError::invalid_value(
                "format",
                format!("unsupported export format '{}': expected csv, json or markdown", name),
            )
        })?,
        None => ExportFormat::default(),
    };

    let tasks = state.db.all_tasks(user.id)?;
    let body = render(&tasks, format)?;

    Ok((
        [
            (CONTENT_TYPE, format.content_type().to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", format.file_name()),
            ),
        ],
        body,
    ))
}
