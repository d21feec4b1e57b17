//! Registration, login and the authenticated-user extractor.

use axum::extract::{FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::extract::{ApiJson, non_empty};
use super::server::AppState;
use crate::auth::{hash_password, verify_password};
use crate::db::now_local;
use crate::error::{ApiError, ApiResult, ErrorCode};

/// The user a request is made on behalf of, from `Authorization: Bearer`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::unauthorized("expected a bearer token"))?;

        let user_id = state.tokens.verify(token).map_err(|e| {
            debug!("Rejected token: {}", e);
            ApiError::unauthorized(e.to_string())
        })?;

        // Tokens outlive deleted accounts.
        if state.db.get_user(user_id)?.is_none() {
            return Err(ApiError::unauthorized("unknown user"));
        }
        Ok(AuthUser { id: user_id })
    }
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl Credentials {
    fn required(self) -> ApiResult<(String, String)> {
        let email = non_empty(self.email).map(|e| e.to_lowercase());
        let password = self.password.filter(|p| !p.is_empty());
        match (email, password) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(ApiError::new(
                ErrorCode::MissingRequiredField,
                "email and password required",
            )),
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Credentials>,
) -> ApiResult<impl IntoResponse> {
    let (email, password) = body.required()?;

    if state.db.get_user_by_email(&email)?.is_some() {
        return Err(ApiError::already_exists("email already registered"));
    }

    // PBKDF2 is CPU-bound.
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::internal)?;

    let user = state
        .db
        .create_user(&email, &hash, now_local())?
        .ok_or_else(|| ApiError::already_exists("email already registered"))?;

    info!(user_id = user.id, "User registered");
    Ok((StatusCode::CREATED, Json(json!({"message": "registered"}))))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Credentials>,
) -> ApiResult<impl IntoResponse> {
    let (email, password) = body.required()?;

    let Some(user) = state.db.get_user_by_email(&email)? else {
        return Err(ApiError::invalid_credentials());
    };

    let stored = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;
    if !valid {
        return Err(ApiError::invalid_credentials());
    }

    let token = state.tokens.issue(user.id).map_err(ApiError::internal)?;
    Ok(Json(json!({"access_token": token})))
}
