use axum::Json;
use axum::extract::State;

use super::auth::AuthUser;
use super::server::AppState;
use crate::db::now_local;
use crate::error::ApiResult;
use crate::types::Stats;

pub async fn get_stats(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Stats>> {
    Ok(Json(state.db.get_stats(user.id, now_local())?))
}
