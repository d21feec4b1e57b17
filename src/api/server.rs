//! Router construction and server startup.

use axum::{
    Json, Router,
    response::IntoResponse,
    routing::{get, patch, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{auth, export, stats, subtasks, tasks};
use crate::auth::TokenSigner;
use crate::db::Database;
use crate::scorer::PriorityScorer;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub scorer: Arc<dyn PriorityScorer>,
    pub tokens: Arc<TokenSigner>,
}

impl AppState {
    pub fn new(db: Arc<Database>, scorer: Arc<dyn PriorityScorer>, tokens: TokenSigner) -> Self {
        Self {
            db,
            scorer,
            tokens: Arc::new(tokens),
        }
    }
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        // Accounts
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        // Tasks
        .route("/api/parse", post(tasks::parse))
        .route("/api/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route(
            "/api/tasks/{id}/subtasks",
            get(subtasks::list_subtasks).post(subtasks::add_subtask),
        )
        .route(
            "/api/subtasks/{id}",
            patch(subtasks::update_subtask).delete(subtasks::delete_subtask),
        )
        .route(
            "/api/tasks/{id}/progress",
            get(tasks::list_progress).post(tasks::add_progress),
        )
        // Reporting
        .route("/api/stats", get(stats::get_stats))
        .route("/api/export", post(export::export_tasks))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on `host:port`.
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to. Port 0 picks a free port.
pub async fn start_server(
    state: AppState,
    host: &str,
    port: u16,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    let bound_addr = listener.local_addr()?;

    info!("API server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            })
            .await
        {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok",
            version: "0.1.0",
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"status":"ok","version":"0.1.0"}"#);
    }
}
