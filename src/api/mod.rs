//! HTTP API.
//!
//! An axum router over the task store, the parser and the priority scorer.
//! Every route except health, register and login requires a bearer token.

mod auth;
mod export;
mod extract;
mod server;
mod stats;
mod subtasks;
mod tasks;

pub use auth::AuthUser;
pub use extract::ApiJson;
pub use server::{AppState, build_router, start_server};
