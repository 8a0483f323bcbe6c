use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::server::AppState;

pub(crate) mod auth;
mod chat;
mod health;
mod logs;
mod models;

pub use chat::REQUEST_ID_HEADER;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/models", get(models::list_models))
        // Health checks
        .route(
            "/api/admin/health/providers",
            post(health::check_all_providers),
        )
        .route(
            "/api/admin/health/providers/{id}",
            post(health::check_provider),
        )
        .route(
            "/api/admin/model-provider-mappings/{id}/health",
            get(health::mapping_health),
        )
        // Request logs
        .route(
            "/api/admin/logs/requests/{request_id}",
            get(logs::request_attempts),
        )
}
