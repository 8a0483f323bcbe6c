use axum::{Json, extract::State, http::HeaderMap};
use serde::Serialize;
use std::sync::Arc;

use super::auth::validate_proxy_key;
use crate::error::GatewayError;
use crate::server::AppState;

pub const MODEL_OWNER: &str = "llm-fusion-engine";

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelEntry>,
}

// OpenAI 兼容的模型列表，只列出启用的逻辑模型
pub async fn list_models(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ModelList>, GatewayError> {
    validate_proxy_key(app_state.proxy_keys.as_ref(), &headers).await?;
    let models = app_state.providers.list_models().await?;
    let data = models
        .into_iter()
        .map(|m| ModelEntry {
            id: m.name,
            object: "model",
            created: m.created_at.timestamp(),
            owned_by: MODEL_OWNER,
        })
        .collect();
    Ok(Json(ModelList {
        object: "list",
        data,
    }))
}
