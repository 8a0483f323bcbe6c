use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use std::sync::Arc;

use super::auth::require_admin;
use crate::error::GatewayError;
use crate::logging::RequestLog;
use crate::server::AppState;

// 按逻辑请求 id 查询全部尝试记录（按尝试顺序）
pub async fn request_attempts(
    State(app_state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<RequestLog>>, GatewayError> {
    require_admin(&headers, &app_state)?;
    let rows = app_state.log_store.get_logs_for_request(&request_id).await?;
    if rows.is_empty() {
        return Err(GatewayError::NotFound(format!("request {request_id}")));
    }
    Ok(Json(rows))
}
