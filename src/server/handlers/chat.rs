use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue},
    response::Response,
};
use std::sync::Arc;

use super::auth::validate_proxy_key;
use crate::error::GatewayError;
use crate::server::AppState;
use crate::server::chat_request::GatewayChatRequest;
use crate::server::relay::relay;
use crate::server::usage::UsageJob;
use crate::server::util::key_hint;

pub const REQUEST_ID_HEADER: &str = "x-gateway-request-id";

pub async fn chat_completions(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    // 先鉴权，未通过时不接触任何上游
    let key = validate_proxy_key(app_state.proxy_keys.as_ref(), &headers).await?;
    let request = GatewayChatRequest::from_slice(&body)?;
    let streaming = request.is_stream();
    let hint = key_hint(&app_state.config.logging, &key.key);

    let dispatched = app_state.dispatcher.dispatch(&request, hint.as_deref()).await?;

    let usage = app_state.usage.clone();
    let log_id = dispatched.log_id.clone();
    let request_id = dispatched.request_id.clone();
    let job_request_id = request_id.clone();
    let mut response = relay(dispatched.response, streaming, move |captured| {
        usage.submit(UsageJob {
            log_id,
            request_id: job_request_id,
            body: captured,
            streaming,
        });
    });
    if let Ok(v) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, v);
    }
    Ok(response)
}
