use chrono::{DateTime, Utc};
use std::time::Instant;

use super::storage_traits::RequestLogStore;
use super::usage::MAX_LOGGED_BODY_BYTES;
use super::util::truncate_for_log;
use crate::logging::{Candidate, RequestLog, TokenUsage};

/// What one attempt ended with, as far as the log row is concerned.
#[derive(Debug, Default)]
pub struct AttemptOutcome {
    pub request_url: Option<String>,
    /// Adapted upstream body; falls back to the caller's body when absent.
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

/// Fields shared by every attempt row of one logical request.
pub struct AttemptLogger<'a> {
    store: &'a dyn RequestLogStore,
    request_id: &'a str,
    model: &'a str,
    proxy_key: Option<&'a str>,
    caller_body: String,
}

impl<'a> AttemptLogger<'a> {
    pub fn new(
        store: &'a dyn RequestLogStore,
        request_id: &'a str,
        model: &'a str,
        proxy_key: Option<&'a str>,
        caller_body: String,
    ) -> Self {
        Self {
            store,
            request_id,
            model,
            proxy_key,
            caller_body,
        }
    }

    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// 写入一次尝试的日志行并返回其 id；写库失败只记录错误，不影响请求
    pub async fn record(
        &self,
        attempt: u32,
        candidate: &Candidate,
        started_at: DateTime<Utc>,
        start: Instant,
        outcome: AttemptOutcome,
    ) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let is_success = outcome
            .status_code
            .is_some_and(|s| (200..300).contains(&s));
        let request_body = outcome
            .request_body
            .unwrap_or_else(|| self.caller_body.clone());
        let log = RequestLog {
            id: id.clone(),
            request_id: self.request_id.to_string(),
            attempt,
            timestamp: started_at,
            proxy_key: self.proxy_key.map(str::to_string),
            model: self.model.to_string(),
            provider_model: Some(candidate.provider_model.clone()),
            provider: candidate.provider.name.clone(),
            provider_id: candidate.provider.id,
            request_url: outcome.request_url,
            request_body: Some(truncate_for_log(&request_body, MAX_LOGGED_BODY_BYTES)),
            response_body: outcome
                .response_body
                .map(|b| truncate_for_log(&b, MAX_LOGGED_BODY_BYTES)),
            status_code: outcome.status_code,
            is_success,
            latency_ms: i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX),
            error_message: outcome.error_message,
            usage: TokenUsage::default(),
        };

        if let Err(e) = self.store.log_request(&log).await {
            tracing::error!(request_id = %self.request_id, "Failed to log request attempt: {}", e);
        }
        id
    }
}
