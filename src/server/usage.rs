use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::storage_traits::RequestLogStore;
use super::util::truncate_for_log;
use crate::logging::TokenUsage;

pub const MAX_LOGGED_BODY_BYTES: usize = 1024 * 1024;

fn token_field(u: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .find_map(|k| u.get(*k).and_then(Value::as_u64))
        .map(|x| u32::try_from(x).unwrap_or(u32::MAX))
}

/// Lenient read of a `usage` object; accepts both OpenAI and Anthropic names.
pub fn parse_usage_object(u: &Value) -> Option<TokenUsage> {
    if !u.is_object() {
        return None;
    }
    let prompt = token_field(u, &["prompt_tokens", "input_tokens"]);
    let completion = token_field(u, &["completion_tokens", "output_tokens"]);
    let total = token_field(u, &["total_tokens"]);
    if prompt.is_none() && completion.is_none() && total.is_none() {
        return None;
    }
    let prompt = prompt.unwrap_or(0);
    let completion = completion.unwrap_or(0);
    Some(TokenUsage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: total.unwrap_or(prompt.saturating_add(completion)),
    })
}

fn usage_in_payload(v: &Value) -> Option<TokenUsage> {
    v.get("usage")
        .and_then(parse_usage_object)
        .or_else(|| v.pointer("/message/usage").and_then(parse_usage_object))
}

/// Pull token counts out of a finished response body.
///
/// Event streams are scanned from the last line backwards and the first
/// `data:` payload carrying a usable `usage` object wins. Anything that does
/// not parse yields `None`.
pub fn extract_usage(body: &[u8], streaming: bool) -> Option<TokenUsage> {
    if !streaming {
        let v: Value = serde_json::from_slice(body).ok()?;
        return usage_in_payload(&v);
    }

    let text = String::from_utf8_lossy(body);
    for line in text.lines().rev() {
        let Some(payload) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let payload = payload.trim();
        if payload == "[DONE]" || !payload.contains("\"usage\"") {
            continue;
        }
        let Ok(v) = serde_json::from_str::<Value>(payload) else {
            continue;
        };
        if let Some(usage) = usage_in_payload(&v) {
            return Some(usage);
        }
    }
    None
}

/// A finished response waiting for its token counts to be written back.
#[derive(Debug)]
pub struct UsageJob {
    pub log_id: String,
    pub request_id: String,
    pub body: Bytes,
    pub streaming: bool,
}

/// Handle for queueing backfill work; the worker owns the store side.
#[derive(Clone)]
pub struct UsageBackfill {
    tx: mpsc::UnboundedSender<UsageJob>,
}

impl UsageBackfill {
    pub fn submit(&self, job: UsageJob) {
        if let Err(e) = self.tx.send(job) {
            tracing::warn!(log_id = %e.0.log_id, "Usage worker is gone, dropping backfill job");
        }
    }
}

pub async fn process_job(store: &dyn RequestLogStore, job: UsageJob) {
    let usage = extract_usage(&job.body, job.streaming).unwrap_or_default();
    let body = truncate_for_log(&String::from_utf8_lossy(&job.body), MAX_LOGGED_BODY_BYTES);
    match store.update_log_usage(&job.log_id, &usage, Some(&body)).await {
        Ok(true) => tracing::debug!(
            request_id = %job.request_id,
            log_id = %job.log_id,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "Recorded token usage"
        ),
        Ok(false) => tracing::debug!(log_id = %job.log_id, "Usage already recorded, skipping"),
        Err(e) => tracing::error!(log_id = %job.log_id, "Failed to record token usage: {}", e),
    }
}

/// 后台回填任务：发送端全部关闭后退出
pub fn spawn_usage_worker(store: Arc<dyn RequestLogStore>) -> (UsageBackfill, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<UsageJob>();
    let handle = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            process_job(store.as_ref(), job).await;
        }
    });
    (UsageBackfill { tx }, handle)
}
