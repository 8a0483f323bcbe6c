use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::header;
use tokio::task::JoinHandle;

use super::ProbeError;
use crate::http_client::HttpClients;
use crate::logging::{HealthStatus, HealthUpdate, Provider};
use crate::providers::{ProviderConfig, ProviderKind, apply_auth, build_url};
use crate::server::storage_traits::ProviderStore;

/// Result of one synthetic request before it is written back.
#[derive(Debug)]
struct ProbeOutcome {
    status: HealthStatus,
    latency_ms: Option<i64>,
    last_status_code: Option<u16>,
    error: Option<ProbeError>,
}

impl ProbeOutcome {
    fn failed(error: ProbeError, latency_ms: Option<i64>, last_status_code: Option<u16>) -> Self {
        Self {
            status: error.health_status(),
            latency_ms,
            last_status_code,
            error: Some(error),
        }
    }
}

/// Classify an HTTP answer to the probe. `body` is `None` when it could not
/// be read.
pub fn classify_response(kind: ProviderKind, status: u16, body: Option<&[u8]>) -> Result<(), ProbeError> {
    match status {
        401 | 403 => Err(ProbeError::AuthRejected(status)),
        200..=299 => {
            let parsed = body.and_then(|b| serde_json::from_slice::<serde_json::Value>(b).ok());
            match parsed.as_ref().and_then(|v| kind.probe_content(v)) {
                Some(_) => Ok(()),
                None => Err(ProbeError::Unusable),
            }
        }
        _ => Err(ProbeError::Status(status)),
    }
}

#[derive(Clone)]
pub struct HealthProber {
    store: Arc<dyn ProviderStore>,
    http: HttpClients,
    timeout: Duration,
}

/// Probes started by `probe_all`; dropping it leaves them running.
pub struct ProbeBatch {
    pub handles: Vec<(i64, JoinHandle<Result<HealthStatus, ProbeError>>)>,
}

impl ProbeBatch {
    pub async fn join(self) -> Vec<(i64, Result<HealthStatus, ProbeError>)> {
        let mut out = Vec::with_capacity(self.handles.len());
        for (id, handle) in self.handles {
            match handle.await {
                Ok(res) => out.push((id, res)),
                Err(e) => tracing::error!(provider_id = id, "Health probe task failed: {}", e),
            }
        }
        out
    }
}

impl HealthProber {
    pub fn new(store: Arc<dyn ProviderStore>, http: HttpClients, timeout: Duration) -> Self {
        Self {
            store,
            http,
            timeout,
        }
    }

    /// Probe one provider and persist the outcome.
    ///
    /// Health fields are written on every path. Degraded and unhealthy
    /// results come back as `Err` so the trigger can report them.
    pub async fn probe(&self, provider_id: i64) -> Result<HealthStatus, ProbeError> {
        let provider = self
            .store
            .get_provider(provider_id)
            .await?
            .ok_or(ProbeError::NotFound(provider_id))?;

        let outcome = self.check(&provider).await;
        let update = HealthUpdate {
            status: outcome.status,
            latency_ms: outcome.latency_ms,
            last_status_code: outcome.last_status_code,
            checked_at: Utc::now(),
        };
        self.store.update_provider_health(provider.id, &update).await?;

        match &outcome.error {
            None => tracing::info!(
                provider_id = provider.id,
                provider = %provider.name,
                status = %outcome.status,
                latency_ms = ?outcome.latency_ms,
                "Health probe finished"
            ),
            Some(e) => tracing::warn!(
                provider_id = provider.id,
                provider = %provider.name,
                status = %outcome.status,
                latency_ms = ?outcome.latency_ms,
                "Health probe failed: {}",
                e
            ),
        }

        match outcome.error {
            Some(e) => Err(e),
            None => Ok(outcome.status),
        }
    }

    async fn check(&self, provider: &Provider) -> ProbeOutcome {
        let cfg = match ProviderConfig::parse(&provider.config) {
            Ok(cfg) => cfg,
            Err(e) => return ProbeOutcome::failed(ProbeError::Config(e.to_string()), None, None),
        };
        // 缺少 baseUrl 属于配置未完成，不发请求；上次的延迟和状态码保持不变
        let Some(base_url) = cfg.base_url() else {
            return ProbeOutcome {
                status: HealthStatus::Unknown,
                latency_ms: provider.latency_ms,
                last_status_code: provider.last_status_code,
                error: None,
            };
        };

        let kind = ProviderKind::from_type_tag(&provider.provider_type);
        let model = kind.probe_model();
        let url = build_url(kind, base_url, cfg.chat_path.as_deref(), model);
        let builder = self
            .http
            .for_url(&url)
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&kind.probe_payload());
        let builder = apply_auth(builder, kind, cfg.api_key());

        let start = Instant::now();
        let response = match tokio::time::timeout(self.timeout, builder.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return ProbeOutcome::failed(ProbeError::Transport(e.to_string()), None, None),
            Err(_) => {
                let msg = format!("timed out after {}s", self.timeout.as_secs());
                return ProbeOutcome::failed(ProbeError::Transport(msg), None, None);
            }
        };

        // 延迟只算到响应头返回，读取响应体不计入
        let latency_ms = Some(i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX));
        let status = response.status().as_u16();
        let remaining = self.timeout.saturating_sub(start.elapsed());
        let body = match tokio::time::timeout(remaining, response.bytes()).await {
            Ok(Ok(b)) => Some(b),
            _ => None,
        };

        match classify_response(kind, status, body.as_deref()) {
            Ok(()) => ProbeOutcome {
                status: HealthStatus::Healthy,
                latency_ms,
                last_status_code: Some(status),
                error: None,
            },
            Err(e) => ProbeOutcome::failed(e, latency_ms, Some(status)),
        }
    }

    /// Start one independent probe task per provider and return immediately.
    pub async fn probe_all(&self) -> Result<ProbeBatch, ProbeError> {
        let providers = self.store.list_providers().await?;
        tracing::info!(count = providers.len(), "Starting health probes for all providers");
        let handles = providers
            .into_iter()
            .map(|p| {
                let prober = self.clone();
                (p.id, tokio::spawn(async move { prober.probe(p.id).await }))
            })
            .collect();
        Ok(ProbeBatch { handles })
    }
}
