use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::header;

use super::chat_request::GatewayChatRequest;
use super::request_logging::{AttemptLogger, AttemptOutcome};
use super::storage_traits::RequestLogStore;
use crate::config::RoutingConfig;
use crate::error::{GatewayError, Result};
use crate::http_client::HttpClients;
use crate::logging::Candidate;
use crate::providers::{ProviderConfig, ProviderKind, apply_auth, build_request_body, build_url};
use crate::routing::ProviderResolver;

/// The upstream that agreed to serve the request. Its body has not been read.
#[derive(Debug)]
pub struct Dispatched {
    pub response: reqwest::Response,
    pub request_id: String,
    /// Log row of the successful attempt, for the usage backfill.
    pub log_id: String,
    pub provider: String,
    pub attempts: u32,
}

/// Why a single attempt did not produce a usable response.
#[derive(Debug)]
enum AttemptFailure {
    Config(String),
    Transport(String),
    Status { status: u16, retriable: bool },
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptFailure::Config(m) => write!(f, "config error: {m}"),
            AttemptFailure::Transport(m) => write!(f, "transport error: {m}"),
            AttemptFailure::Status { status, .. } => write!(f, "upstream returned status {status}"),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    resolver: ProviderResolver,
    log_store: Arc<dyn RequestLogStore>,
    http: HttpClients,
    routing: RoutingConfig,
}

impl Dispatcher {
    pub fn new(
        resolver: ProviderResolver,
        log_store: Arc<dyn RequestLogStore>,
        http: HttpClients,
        routing: RoutingConfig,
    ) -> Self {
        Self {
            resolver,
            log_store,
            http,
            routing,
        }
    }

    /// Try candidates one at a time in priority order until one answers 2xx.
    ///
    /// Each provider is tried at most once per call. Transport failures,
    /// config faults and statuses in the provider's retry set move on to the
    /// next candidate; any other status ends the request immediately.
    pub async fn dispatch(
        &self,
        request: &GatewayChatRequest,
        proxy_key: Option<&str>,
    ) -> Result<Dispatched> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let model = request.model();
        let caller_body = serde_json::to_string(request.body())?;
        let logger = AttemptLogger::new(
            self.log_store.as_ref(),
            &request_id,
            model,
            proxy_key,
            caller_body,
        );

        // 配置值过大时视为不设总时限
        let deadline = Instant::now().checked_add(self.routing.request_deadline());
        let max_attempts = self.routing.max_attempts.max(1);
        let mut excluded: HashSet<i64> = HashSet::new();
        let mut last_error: Option<String> = None;

        for attempt in 1..=max_attempts {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                tracing::warn!(request_id = %request_id, attempt, "Request deadline exceeded, giving up");
                last_error.get_or_insert_with(|| "request deadline exceeded".to_string());
                break;
            }

            let candidates = self.resolver.resolve(model, &excluded).await?;
            let Some(candidate) = candidates.into_iter().next() else {
                if attempt == 1 {
                    tracing::warn!(request_id = %request_id, model = %model, "No route for model");
                    return Err(GatewayError::NoRouteFound(model.to_string()));
                }
                break;
            };
            // 先加入排除集，保证同一请求内不会重复尝试同一供应商
            excluded.insert(candidate.provider.id);

            match self
                .attempt(&logger, attempt, request, &candidate, remaining)
                .await
            {
                Ok((log_id, response)) => {
                    return Ok(Dispatched {
                        response,
                        request_id: request_id.clone(),
                        log_id,
                        provider: candidate.provider.name.clone(),
                        attempts: attempt,
                    });
                }
                Err(AttemptFailure::Status {
                    status,
                    retriable: false,
                }) => {
                    tracing::error!(
                        request_id = %request_id,
                        provider = %candidate.provider.name,
                        status,
                        "Non-retriable upstream status"
                    );
                    return Err(GatewayError::NonRetriable {
                        provider: candidate.provider.name.clone(),
                        status,
                    });
                }
                Err(failure) => {
                    tracing::warn!(
                        request_id = %request_id,
                        attempt,
                        provider = %candidate.provider.name,
                        "Attempt failed, trying next provider: {}",
                        failure
                    );
                    last_error = Some(format!("provider {}: {}", candidate.provider.name, failure));
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| "no provider could be attempted".to_string());
        tracing::error!(request_id = %request_id, model = %model, "All attempts failed: {}", last_error);
        Err(GatewayError::NoProviderAvailable { last_error })
    }

    fn attempt_timeout(&self, cfg: &ProviderConfig, candidate: &Candidate, remaining: Duration) -> Duration {
        cfg.timeout()
            .or_else(|| {
                candidate
                    .model_timeout_secs
                    .filter(|t| *t > 0)
                    .map(Duration::from_secs)
            })
            .unwrap_or_else(|| self.routing.default_timeout())
            .min(remaining)
    }

    async fn attempt(
        &self,
        logger: &AttemptLogger<'_>,
        attempt: u32,
        request: &GatewayChatRequest,
        candidate: &Candidate,
        remaining: Duration,
    ) -> std::result::Result<(String, reqwest::Response), AttemptFailure> {
        let started_at = Utc::now();
        let start = Instant::now();
        let provider = &candidate.provider;

        let prepared = ProviderConfig::parse(&provider.config)
            .map_err(|e| e.to_string())
            .and_then(|cfg| {
                let base = cfg
                    .base_url()
                    .ok_or_else(|| "baseUrl is not configured for the provider".to_string())?
                    .to_string();
                Ok((cfg, base))
            })
            .and_then(|(cfg, base)| {
                let kind = ProviderKind::from_type_tag(&provider.provider_type);
                let url = build_url(kind, &base, cfg.chat_path.as_deref(), &candidate.provider_model);
                let body = build_request_body(request.body(), &candidate.provider_model)
                    .map_err(|e| e.to_string())?;
                Ok((cfg, kind, url, body))
            });

        let (cfg, kind, url, body) = match prepared {
            Ok(p) => p,
            Err(msg) => {
                logger
                    .record(
                        attempt,
                        candidate,
                        started_at,
                        start,
                        AttemptOutcome {
                            error_message: Some(msg.clone()),
                            ..Default::default()
                        },
                    )
                    .await;
                return Err(AttemptFailure::Config(msg));
            }
        };

        let timeout = self.attempt_timeout(&cfg, candidate, remaining);
        let logged_body = String::from_utf8_lossy(&body).into_owned();
        let mut builder = self
            .http
            .for_url(&url)
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json");
        if request.is_stream() {
            builder = builder.header(header::ACCEPT, "text/event-stream");
        }
        let builder = apply_auth(builder.body(body), kind, cfg.api_key());

        tracing::debug!(
            request_id = %logger.request_id(),
            attempt,
            provider = %provider.name,
            url = %url,
            timeout_ms = timeout.as_millis() as u64,
            "Sending upstream request"
        );

        // 超时只覆盖到响应头返回为止，流式响应体不受限制
        let sent = tokio::time::timeout(timeout, builder.send()).await;
        let response = match sent {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                let msg = e.to_string();
                self.record_transport(logger, attempt, candidate, started_at, start, &url, logged_body, &msg)
                    .await;
                return Err(AttemptFailure::Transport(msg));
            }
            Err(_) => {
                let msg = format!("timed out after {}ms", timeout.as_millis());
                self.record_transport(logger, attempt, candidate, started_at, start, &url, logged_body, &msg)
                    .await;
                return Err(AttemptFailure::Transport(msg));
            }
        };

        let status = response.status().as_u16();
        if response.status().is_success() {
            let log_id = logger
                .record(
                    attempt,
                    candidate,
                    started_at,
                    start,
                    AttemptOutcome {
                        request_url: Some(url),
                        request_body: Some(logged_body),
                        status_code: Some(status),
                        ..Default::default()
                    },
                )
                .await;
            tracing::info!(
                attempt,
                provider = %provider.name,
                status,
                latency_ms = start.elapsed().as_millis() as u64,
                "Upstream accepted request"
            );
            return Ok((log_id, response));
        }

        // 失败响应体不转发给调用方，只读取后写入日志
        let remaining_for_body = timeout.saturating_sub(start.elapsed());
        let error_body = match tokio::time::timeout(remaining_for_body, response.bytes()).await {
            Ok(Ok(b)) => Some(String::from_utf8_lossy(&b).into_owned()),
            _ => None,
        };
        logger
            .record(
                attempt,
                candidate,
                started_at,
                start,
                AttemptOutcome {
                    request_url: Some(url),
                    request_body: Some(logged_body),
                    response_body: error_body,
                    status_code: Some(status),
                    error_message: Some(format!("upstream returned status {status}")),
                },
            )
            .await;

        Err(AttemptFailure::Status {
            status,
            retriable: cfg.is_retriable_status(status),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_transport(
        &self,
        logger: &AttemptLogger<'_>,
        attempt: u32,
        candidate: &Candidate,
        started_at: chrono::DateTime<Utc>,
        start: Instant,
        url: &str,
        request_body: String,
        msg: &str,
    ) {
        logger
            .record(
                attempt,
                candidate,
                started_at,
                start,
                AttemptOutcome {
                    request_url: Some(url.to_string()),
                    request_body: Some(request_body),
                    error_message: Some(msg.to_string()),
                    ..Default::default()
                },
            )
            .await;
    }
}
