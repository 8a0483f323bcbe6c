use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::auth::require_admin;
use crate::error::GatewayError;
use crate::health::ProbeError;
use crate::logging::{HealthStatus, Provider};
use crate::server::AppState;

const MAPPING_HISTORY_LIMIT: i64 = 10;

/// Provider as shown to admins; the config blob (and its key) stays out.
#[derive(Debug, Serialize)]
pub struct ProviderHealthView {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub enabled: bool,
    pub priority: i64,
    pub weight: i64,
    pub health_status: HealthStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub latency_ms: Option<i64>,
    pub last_status_code: Option<u16>,
}

impl From<Provider> for ProviderHealthView {
    fn from(p: Provider) -> Self {
        Self {
            id: p.id,
            name: p.name,
            provider_type: p.provider_type,
            enabled: p.enabled,
            priority: p.priority,
            weight: p.weight,
            health_status: p.health_status,
            last_checked: p.last_checked,
            latency_ms: p.latency_ms,
            last_status_code: p.last_status_code,
        }
    }
}

pub async fn check_provider(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<ProviderHealthView>, GatewayError> {
    require_admin(&headers, &app_state)?;
    app_state.prober.probe(id).await?;
    let provider = app_state
        .providers
        .get_provider(id)
        .await?
        .ok_or(GatewayError::Probe(ProbeError::NotFound(id)))?;
    Ok(Json(provider.into()))
}

pub async fn check_all_providers(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    require_admin(&headers, &app_state)?;
    let prober = app_state.prober.clone();
    // 立即返回，探测在后台并发进行
    tokio::spawn(async move {
        match prober.probe_all().await {
            Ok(batch) => {
                let results = batch.join().await;
                tracing::info!(probed = results.len(), "Triggered health check finished");
            }
            Err(e) => tracing::error!("Failed to start health checks: {}", e),
        }
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "message": "Health check for all providers has been initiated."
        })),
    ))
}

#[derive(Debug, Serialize)]
pub struct AttemptSummary {
    pub status: &'static str,
    pub status_code: Option<u16>,
    pub latency_ms: i64,
    pub timestamp: DateTime<Utc>,
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MappingHealthView {
    pub mapping_id: i64,
    pub provider: String,
    pub provider_model: String,
    pub attempts: Vec<AttemptSummary>,
}

// 基于请求日志的历史视图：该映射最近 10 次调用
pub async fn mapping_health(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<MappingHealthView>, GatewayError> {
    require_admin(&headers, &app_state)?;
    let Some((mapping, provider)) = app_state.providers.get_mapping_with_provider(id).await? else {
        return Err(GatewayError::NotFound(format!("mapping {id}")));
    };
    let rows = app_state
        .log_store
        .recent_attempts(&provider, &mapping.provider_model, MAPPING_HISTORY_LIMIT)
        .await?;
    let attempts = rows
        .into_iter()
        .map(|r| AttemptSummary {
            status: if r.is_success { "success" } else { "error" },
            status_code: r.status_code,
            latency_ms: r.latency_ms,
            timestamp: r.timestamp,
            error_message: r.error_message,
        })
        .collect();
    Ok(Json(MappingHealthView {
        mapping_id: mapping.id,
        provider,
        provider_model: mapping.provider_model,
        attempts,
    }))
}

#[cfg(test)]
mod tests {
    use crate::logging::RequestLog;
    use crate::server::handlers::routes;
    use crate::test_support;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn admin(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, "Bearer admin-test-token")
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn trigger_probe_returns_updated_provider() {
        let (_dir, db) = test_support::temp_db().await;
        let upstream = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": [{"message": {"content": "pong"}}]})) }),
        );
        let base = test_support::spawn_upstream(upstream).await;
        let id = test_support::add_provider(&db, "p", "openai", &base, 0).await;
        let app = routes().with_state(test_support::test_state(&db).await);

        let resp = app
            .clone()
            .oneshot(admin("POST", &format!("/api/admin/health/providers/{id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let v = json_body(resp).await;
        assert_eq!(v["health_status"], "healthy");
        assert_eq!(v["last_status_code"], 200);
        assert!(v.get("config").is_none());

        let missing = app
            .clone()
            .oneshot(admin("POST", "/api/admin/health/providers/4242"))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let anon = Request::builder()
            .method("POST")
            .uri(format!("/api/admin/health/providers/{id}"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(anon).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn failed_probe_is_an_error_but_still_persisted() {
        let (_dir, db) = test_support::temp_db().await;
        let dead = test_support::dead_upstream().await;
        let id = test_support::add_provider(&db, "down", "openai", &dead, 0).await;
        let app = routes().with_state(test_support::test_state(&db).await);

        let resp = app
            .oneshot(admin("POST", &format!("/api/admin/health/providers/{id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(resp).await["error"].as_str().unwrap().contains("unreachable"));
        let p = db.get_provider(id).await.unwrap().unwrap();
        assert_eq!(p.health_status, crate::logging::HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn trigger_all_acknowledges_immediately() {
        let (_dir, db) = test_support::temp_db().await;
        let dead = test_support::dead_upstream().await;
        let id = test_support::add_provider(&db, "down", "openai", &dead, 0).await;
        let app = routes().with_state(test_support::test_state(&db).await);

        let resp = app.oneshot(admin("POST", "/api/admin/health/providers")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(
            json_body(resp).await["message"],
            "Health check for all providers has been initiated."
        );
        let db2 = db.clone();
        assert!(
            test_support::eventually(move || {
                let db = db2.clone();
                async move { db.get_provider(id).await.unwrap().unwrap().last_checked.is_some() }
            })
            .await
        );
    }

    #[tokio::test]
    async fn mapping_history_lists_recent_attempts() {
        let (_dir, db) = test_support::temp_db().await;
        let p = test_support::add_provider(&db, "acme", "openai", "http://127.0.0.1:1", 0).await;
        let mapping = test_support::map_model(&db, "m", p, "acme-m").await;
        for (i, status) in [Some(200), Some(503), None].into_iter().enumerate() {
            let log = RequestLog {
                provider: "acme".into(),
                provider_model: Some("acme-m".into()),
                status_code: status,
                is_success: status == Some(200),
                timestamp: chrono::Utc::now() + chrono::Duration::seconds(i as i64),
                ..test_support::sample_log("r")
            };
            db.log_request(&log).await.unwrap();
        }
        let app = routes().with_state(test_support::test_state(&db).await);

        let resp = app
            .clone()
            .oneshot(admin("GET", &format!("/api/admin/model-provider-mappings/{mapping}/health")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let v = json_body(resp).await;
        assert_eq!(v["provider"], "acme");
        let attempts = v["attempts"].as_array().unwrap();
        let statuses: Vec<_> = attempts.iter().map(|a| a["status"].as_str().unwrap()).collect();
        assert_eq!(statuses, vec!["error", "error", "success"]);

        let missing = app
            .oneshot(admin("GET", "/api/admin/model-provider-mappings/999/health"))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
