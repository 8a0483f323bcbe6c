//! Shared fixtures for unit tests: throwaway SQLite stores and mock upstreams.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use tempfile::TempDir;

use crate::config::{RoutingConfig, Settings};
use crate::http_client::HttpClients;
use crate::logging::types::{NewMapping, NewModel, NewProvider};
use crate::logging::{DatabaseLogger, RequestLog, TokenUsage};
use crate::routing::ProviderResolver;
use crate::server::AppState;
use crate::server::dispatch::Dispatcher;

pub const TEST_PROXY_KEY: &str = "sk-proxy-test-0001";

pub async fn temp_db() -> (TempDir, DatabaseLogger) {
    let dir = tempfile::tempdir().unwrap();
    let db = DatabaseLogger::new(dir.path().join("gateway.db").to_str().unwrap())
        .await
        .unwrap();
    (dir, db)
}

pub async fn add_provider_with_config(
    db: &DatabaseLogger,
    name: &str,
    provider_type: &str,
    config: &str,
    priority: i64,
) -> i64 {
    db.upsert_provider(&NewProvider {
        name: name.to_string(),
        provider_type: provider_type.to_string(),
        config: config.to_string(),
        enabled: true,
        priority,
        weight: 1,
    })
    .await
    .unwrap()
}

pub async fn add_provider(
    db: &DatabaseLogger,
    name: &str,
    provider_type: &str,
    base_url: &str,
    priority: i64,
) -> i64 {
    let config = serde_json::json!({ "apiKey": "sk-upstream", "baseUrl": base_url }).to_string();
    add_provider_with_config(db, name, provider_type, &config, priority).await
}

pub async fn map_model(db: &DatabaseLogger, model: &str, provider_id: i64, provider_model: &str) -> i64 {
    let model_id = match db.find_model(model).await.unwrap() {
        Some(m) => m.id,
        None => db
            .upsert_model(&NewModel {
                name: model.to_string(),
                remark: None,
                max_retry: 3,
                timeout_secs: None,
                enabled: true,
            })
            .await
            .unwrap(),
    };
    db.upsert_mapping(&NewMapping {
        model_id,
        provider_id,
        provider_model: provider_model.to_string(),
        weight: 1,
        enabled: true,
        tool_call: false,
        structured_output: false,
        image: false,
    })
    .await
    .unwrap()
}

pub fn sample_log(request_id: &str) -> RequestLog {
    RequestLog {
        id: uuid::Uuid::new_v4().to_string(),
        request_id: request_id.to_string(),
        attempt: 1,
        timestamp: Utc::now(),
        proxy_key: None,
        model: "gpt-4o".into(),
        provider_model: Some("gpt-4o".into()),
        provider: "p1".into(),
        provider_id: 1,
        request_url: None,
        request_body: None,
        response_body: None,
        status_code: Some(200),
        is_success: true,
        latency_ms: 1,
        error_message: None,
        usage: TokenUsage::default(),
    }
}

/// Serve `router` on an ephemeral loopback port and return its base URL.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// A base URL nothing listens on.
pub async fn dead_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn dispatcher(db: &DatabaseLogger, routing: RoutingConfig) -> Dispatcher {
    let store = Arc::new(db.clone());
    Dispatcher::new(
        ProviderResolver::new(store.clone()),
        store,
        HttpClients::new(Duration::from_secs(2)).unwrap(),
        routing,
    )
}

pub async fn test_state(db: &DatabaseLogger) -> Arc<AppState> {
    let mut settings = Settings::default();
    settings.server.admin_token = Some("admin-test-token".into());
    settings.health.probe_timeout_secs = 2;
    settings.routing.connect_timeout_secs = 2;
    settings.routing.default_timeout_secs = 5;
    db.insert_proxy_key(TEST_PROXY_KEY).await.unwrap();
    Arc::new(crate::server::build_state(settings, Arc::new(db.clone())).unwrap())
}

/// Poll `check` until it returns true or a couple of seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
