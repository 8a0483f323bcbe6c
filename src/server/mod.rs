pub mod chat_request;
pub mod dispatch;
pub mod handlers;
pub mod relay;
pub(crate) mod request_logging;
pub mod storage_traits;
pub mod usage;
pub(crate) mod util;

use crate::config::Settings;
use crate::error::{GatewayError, Result as AppResult};
use crate::health::{HealthProber, spawn_health_scheduler};
use crate::http_client::HttpClients;
use crate::logging::DatabaseLogger;
use crate::routing::ProviderResolver;
use crate::server::dispatch::Dispatcher;
use crate::server::storage_traits::{ProviderStore, ProxyKeyStore, RequestLogStore};
use crate::server::usage::{UsageBackfill, spawn_usage_worker};
use axum::Router;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub log_store: Arc<dyn RequestLogStore>,
    pub providers: Arc<dyn ProviderStore>,
    pub proxy_keys: Arc<dyn ProxyKeyStore>,
    pub dispatcher: Dispatcher,
    pub usage: UsageBackfill,
    pub prober: HealthProber,
    pub admin_identity_token: String,
}

fn generate_admin_token() -> String {
    use rand::Rng;
    use rand::distr::Alphanumeric;
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(56)
        .map(char::from)
        .collect()
}

/// Wire the stores, HTTP clients, dispatcher, usage worker and prober
/// together. Must be called inside a Tokio runtime.
pub fn build_state(config: Settings, db: Arc<DatabaseLogger>) -> AppResult<AppState> {
    let admin_identity_token = match config.server.admin_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => {
            let token = generate_admin_token();
            tracing::info!("Admin Identity Token (use as Bearer): {}", token);
            token
        }
    };

    let http = HttpClients::new(config.routing.connect_timeout())
        .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))?;

    let providers: Arc<dyn ProviderStore> = db.clone();
    let proxy_keys: Arc<dyn ProxyKeyStore> = db.clone();
    let log_store: Arc<dyn RequestLogStore> = db;

    let dispatcher = Dispatcher::new(
        ProviderResolver::new(providers.clone()),
        log_store.clone(),
        http.clone(),
        config.routing.clone(),
    );
    let prober = HealthProber::new(providers.clone(), http, config.health.probe_timeout());
    let (usage, _worker) = spawn_usage_worker(log_store.clone());

    Ok(AppState {
        config: Arc::new(config),
        log_store,
        providers,
        proxy_keys,
        dispatcher,
        usage,
        prober,
        admin_identity_token,
    })
}

pub async fn create_app(config: Settings) -> AppResult<Router> {
    let db = Arc::new(DatabaseLogger::new(&config.logging.database_path).await?);
    db.apply_seed(&config).await?;

    let interval = config.health.interval();
    let app_state = build_state(config, db)?;
    if let Some(interval) = interval {
        spawn_health_scheduler(app_state.prober.clone(), interval);
    }

    let mut app = handlers::routes().with_state(Arc::new(app_state));

    // CORS（开发环境便于前端联调；生产应收敛来源）
    use axum::http::{Method, header};
    use tower_http::cors::{AllowOrigin, CorsLayer};
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(AllowOrigin::mirror_request())
        .expose_headers([header::HeaderName::from_static(handlers::REQUEST_ID_HEADER)]);
    app = app
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    Ok(app)
}
