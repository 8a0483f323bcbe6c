use std::future::Future;
use std::pin::Pin;

use crate::logging::{
    Candidate, DatabaseLogger, HealthUpdate, Model, ModelProviderMapping, Provider, ProxyKey,
    RequestLog, TokenUsage,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// 供应商/模型读取与健康字段回写（可由 SQLite 或其他存储实现）
pub trait ProviderStore: Send + Sync {
    fn list_candidates<'a>(&'a self, model: &'a str) -> BoxFuture<'a, rusqlite::Result<Vec<Candidate>>>;
    fn get_provider<'a>(&'a self, id: i64) -> BoxFuture<'a, rusqlite::Result<Option<Provider>>>;
    fn list_providers<'a>(&'a self) -> BoxFuture<'a, rusqlite::Result<Vec<Provider>>>;
    fn update_provider_health<'a>(&'a self, id: i64, update: &'a HealthUpdate) -> BoxFuture<'a, rusqlite::Result<bool>>;
    fn list_models<'a>(&'a self) -> BoxFuture<'a, rusqlite::Result<Vec<Model>>>;
    fn get_mapping_with_provider<'a>(&'a self, id: i64) -> BoxFuture<'a, rusqlite::Result<Option<(ModelProviderMapping, String)>>>;
}

pub trait ProxyKeyStore: Send + Sync {
    fn find_proxy_key<'a>(&'a self, key: &'a str) -> BoxFuture<'a, rusqlite::Result<Option<ProxyKey>>>;
}

// 请求日志：每次尝试写一行，完成后回填用量
pub trait RequestLogStore: Send + Sync {
    fn log_request<'a>(&'a self, log: &'a RequestLog) -> BoxFuture<'a, rusqlite::Result<()>>;
    fn update_log_usage<'a>(&'a self, id: &'a str, usage: &'a TokenUsage, response_body: Option<&'a str>) -> BoxFuture<'a, rusqlite::Result<bool>>;
    fn get_logs_for_request<'a>(&'a self, request_id: &'a str) -> BoxFuture<'a, rusqlite::Result<Vec<RequestLog>>>;
    fn recent_attempts<'a>(&'a self, provider: &'a str, provider_model: &'a str, limit: i64) -> BoxFuture<'a, rusqlite::Result<Vec<RequestLog>>>;
}

// DatabaseLogger 作为三种接口的默认实现
impl ProviderStore for DatabaseLogger {
    fn list_candidates<'a>(&'a self, model: &'a str) -> BoxFuture<'a, rusqlite::Result<Vec<Candidate>>> {
        Box::pin(async move { self.list_candidates(model).await })
    }

    fn get_provider<'a>(&'a self, id: i64) -> BoxFuture<'a, rusqlite::Result<Option<Provider>>> {
        Box::pin(async move { self.get_provider(id).await })
    }

    fn list_providers<'a>(&'a self) -> BoxFuture<'a, rusqlite::Result<Vec<Provider>>> {
        Box::pin(async move { self.list_providers().await })
    }

    fn update_provider_health<'a>(&'a self, id: i64, update: &'a HealthUpdate) -> BoxFuture<'a, rusqlite::Result<bool>> {
        Box::pin(async move { self.update_provider_health(id, update).await })
    }

    fn list_models<'a>(&'a self) -> BoxFuture<'a, rusqlite::Result<Vec<Model>>> {
        Box::pin(async move { self.list_models(true).await })
    }

    fn get_mapping_with_provider<'a>(&'a self, id: i64) -> BoxFuture<'a, rusqlite::Result<Option<(ModelProviderMapping, String)>>> {
        Box::pin(async move { self.get_mapping_with_provider(id).await })
    }
}

impl ProxyKeyStore for DatabaseLogger {
    fn find_proxy_key<'a>(&'a self, key: &'a str) -> BoxFuture<'a, rusqlite::Result<Option<ProxyKey>>> {
        Box::pin(async move { self.find_proxy_key(key).await })
    }
}

impl RequestLogStore for DatabaseLogger {
    fn log_request<'a>(&'a self, log: &'a RequestLog) -> BoxFuture<'a, rusqlite::Result<()>> {
        Box::pin(async move { self.log_request(log).await })
    }

    fn update_log_usage<'a>(&'a self, id: &'a str, usage: &'a TokenUsage, response_body: Option<&'a str>) -> BoxFuture<'a, rusqlite::Result<bool>> {
        Box::pin(async move { self.update_log_usage(id, usage, response_body).await })
    }

    fn get_logs_for_request<'a>(&'a self, request_id: &'a str) -> BoxFuture<'a, rusqlite::Result<Vec<RequestLog>>> {
        Box::pin(async move { self.get_logs_for_request(request_id).await })
    }

    fn recent_attempts<'a>(&'a self, provider: &'a str, provider_model: &'a str, limit: i64) -> BoxFuture<'a, rusqlite::Result<Vec<RequestLog>>> {
        Box::pin(async move { self.recent_attempts(provider, provider_model, limit).await })
    }
}
