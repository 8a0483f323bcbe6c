pub mod database;
pub mod database_keys;
pub mod database_providers;
pub mod database_seed;
pub mod time;
pub mod types;

pub use database::DatabaseLogger;
pub use types::{
    Candidate, HealthStatus, HealthUpdate, Model, ModelProviderMapping, Provider, ProxyKey,
    RequestLog, TokenUsage,
};
