use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    Unknown,
}

impl HealthStatus {
    pub fn from_db_value(value: Option<&str>) -> Self {
        match value.unwrap_or_default().to_ascii_lowercase().as_str() {
            "healthy" => Self::Healthy,
            "degraded" => Self::Degraded,
            "unhealthy" => Self::Unhealthy,
            _ => Self::Unknown,
        }
    }

    pub fn as_db_value(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_value())
    }
}

/// A configured upstream account. `config` is the raw JSON blob holding the
/// credential, base URL and optional chat path / retry policy.
#[derive(Debug, Clone)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub provider_type: String,
    pub config: String,
    pub enabled: bool,
    pub priority: i64,
    pub weight: i64,
    pub health_status: HealthStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub latency_ms: Option<i64>,
    pub last_status_code: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Model {
    pub id: i64,
    pub name: String,
    pub remark: Option<String>,
    pub max_retry: i64,
    pub timeout_secs: Option<u64>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelProviderMapping {
    pub id: i64,
    pub model_id: i64,
    pub provider_id: i64,
    pub provider_model: String,
    pub weight: i64,
    pub enabled: bool,
    pub tool_call: bool,
    pub structured_output: bool,
    pub image: bool,
}

#[derive(Debug, Clone)]
pub struct ProxyKey {
    pub id: i64,
    pub key: String,
    pub enabled: bool,
    pub allowed_groups: Option<String>,
    pub rpm_limit: Option<i64>,
    pub tpm_limit: Option<i64>,
}

/// One (Provider, provider-side model id) pair eligible to serve a logical model.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub provider: Provider,
    pub provider_model: String,
    pub mapping_weight: i64,
    pub model_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Health fields written back by every probe, whatever its outcome.
#[derive(Debug, Clone)]
pub struct HealthUpdate {
    pub status: HealthStatus,
    pub latency_ms: Option<i64>,
    pub last_status_code: Option<u16>,
    pub checked_at: DateTime<Utc>,
}

/// One row per dispatch attempt.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLog {
    pub id: String,
    pub request_id: String,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub proxy_key: Option<String>,
    pub model: String,
    pub provider_model: Option<String>,
    pub provider: String,
    pub provider_id: i64,
    pub request_url: Option<String>,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub status_code: Option<u16>,
    pub is_success: bool,
    pub latency_ms: i64,
    pub error_message: Option<String>,
    pub usage: TokenUsage,
}

// 创建映射/供应商等记录时使用的输入类型
#[derive(Debug, Clone)]
pub struct NewProvider {
    pub name: String,
    pub provider_type: String,
    pub config: String,
    pub enabled: bool,
    pub priority: i64,
    pub weight: i64,
}

#[derive(Debug, Clone)]
pub struct NewModel {
    pub name: String,
    pub remark: Option<String>,
    pub max_retry: i64,
    pub timeout_secs: Option<u64>,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct NewMapping {
    pub model_id: i64,
    pub provider_id: i64,
    pub provider_model: String,
    pub weight: i64,
    pub enabled: bool,
    pub tool_call: bool,
    pub structured_output: bool,
    pub image: bool,
}
