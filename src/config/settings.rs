use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub routing: RoutingConfig,
    pub health: HealthConfig,
    /// 启动时写入存储的供应商（按名称 upsert，不覆盖健康字段）
    pub providers: BTreeMap<String, ProviderSeed>,
    pub models: BTreeMap<String, ModelSeed>,
    pub proxy_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 管理接口令牌；为空时每次启动随机生成
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            admin_token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyLogStrategy {
    None,
    Masked,
    Plain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub database_path: String,
    pub key_log_strategy: Option<KeyLogStrategy>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            database_path: "data/gateway.db".to_string(),
            key_log_strategy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub max_attempts: u32,
    pub request_deadline_secs: u64,
    pub default_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            request_deadline_secs: 300,
            default_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl RoutingConfig {
    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub probe_timeout_secs: u64,
    /// 设置后按固定间隔对所有供应商做健康检查
    pub interval_secs: Option<u64>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 10,
            interval_secs: None,
        }
    }
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSeed {
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_path: Option<String>,
    pub timeout: Option<u64>,
    pub retry_status_codes: Option<Vec<u16>>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_weight")]
    pub weight: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSeed {
    #[serde(default = "default_max_retry")]
    pub max_retry: i64,
    pub timeout: Option<u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub mappings: Vec<MappingSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSeed {
    pub provider: String,
    pub provider_model: String,
    #[serde(default = "default_weight")]
    pub weight: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub tool_call: bool,
    #[serde(default)]
    pub structured_output: bool,
    #[serde(default)]
    pub image: bool,
}

fn default_provider_type() -> String {
    "openai".to_string()
}

fn default_weight() -> i64 {
    1
}

fn default_max_retry() -> i64 {
    3
}

fn default_true() -> bool {
    true
}

impl Settings {
    pub fn load() -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let config_path = Self::find_config_file()?;
        let config_content = std::fs::read_to_string(&config_path)?;
        let settings = Self::from_toml_str(&config_content)?;
        tracing::info!("Loaded configuration from {}", config_path);
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| GatewayError::Config(e.to_string()))
    }

    fn find_config_file() -> std::result::Result<String, Box<dyn std::error::Error>> {
        if let Ok(path) = std::env::var("GATEWAY_CONFIG")
            && !path.trim().is_empty()
        {
            return Ok(path);
        }

        let possible_names = ["custom-config.toml", "config.toml"];

        for name in &possible_names {
            if Path::new(name).exists() {
                return Ok(name.to_string());
            }
        }

        Err("Configuration file not found. Please create custom-config.toml or config.toml".into())
    }
}
