use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Default transient statuses that move the request on to the next candidate.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default)]
    pub status_codes: Vec<u16>,
}

/// Decoded form of `providers.config`. Unknown keys are ignored so the blob can
/// carry fields the gateway does not care about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_path: Option<String>,
    /// 秒
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

impl ProviderConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
            .map_err(|e| GatewayError::Config(format!("invalid provider config: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Base URL with surrounding whitespace removed; `None` when blank.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| *t > 0).map(Duration::from_secs)
    }

    /// 配置了非空 statusCodes 时以其为准，否则使用默认集合
    pub fn is_retriable_status(&self, status: u16) -> bool {
        match &self.retry_policy {
            Some(policy) if !policy.status_codes.is_empty() => {
                policy.status_codes.contains(&status)
            }
            _ => DEFAULT_RETRY_STATUS_CODES.contains(&status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_blob_and_ignores_unknown_keys() {
        let cfg = ProviderConfig::parse(
            r#"{"apiKey":" sk-1 ","baseUrl":"https://api.example.com/","chatPath":"/chat","timeout":12,
                "retryPolicy":{"statusCodes":[418]},"console":"https://console"}"#,
        )
        .unwrap();
        assert_eq!(cfg.api_key(), "sk-1");
        assert_eq!(cfg.base_url(), Some("https://api.example.com/"));
        assert_eq!(cfg.chat_path.as_deref(), Some("/chat"));
        assert_eq!(cfg.timeout(), Some(Duration::from_secs(12)));
        assert!(cfg.is_retriable_status(418));
        assert!(!cfg.is_retriable_status(503));
    }

    #[test]
    fn default_retry_set_applies_without_policy() {
        let cfg = ProviderConfig::parse(r#"{"baseUrl":"http://x"}"#).unwrap();
        for code in DEFAULT_RETRY_STATUS_CODES {
            assert!(cfg.is_retriable_status(code));
        }
        assert!(!cfg.is_retriable_status(400));
        assert!(!cfg.is_retriable_status(401));

        let empty = ProviderConfig::parse(r#"{"retryPolicy":{"statusCodes":[]}}"#).unwrap();
        assert!(empty.is_retriable_status(429));
    }

    #[test]
    fn blank_base_url_counts_as_missing() {
        let cfg = ProviderConfig::parse(r#"{"baseUrl":"  "}"#).unwrap();
        assert_eq!(cfg.base_url(), None);
        assert_eq!(ProviderConfig::parse("").unwrap().base_url(), None);
    }

    #[test]
    fn malformed_blob_is_a_config_error() {
        let err = ProviderConfig::parse("{not json").unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }
}
