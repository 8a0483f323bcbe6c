use axum::http::HeaderMap;

use crate::config::settings::{KeyLogStrategy, LoggingConfig};

// HTTP helpers
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let start: String = chars[..4].iter().collect();
    let end: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", start, end)
}

// 按配置的策略决定请求日志里记录的代理密钥形式（默认打码）
pub fn key_hint(cfg: &LoggingConfig, key: &str) -> Option<String> {
    match cfg.key_log_strategy.unwrap_or(KeyLogStrategy::Masked) {
        KeyLogStrategy::None => None,
        KeyLogStrategy::Plain => Some(key.to_string()),
        KeyLogStrategy::Masked => Some(mask_key(key)),
    }
}

/// Cut a logged body down to `limit` bytes on a char boundary.
pub fn truncate_for_log(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_string();
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = body[..end].to_string();
    out.push_str("...[truncated]");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_prefix_and_value() {
        let mut h = HeaderMap::new();
        assert_eq!(bearer_token(&h), None);
        h.insert("authorization", HeaderValue::from_static("Bearer sk-abc"));
        assert_eq!(bearer_token(&h).as_deref(), Some("sk-abc"));
        h.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&h), None);
        h.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&h), None);
    }

    #[test]
    fn key_hint_follows_strategy() {
        let mut cfg = LoggingConfig::default();
        assert_eq!(key_hint(&cfg, "sk-1234567890").as_deref(), Some("sk-1****7890"));
        assert_eq!(key_hint(&cfg, "short").as_deref(), Some("****"));
        cfg.key_log_strategy = Some(KeyLogStrategy::None);
        assert_eq!(key_hint(&cfg, "sk-1234567890"), None);
        cfg.key_log_strategy = Some(KeyLogStrategy::Plain);
        assert_eq!(key_hint(&cfg, "sk-1234567890").as_deref(), Some("sk-1234567890"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_for_log("abc", 10), "abc");
        let s = "ééé";
        let t = truncate_for_log(s, 3);
        assert!(t.starts_with('é'));
        assert!(t.ends_with("[truncated]"));
    }
}
