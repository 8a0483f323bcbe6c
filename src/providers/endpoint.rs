use reqwest::RequestBuilder;
use serde_json::{Map, Value};

use super::ProviderKind;
use crate::error::Result;

const UNDEFINED_PLACEHOLDER: &str = "[undefined]";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Resolve the upstream completion URL.
///
/// In order: a base URL that already ends with the canonical path is used
/// as-is; a configured chat path is appended; a base URL ending in `/v1` gets
/// only the remainder of the canonical path; otherwise the canonical path is
/// appended.
pub fn build_url(kind: ProviderKind, base_url: &str, chat_path: Option<&str>, model: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let canonical = kind.canonical_path(model);

    if base.ends_with(&canonical) {
        return base.to_string();
    }

    if let Some(path) = chat_path.map(str::trim).filter(|p| !p.is_empty()) {
        if path.starts_with('/') {
            return format!("{base}{path}");
        }
        return format!("{base}/{path}");
    }

    if let Some(rest) = kind.path_after_v1()
        && base.ends_with("/v1")
    {
        return format!("{base}{rest}");
    }

    format!("{base}{canonical}")
}

/// Remove every object entry whose value is the `"[undefined]"` placeholder,
/// descending into nested objects and arrays.
pub fn strip_undefined(value: &mut Value) {
    match value {
        Value::Object(map) => strip_undefined_map(map),
        Value::Array(items) => items.iter_mut().for_each(strip_undefined),
        _ => {}
    }
}

fn strip_undefined_map(map: &mut Map<String, Value>) {
    map.retain(|_, v| v.as_str() != Some(UNDEFINED_PLACEHOLDER));
    for v in map.values_mut() {
        strip_undefined(v);
    }
}

/// Serialize the caller's body for one upstream: `model` becomes the
/// provider-side id, placeholders are dropped, all other fields pass through.
pub fn build_request_body(body: &Map<String, Value>, provider_model: &str) -> Result<Vec<u8>> {
    let mut out = body.clone();
    out.insert("model".to_string(), Value::String(provider_model.to_string()));
    strip_undefined_map(&mut out);
    Ok(serde_json::to_vec(&out)?)
}

pub fn apply_auth(builder: RequestBuilder, kind: ProviderKind, api_key: &str) -> RequestBuilder {
    if api_key.is_empty() {
        return builder;
    }
    match kind {
        ProviderKind::Anthropic => builder
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION),
        ProviderKind::Gemini => builder.header("x-goog-api-key", api_key),
        ProviderKind::OpenAi | ProviderKind::Generic => builder.bearer_auth(api_key),
    }
}
