use serde_json::{Map, Value};

use crate::error::{GatewayError, Result};

/// Inbound chat completion body.
///
/// Kept as an ordered JSON object rather than a typed struct so that every
/// provider-specific field reaches the upstream untouched.
#[derive(Debug, Clone)]
pub struct GatewayChatRequest {
    body: Map<String, Value>,
    model: String,
}

impl GatewayChatRequest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(body) = value else {
            return Err(GatewayError::BadRequest(
                "request body must be a JSON object".into(),
            ));
        };
        let model = body
            .get("model")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| GatewayError::BadRequest("missing required field: model".into()))?
            .to_string();
        Ok(Self { body, model })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_stream(&self) -> bool {
        self.body.get("stream").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }
}
