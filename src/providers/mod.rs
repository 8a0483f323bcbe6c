pub mod config;
pub mod endpoint;
pub mod probe;

pub use config::{ProviderConfig, RetryPolicy};
pub use endpoint::{apply_auth, build_request_body, build_url, strip_undefined};

/// Wire family of an upstream, selected from the provider's type tag.
/// Anything unrecognised speaks the OpenAI chat-completions protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    /// 其他类型，按 OpenAI 兼容协议处理
    Generic,
}

impl ProviderKind {
    pub fn from_type_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "openai" | "azure" | "azure_openai" => Self::OpenAi,
            "anthropic" | "claude" => Self::Anthropic,
            "gemini" | "google" => Self::Gemini,
            _ => Self::Generic,
        }
    }

    /// Full completion path appended to a bare base URL.
    pub fn canonical_path(&self, model: &str) -> String {
        match self {
            Self::Anthropic => "/v1/messages".to_string(),
            Self::Gemini => format!("/v1beta/models/{model}:generateContent"),
            Self::OpenAi | Self::Generic => "/v1/chat/completions".to_string(),
        }
    }

    /// Part of the canonical path after `/v1`; Gemini has no `/v1` form.
    fn path_after_v1(&self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("/messages"),
            Self::Gemini => None,
            Self::OpenAi | Self::Generic => Some("/chat/completions"),
        }
    }
}
