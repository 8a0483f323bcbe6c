use serde_json::{Value, json};

use super::ProviderKind;

const PROBE_PROMPT: &str = "hi";
const PROBE_MAX_TOKENS: u32 = 10;

impl ProviderKind {
    /// Default model id used by the synthetic health request.
    pub fn probe_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-haiku-20240307",
            Self::Gemini => "gemini-1.5-flash",
            Self::OpenAi | Self::Generic => "gpt-3.5-turbo",
        }
    }

    pub fn probe_payload(&self) -> Value {
        match self {
            Self::Anthropic => json!({
                "model": self.probe_model(),
                "max_tokens": PROBE_MAX_TOKENS,
                "messages": [{"role": "user", "content": PROBE_PROMPT}],
            }),
            Self::Gemini => json!({
                "contents": [{"role": "user", "parts": [{"text": PROBE_PROMPT}]}],
                "generationConfig": {"maxOutputTokens": PROBE_MAX_TOKENS},
            }),
            Self::OpenAi | Self::Generic => json!({
                "model": self.probe_model(),
                "max_tokens": PROBE_MAX_TOKENS,
                "messages": [{"role": "user", "content": PROBE_PROMPT}],
            }),
        }
    }

    /// 从探测响应中取出生成的文本；取不到或为空时返回 None
    pub fn probe_content<'a>(&self, body: &'a Value) -> Option<&'a str> {
        let text = match self {
            Self::Anthropic => body.pointer("/content/0/text"),
            Self::Gemini => body.pointer("/candidates/0/content/parts/0/text"),
            Self::OpenAi | Self::Generic => body.pointer("/choices/0/message/content"),
        }?;
        text.as_str().filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_content_must_be_non_empty() {
        let k = ProviderKind::OpenAi;
        let ok = json!({"choices": [{"message": {"content": "hello"}}]});
        assert_eq!(k.probe_content(&ok), Some("hello"));
        let empty = json!({"choices": [{"message": {"content": ""}}]});
        assert_eq!(k.probe_content(&empty), None);
        // 只有空字符串算无效，空白字符仍是模型给出的内容
        let blank = json!({"choices": [{"message": {"content": "  "}}]});
        assert_eq!(k.probe_content(&blank), Some("  "));
        assert_eq!(k.probe_content(&json!({"choices": []})), None);
        let non_string = json!({"choices": [{"message": {"content": 42}}]});
        assert_eq!(k.probe_content(&non_string), None);
    }

    #[test]
    fn anthropic_and_gemini_shapes() {
        let a = json!({"content": [{"type": "text", "text": "hey"}]});
        assert_eq!(ProviderKind::Anthropic.probe_content(&a), Some("hey"));
        let g = json!({"candidates": [{"content": {"parts": [{"text": "yo"}]}}]});
        assert_eq!(ProviderKind::Gemini.probe_content(&g), Some("yo"));
        assert_eq!(ProviderKind::Gemini.probe_content(&a), None);
    }

    #[test]
    fn payload_uses_kind_default_model() {
        let p = ProviderKind::Anthropic.probe_payload();
        assert_eq!(p["model"], "claude-3-haiku-20240307");
        assert_eq!(p["max_tokens"], 10);
        let p = ProviderKind::Generic.probe_payload();
        assert_eq!(p["model"], "gpt-3.5-turbo");
        assert_eq!(p["messages"][0]["content"], "hi");
    }
}
