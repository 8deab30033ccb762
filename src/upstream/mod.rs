pub mod descriptors;
pub mod identity;
pub mod images;
pub mod nonce;
pub mod normalize;
pub mod registry;
pub mod translate;

use bytes::Bytes;

use crate::config::ProvidersConfig;

use self::normalize::Extractor;

pub use descriptors::DESCRIPTORS;
pub use registry::{ModelEntry, ModelRegistry, Resolution};
pub use translate::translate;

/// Upstream provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemma,
    DeepSeek,
    Qwen,
    GptOss,
    DarkCode,
    GeminiDark,
    Grok,
    Sonnet,
    DeepSeekChat,
    LlmChat,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemma => "gemma",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Qwen => "qwen",
            ProviderKind::GptOss => "gpt-oss",
            ProviderKind::DarkCode => "dark-code",
            ProviderKind::GeminiDark => "gemini-dark",
            ProviderKind::Grok => "grok",
            ProviderKind::Sonnet => "sonnet",
            ProviderKind::DeepSeekChat => "deepseek-chat",
            ProviderKind::LlmChat => "llmchat",
        }
    }

    /// Human-readable name used in error messages.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::Gemma => "Gemma",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::Qwen => "Qwen",
            ProviderKind::GptOss => "GPT-OSS",
            ProviderKind::DarkCode => "Kiwi AI",
            ProviderKind::GeminiDark => "Gemini Dark",
            ProviderKind::Grok => "Grok",
            ProviderKind::Sonnet => "Sonnet Free",
            ProviderKind::DeepSeekChat => "DeepSeek Chat",
            ProviderKind::LlmChat => "LLMChat",
        }
    }
}

/// Wire encoding of the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEncoding {
    /// POST `application/x-www-form-urlencoded`.
    Form,
    /// POST `application/json`.
    Json,
    /// GET with the text in the query string.
    Query,
}

/// What the outbound body carries besides the bound field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    /// Last message text under the field chosen by `field_map`.
    Text,
    /// Text under `field_map`, plus `model=<upstream model>`.
    TextWithModel,
    /// The whole conversation as `{messages: [...]}`.
    Conversation,
    /// WordPress ajax form that needs a session nonce.
    NonceForm,
}

/// How the upstream delivers its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// One JSON document.
    Buffered,
    /// Undelimited concatenation of JSON objects.
    ConcatenatedJson,
}

/// How public aliases derive from upstream model ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasStyle {
    Verbatim,
    /// `@cf/meta/x` becomes `cf-meta-x`.
    Slug,
}

/// Static description of one upstream provider.
pub struct UpstreamDescriptor {
    pub kind: ProviderKind,
    pub encoding: RequestEncoding,
    pub body: BodyShape,
    /// Upstream model ids, in listing order.
    pub models: &'static [&'static str],
    pub default_model: &'static str,
    pub alias_style: AliasStyle,
    /// Field (or routing key) that receives the user text for a model.
    pub field_map: fn(&str) -> &'static str,
    /// Endpoint URL for a model, before any query string.
    pub endpoint: fn(&ProvidersConfig, &str) -> String,
    pub extractors: &'static [Extractor],
    pub requires_success_flag: bool,
    pub delivery: Delivery,
    pub browser_headers: bool,
    pub identity_rewrite: bool,
}

impl std::fmt::Debug for UpstreamDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamDescriptor")
            .field("kind", &self.kind)
            .field("encoding", &self.encoding)
            .field("body", &self.body)
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}

impl UpstreamDescriptor {
    /// Public alias for one of this provider's model ids.
    #[must_use]
    pub fn alias_for(&self, model_id: &str) -> String {
        match self.alias_style {
            AliasStyle::Verbatim => model_id.to_string(),
            AliasStyle::Slug => slug_alias(model_id),
        }
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.delivery == Delivery::ConcatenatedJson
    }
}

fn slug_alias(model_id: &str) -> String {
    let replaced: String = model_id
        .chars()
        .map(|ch| if ch == '@' || ch == '/' { '-' } else { ch })
        .collect();
    match replaced.strip_prefix('-') {
        Some(stripped) => stripped.to_string(),
        None => replaced,
    }
}

/// Outbound request body with its content type.
#[derive(Debug, Clone)]
pub struct RequestBody {
    pub content_type: &'static str,
    pub bytes: Bytes,
}

/// Ready-to-send request for exactly one upstream.
#[derive(Debug, Clone)]
pub struct TranslatedRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: http::HeaderMap,
    pub body: Option<RequestBody>,
}

/// The single text result of one upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCompletion {
    pub text: String,
    pub model_alias: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_alias() {
        assert_eq!(
            slug_alias("@cf/meta/llama-3-8b-instruct"),
            "cf-meta-llama-3-8b-instruct"
        );
        assert_eq!(slug_alias("plain-id"), "plain-id");
    }
}
