use crate::config::ProvidersConfig;

use super::normalize::{Extractor, DEFAULT_EXTRACTORS};
use super::{AliasStyle, BodyShape, Delivery, ProviderKind, RequestEncoding, UpstreamDescriptor};

const SONNET_EXTRACTORS: &[Extractor] = &[Extractor::Response, Extractor::Result, Extractor::Text];
const DEEPSEEK_CHAT_EXTRACTORS: &[Extractor] = &[Extractor::DataResponse];
const LLMCHAT_EXTRACTORS: &[Extractor] = &[Extractor::Response, Extractor::ResultResponse];

const QWEN_MODELS: &[&str] = &[
    "qwen3-coder-plus",
    "qwen3-72b-chat",
    "qwen3-72b-coder",
    "qwen3-72b-math",
    "qwen2.5-72b-chat",
    "qwen2.5-72b-coder",
    "qwen2.5-72b-math",
    "qwen2.5-72b-instruct",
    "qwen2.5-coder-chat",
    "qwen2.5-math-chat",
];

const LLMCHAT_MODELS: &[&str] = &[
    "@cf/mistralai/mistral-small-3.1-24b-instruct",
    "@cf/meta/llama-3-8b-instruct",
    "@cf/google/gemma-7b-it",
    "@cf/mistralai/mistral-7b-instruct-v0.1",
    "@cf/tiiuae/falcon-7b-instruct",
    "@cf/meta/llama-2-7b-chat-fp16",
    "@cf/qwen/qwen1.5-7b-chat-awq",
    "@cf/defog/sqlcoder-7b-2",
    "@cf/microsoft/phi-2",
    "@cf/meta/llama-3.1-8b-instruct",
    "@cf/meta/llama-3-8b-instruct-awq",
    "@cf/google/gemma-2b-it-lora",
    "@cf/deepseek-ai/deepseek-coder-6.7b-base",
    "@cf/mistralai/openhermes-2.5-mistral-7b",
    "@cf/deepseek-ai/deepseek-coder-6.7b-instruct",
    "@cf/huggingfacegi/zephyr-7b-beta",
    "@cf/meta/llama-2-13b-chat",
    "@cf/intel/neural-chat-7b-v3-1",
    "@cf/meta/llama-guard-7b",
    "@cf/deepseek-ai/deepseek-math-7b-instruct",
    "@cf/nexusflow/starling-lm-7b-beta",
    "@cf/qwen/qwen1.5-0.5b-chat",
    "@cf/qwen/qwen1.5-1.8b-chat",
    "@cf/openchat/openchat-3.5",
    "@cf/una-cybertron/una-cybertron-7b-v2-bf16",
    "@cf/tinyllama/tinyllama-1.1b-chat-v1.0",
    "@cf/qwen/qwen1.5-14b-chat-awq",
    "@cf/mistralai/mistral-7b-instruct-v0.2",
];

/// Every supported upstream, in listing order.
pub static DESCRIPTORS: [UpstreamDescriptor; 10] = [
    UpstreamDescriptor {
        kind: ProviderKind::Gemma,
        encoding: RequestEncoding::Form,
        body: BodyShape::Text,
        models: &["gemma-27b", "gemma-12b", "gemma-4b"],
        default_model: "gemma-27b",
        alias_style: AliasStyle::Verbatim,
        field_map: gemma_size_field,
        endpoint: |hosts, _| format!("{}/api/gemma.php", hosts.sii3),
        extractors: DEFAULT_EXTRACTORS,
        requires_success_flag: false,
        delivery: Delivery::Buffered,
        browser_headers: false,
        identity_rewrite: false,
    },
    UpstreamDescriptor {
        kind: ProviderKind::DeepSeek,
        encoding: RequestEncoding::Form,
        body: BodyShape::Text,
        models: &["deepseek-v3.3", "deepseek-r1"],
        default_model: "deepseek-v3.3",
        alias_style: AliasStyle::Verbatim,
        field_map: deepseek_variant_field,
        endpoint: |hosts, _| format!("{}/api/deepseek.php", hosts.sii3),
        extractors: DEFAULT_EXTRACTORS,
        requires_success_flag: false,
        delivery: Delivery::Buffered,
        browser_headers: false,
        identity_rewrite: false,
    },
    UpstreamDescriptor {
        kind: ProviderKind::Qwen,
        encoding: RequestEncoding::Form,
        body: BodyShape::TextWithModel,
        models: QWEN_MODELS,
        default_model: "qwen2.5-72b-chat",
        alias_style: AliasStyle::Verbatim,
        field_map: |_| "prompt",
        endpoint: |hosts, _| format!("{}/api/qwen.php", hosts.sii3),
        extractors: DEFAULT_EXTRACTORS,
        requires_success_flag: false,
        delivery: Delivery::Buffered,
        browser_headers: false,
        identity_rewrite: false,
    },
    UpstreamDescriptor {
        kind: ProviderKind::GptOss,
        encoding: RequestEncoding::Json,
        body: BodyShape::Text,
        models: &["gpt-oss-120b", "gpt-4-117b"],
        default_model: "gpt-oss-120b",
        alias_style: AliasStyle::Verbatim,
        field_map: |_| "text",
        endpoint: |hosts, _| format!("{}/api/gpt-oss.php", hosts.sii3),
        extractors: DEFAULT_EXTRACTORS,
        requires_success_flag: false,
        delivery: Delivery::Buffered,
        browser_headers: false,
        identity_rewrite: false,
    },
    UpstreamDescriptor {
        kind: ProviderKind::DarkCode,
        encoding: RequestEncoding::Json,
        body: BodyShape::Text,
        models: &["dark-code-76"],
        default_model: "dark-code-76",
        alias_style: AliasStyle::Verbatim,
        field_map: |_| "text",
        endpoint: |hosts, _| format!("{}/api/DarkCode.php", hosts.sii3),
        extractors: DEFAULT_EXTRACTORS,
        requires_success_flag: false,
        delivery: Delivery::Buffered,
        browser_headers: false,
        identity_rewrite: true,
    },
    UpstreamDescriptor {
        kind: ProviderKind::GeminiDark,
        encoding: RequestEncoding::Json,
        body: BodyShape::Text,
        models: &["gemini-2.5-pro", "gemini-2.5-deep-search", "gemini-2.5-flash"],
        default_model: "gemini-2.5-pro",
        alias_style: AliasStyle::Verbatim,
        field_map: gemini_variant_field,
        endpoint: gemini_endpoint,
        extractors: DEFAULT_EXTRACTORS,
        requires_success_flag: false,
        delivery: Delivery::Buffered,
        browser_headers: false,
        identity_rewrite: false,
    },
    UpstreamDescriptor {
        kind: ProviderKind::Grok,
        encoding: RequestEncoding::Query,
        body: BodyShape::Text,
        models: &["grok-4"],
        default_model: "grok-4",
        alias_style: AliasStyle::Verbatim,
        field_map: |_| "text",
        endpoint: |hosts, _| format!("{}/api/grok4.php", hosts.sii3),
        extractors: DEFAULT_EXTRACTORS,
        requires_success_flag: false,
        delivery: Delivery::Buffered,
        browser_headers: false,
        identity_rewrite: false,
    },
    UpstreamDescriptor {
        kind: ProviderKind::Sonnet,
        encoding: RequestEncoding::Query,
        body: BodyShape::Text,
        models: &["sonnet-chat", "sonnet-reasoning", "sonnet-coder", "sonnet-math"],
        default_model: "sonnet-chat",
        alias_style: AliasStyle::Verbatim,
        field_map: |_| "text",
        endpoint: sonnet_endpoint,
        extractors: SONNET_EXTRACTORS,
        requires_success_flag: false,
        delivery: Delivery::Buffered,
        browser_headers: true,
        identity_rewrite: false,
    },
    UpstreamDescriptor {
        kind: ProviderKind::DeepSeekChat,
        encoding: RequestEncoding::Form,
        body: BodyShape::NonceForm,
        models: &["deepseek-chat"],
        default_model: "deepseek-chat",
        alias_style: AliasStyle::Verbatim,
        field_map: |_| "message",
        endpoint: |hosts, _| format!("{}/wp-admin/admin-ajax.php", hosts.chatdeep),
        extractors: DEEPSEEK_CHAT_EXTRACTORS,
        requires_success_flag: true,
        delivery: Delivery::Buffered,
        browser_headers: true,
        identity_rewrite: false,
    },
    UpstreamDescriptor {
        kind: ProviderKind::LlmChat,
        encoding: RequestEncoding::Json,
        body: BodyShape::Conversation,
        models: LLMCHAT_MODELS,
        default_model: "@cf/meta/llama-3-8b-instruct",
        alias_style: AliasStyle::Slug,
        field_map: |_| "messages",
        endpoint: llmchat_endpoint,
        extractors: LLMCHAT_EXTRACTORS,
        requires_success_flag: false,
        delivery: Delivery::ConcatenatedJson,
        browser_headers: true,
        identity_rewrite: false,
    },
];

/// Look up the descriptor for a provider kind.
#[cfg(test)]
#[must_use]
pub(crate) fn descriptor_for(kind: ProviderKind) -> &'static UpstreamDescriptor {
    DESCRIPTORS
        .iter()
        .find(|descriptor| descriptor.kind == kind)
        .unwrap_or(&DESCRIPTORS[0])
}

/// Size suffix after the first `-` selects the form field; unknown sizes use `27b`.
fn gemma_size_field(model: &str) -> &'static str {
    match model.split('-').nth(1) {
        Some("12b") => "12b",
        Some("4b") => "4b",
        _ => "27b",
    }
}

fn deepseek_variant_field(model: &str) -> &'static str {
    if model == "deepseek-r1" {
        "r1"
    } else {
        "v3"
    }
}

fn gemini_variant_field(model: &str) -> &'static str {
    match model {
        "gemini-2.5-flash" => "text",
        "gemini-2.5-deep-search" => "gemini-deep",
        _ => "gemini-pro",
    }
}

fn gemini_endpoint(hosts: &ProvidersConfig, model: &str) -> String {
    if model == "gemini-2.5-flash" {
        format!("{}/DARK/gemini.php", hosts.sii3)
    } else {
        format!("{}/api/gemini-dark.php", hosts.sii3)
    }
}

fn sonnet_endpoint(hosts: &ProvidersConfig, model: &str) -> String {
    let script = if model.contains("reasoning") {
        "reasoning"
    } else if model.contains("coder") {
        "coder"
    } else if model.contains("math") {
        "math"
    } else {
        "at"
    };
    format!("{}/api/{script}.php", hosts.sonnet)
}

fn llmchat_endpoint(hosts: &ProvidersConfig, model: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(model.as_bytes()).collect();
    format!("{}/inference/stream?model={encoded}", hosts.llmchat)
}
