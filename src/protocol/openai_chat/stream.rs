use crate::util::{push_json_string_escaped, push_u64_decimal};

use super::Usage;

pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Identity shared by every chunk of one streamed completion.
#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub id: String,
    pub model: String,
    pub created: u64,
}

/// Encode one content delta as an SSE `data:` frame.
#[must_use]
pub fn encode_content_delta(meta: &ChunkMeta, fragment: &str) -> String {
    let mut out = String::with_capacity(128 + meta.id.len() + meta.model.len() + fragment.len());
    push_chunk_prefix(&mut out, meta);
    out.push_str(",\"choices\":[{\"index\":0,\"delta\":{\"content\":");
    push_json_string_escaped(&mut out, fragment);
    out.push_str("},\"finish_reason\":null}]}\n\n");
    out
}

/// Encode the terminal `finish_reason:"stop"` frame, carrying usage when known.
#[must_use]
pub fn encode_stop_chunk(meta: &ChunkMeta, usage: Option<Usage>) -> String {
    let mut out = String::with_capacity(192 + meta.id.len() + meta.model.len());
    push_chunk_prefix(&mut out, meta);
    out.push_str(",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]");
    if let Some(usage) = usage {
        out.push_str(",\"usage\":{\"prompt_tokens\":");
        push_u64_decimal(&mut out, usage.prompt_tokens);
        out.push_str(",\"completion_tokens\":");
        push_u64_decimal(&mut out, usage.completion_tokens);
        out.push_str(",\"total_tokens\":");
        push_u64_decimal(&mut out, usage.total_tokens);
        out.push('}');
    }
    out.push_str("}\n\n");
    out
}

fn push_chunk_prefix(out: &mut String, meta: &ChunkMeta) {
    out.push_str("data: {\"id\":");
    push_json_string_escaped(out, &meta.id);
    out.push_str(",\"object\":\"chat.completion.chunk\",\"created\":");
    push_u64_decimal(out, meta.created);
    out.push_str(",\"model\":");
    push_json_string_escaped(out, &meta.model);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ChunkMeta {
        ChunkMeta {
            id: "chatcmpl-1".into(),
            model: "gemma-27b".into(),
            created: 1_700_000_000,
        }
    }

    fn frame_json(frame: &str) -> serde_json::Value {
        let payload = frame
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .expect("sse frame");
        serde_json::from_str(payload).expect("json payload")
    }

    #[test]
    fn test_content_delta_frame() {
        let frame = encode_content_delta(&meta(), "say \"hi\"\n");
        let json = frame_json(&frame);
        assert_eq!(json["object"], "chat.completion.chunk");
        assert_eq!(json["choices"][0]["index"], 0);
        assert_eq!(json["choices"][0]["delta"]["content"], "say \"hi\"\n");
        assert!(json["choices"][0]["finish_reason"].is_null());
        assert!(json.get("usage").is_none());
    }

    #[test]
    fn test_stop_chunk_with_usage() {
        let frame = encode_stop_chunk(
            &meta(),
            Some(Usage {
                prompt_tokens: 3,
                completion_tokens: 1,
                total_tokens: 4,
            }),
        );
        let json = frame_json(&frame);
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
        assert_eq!(json["choices"][0]["delta"], serde_json::json!({}));
        assert_eq!(json["usage"]["total_tokens"], 4);
    }

    #[test]
    fn test_stop_chunk_without_usage() {
        let json = frame_json(&encode_stop_chunk(&meta(), None));
        assert!(json.get("usage").is_none());
    }
}
