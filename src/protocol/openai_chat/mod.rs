pub mod response_encoder;
pub mod stream;

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Uniform chat completion request accepted from callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: MessageContent,
}

/// Message content: a plain string or an array of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Null(()),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl MessageContent {
    /// Flatten to plain text; text parts are joined with newlines, other parts are dropped.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|part| part.type_ == "text")
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
            MessageContent::Null(()) => String::new(),
        }
    }
}

/// Plain `{role, content}` pair forwarded to conversational upstreams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlainMessage {
    pub role: String,
    pub content: String,
}

impl ChatCompletionRequest {
    /// Parse and sanity check a request body.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidRequest`] for malformed JSON, an empty
    /// model, or an empty message list.
    pub fn from_slice(body: &[u8]) -> Result<Self, AdapterError> {
        let request: ChatCompletionRequest = serde_json::from_slice(body)
            .map_err(|err| AdapterError::InvalidRequest(format!("invalid JSON body: {err}")))?;
        if request.model.trim().is_empty() {
            return Err(AdapterError::InvalidRequest("model is required".into()));
        }
        if request.messages.is_empty() {
            return Err(AdapterError::InvalidRequest(
                "messages must not be empty".into(),
            ));
        }
        Ok(request)
    }

    /// Text of the last message; single-turn upstreams only see this.
    #[must_use]
    pub fn last_message_text(&self) -> String {
        self.messages
            .last()
            .map(|message| message.content.text())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn plain_messages(&self) -> Vec<PlainMessage> {
        self.messages
            .iter()
            .map(|message| PlainMessage {
                role: message.role.clone(),
                content: message.content.text(),
            })
            .collect()
    }
}

/// Token accounting attached to completions and the final stream chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Non-streaming chat completion document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_message_text_from_string() {
        let request = ChatCompletionRequest::from_slice(
            br#"{"model":"gemma-27b","messages":[{"role":"system","content":"be brief"},{"role":"user","content":"What is 2+2?"}]}"#,
        )
        .unwrap();
        assert!(!request.stream);
        assert_eq!(request.last_message_text(), "What is 2+2?");
    }

    #[test]
    fn test_last_message_text_from_parts() {
        let request = ChatCompletionRequest::from_slice(
            br#"{"model":"m","stream":true,"messages":[{"role":"user","content":[{"type":"text","text":"a"},{"type":"image_url"},{"type":"text","text":"b"}]}]}"#,
        )
        .unwrap();
        assert!(request.stream);
        assert_eq!(request.last_message_text(), "a\nb");
    }

    #[test]
    fn test_null_content_is_empty() {
        let request = ChatCompletionRequest::from_slice(
            br#"{"model":"m","messages":[{"role":"assistant","content":null}]}"#,
        )
        .unwrap();
        assert_eq!(request.last_message_text(), "");
    }

    #[test]
    fn test_rejects_empty_messages() {
        let err = ChatCompletionRequest::from_slice(br#"{"model":"m","messages":[]}"#)
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidRequest(_)));
    }

    #[test]
    fn test_rejects_invalid_json() {
        let err = ChatCompletionRequest::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, AdapterError::InvalidRequest(_)));
    }
}
