use crate::observability::token_counter::usage_for;
use crate::util::{unix_now_millis, unix_now_secs};

use super::{AssistantMessage, ChatCompletionResponse, CompletionChoice};

/// Build the single non-streaming completion document.
///
/// The id follows the `<provider>-<unix millis>` convention.
#[must_use]
pub fn encode_chat_completion(
    provider: &str,
    model: &str,
    prompt_text: &str,
    completion_text: String,
) -> ChatCompletionResponse {
    let usage = usage_for(prompt_text, &completion_text);
    ChatCompletionResponse {
        id: format!("{provider}-{}", unix_now_millis()),
        object: "chat.completion".to_string(),
        created: unix_now_secs(),
        model: model.to_string(),
        choices: vec![CompletionChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: completion_text,
            },
            finish_reason: "stop".to_string(),
        }],
        usage,
    }
}
