use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};

use crate::api::engine::{chat_document, chat_stream};
use crate::cancel::CancelToken;
use crate::error::AdapterError;
use crate::protocol::openai_chat::ChatCompletionRequest;
use crate::state::AppState;
use crate::stream::sse_ok_response;

/// `POST /v1/chat/completions`.
///
/// A client disconnect drops the response body, which drops the upstream
/// read and ends emission without the `[DONE]` sentinel.
pub async fn handler(State(state): State<Arc<AppState>>, body: bytes::Bytes) -> Response {
    match handler_inner(&state, &body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "chat completion failed");
            err.into_response()
        }
    }
}

async fn handler_inner(state: &AppState, body: &[u8]) -> Result<Response, AdapterError> {
    let request = ChatCompletionRequest::from_slice(body)?;
    tracing::debug!(
        model = %request.model,
        stream = request.stream,
        messages = request.messages.len(),
        "chat completion request"
    );

    if request.stream {
        let frames = chat_stream(state, &request, CancelToken::never()).await?;
        return Ok(sse_ok_response(frames));
    }
    let document = chat_document(state, &request, &CancelToken::never()).await?;
    Ok(Json(document).into_response())
}
