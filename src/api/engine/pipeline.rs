//! Resolve, translate, invoke and normalize one chat completion.

use std::time::Instant;

use crate::cancel::CancelToken;
use crate::error::AdapterError;
use crate::observability::log_request_complete;
use crate::observability::token_counter::usage_for;
use crate::protocol::openai_chat::response_encoder::encode_chat_completion;
use crate::protocol::openai_chat::stream::ChunkMeta;
use crate::protocol::openai_chat::{ChatCompletionRequest, ChatCompletionResponse};
use crate::state::AppState;
use crate::stream::incremental::StreamLog;
use crate::stream::{
    collect_scanned_text, incremental_sse_stream, synthetic_deltas, synthetic_sse_stream,
    until_cancelled, SseStream,
};
use crate::transport::{with_deadline, CallDeadline};
use crate::upstream::identity::rewrite_identity;
use crate::upstream::nonce::fetch_nonce;
use crate::upstream::normalize::{normalize, parse_body, require_success_flag};
use crate::upstream::{
    translate, BodyShape, ModelEntry, NormalizedCompletion, ProviderKind, TranslatedRequest,
};
use crate::util::{unix_now_millis, unix_now_secs};

/// A normalized completion and the provider that produced it.
#[derive(Debug, Clone)]
pub struct Completion {
    pub provider: ProviderKind,
    pub normalized: NormalizedCompletion,
}

/// Run one non-streaming completion against the upstream serving `request.model`.
///
/// # Errors
///
/// [`AdapterError::InvalidRequest`] when the model cannot be resolved; any
/// upstream failure wrapped with the provider's display name.
pub async fn complete(
    state: &AppState,
    request: &ChatCompletionRequest,
    cancel: &CancelToken,
) -> Result<Completion, AdapterError> {
    let resolution = state.registry.resolve(&request.model)?;
    tracing::debug!(
        requested = %request.model,
        alias = %resolution.entry.alias,
        fell_back = resolution.fell_back,
        "resolved model"
    );
    complete_entry(state, resolution.entry, request, cancel).await
}

/// Like [`complete`], for an already resolved registry entry.
///
/// # Errors
///
/// Upstream failures wrapped with the provider's display name.
pub async fn complete_entry(
    state: &AppState,
    entry: &ModelEntry,
    request: &ChatCompletionRequest,
    cancel: &CancelToken,
) -> Result<Completion, AdapterError> {
    let kind = entry.descriptor.kind;
    let text = fetch_text(state, entry, request, cancel)
        .await
        .map_err(|err| err.for_provider(kind.display_name()))?;
    Ok(Completion {
        provider: kind,
        normalized: NormalizedCompletion {
            text,
            model_alias: entry.alias.clone(),
        },
    })
}

/// Non-streaming mode: one `chat.completion` document.
///
/// # Errors
///
/// See [`complete`].
pub async fn chat_document(
    state: &AppState,
    request: &ChatCompletionRequest,
    cancel: &CancelToken,
) -> Result<ChatCompletionResponse, AdapterError> {
    let started = Instant::now();
    let completion = complete(state, request, cancel).await?;
    let provider = completion.provider.as_str();
    let document = encode_chat_completion(
        provider,
        &completion.normalized.model_alias,
        &request.last_message_text(),
        completion.normalized.text,
    );
    log_request_complete(provider, &document.model, &document.usage, started);
    Ok(document)
}

/// Streaming mode. Buffered upstreams are replayed synthetically; the
/// concatenated-JSON upstream is forwarded as it arrives.
///
/// Failures before the first frame are returned as errors so the caller can
/// still answer with a JSON error document.
///
/// # Errors
///
/// See [`complete`].
pub async fn chat_stream(
    state: &AppState,
    request: &ChatCompletionRequest,
    cancel: CancelToken,
) -> Result<SseStream, AdapterError> {
    let started = Instant::now();
    let resolution = state.registry.resolve(&request.model)?;
    let entry = resolution.entry;
    tracing::debug!(
        requested = %request.model,
        alias = %entry.alias,
        fell_back = resolution.fell_back,
        stream = true,
        "resolved model"
    );
    let descriptor = entry.descriptor;
    let kind = descriptor.kind;
    let meta = ChunkMeta {
        id: format!("{}-{}", kind.as_str(), unix_now_millis()),
        model: entry.alias.clone(),
        created: unix_now_secs(),
    };
    let prompt_text = request.last_message_text();

    if descriptor.is_streaming() {
        let timeout = state.config.server.text_timeout();
        let (response, deadline) = async {
            let outbound = prepare(state, entry, request, &cancel).await?;
            let deadline = CallDeadline::after(timeout);
            let response = state.transport.open_stream(outbound, deadline, &cancel).await?;
            Ok::<_, AdapterError>((response, deadline))
        }
        .await
        .map_err(|err| err.for_provider(kind.display_name()))?;

        let frames = incremental_sse_stream(
            meta,
            response.bytes_stream(),
            descriptor.extractors,
            StreamLog {
                provider: kind.as_str(),
                prompt_text,
                started,
            },
            deadline,
        );
        return Ok(until_cancelled(frames, cancel));
    }

    let text = fetch_text(state, entry, request, &cancel)
        .await
        .map_err(|err| err.for_provider(kind.display_name()))?;
    let usage = usage_for(&prompt_text, &text);
    log_request_complete(kind.as_str(), &entry.alias, &usage, started);

    let streaming = &state.config.streaming;
    let frames = synthetic_sse_stream(
        meta,
        synthetic_deltas(&text, streaming.granularity),
        streaming.token_delay(),
        usage,
    );
    Ok(until_cancelled(frames, cancel))
}

async fn prepare(
    state: &AppState,
    entry: &ModelEntry,
    request: &ChatCompletionRequest,
    cancel: &CancelToken,
) -> Result<TranslatedRequest, AdapterError> {
    let descriptor = entry.descriptor;
    let hosts = &state.config.providers;
    let nonce = if descriptor.body == BodyShape::NonceForm {
        Some(
            fetch_nonce(
                &state.transport,
                hosts,
                state.config.server.text_timeout(),
                cancel,
            )
            .await?,
        )
    } else {
        None
    };
    translate(
        descriptor,
        hosts,
        entry.upstream_model,
        request,
        nonce.as_deref(),
    )
}

async fn fetch_text(
    state: &AppState,
    entry: &ModelEntry,
    request: &ChatCompletionRequest,
    cancel: &CancelToken,
) -> Result<String, AdapterError> {
    let descriptor = entry.descriptor;
    let timeout = state.config.server.text_timeout();
    let outbound = prepare(state, entry, request, cancel).await?;
    tracing::debug!(
        provider = descriptor.kind.as_str(),
        model = entry.upstream_model,
        method = %outbound.method,
        url = %outbound.url,
        "calling upstream"
    );

    if descriptor.is_streaming() {
        let deadline = CallDeadline::after(timeout);
        let response = state.transport.open_stream(outbound, deadline, cancel).await?;
        return with_deadline(
            deadline,
            cancel,
            collect_scanned_text(response.bytes_stream(), descriptor.extractors),
        )
        .await;
    }

    let response = state.transport.execute(outbound, timeout, cancel).await?;
    let body = parse_body(&response.body)?;
    if descriptor.requires_success_flag {
        require_success_flag(&body)?;
    }
    let text = normalize(&body, descriptor.extractors)?;
    if descriptor.identity_rewrite {
        Ok(rewrite_identity(&text))
    } else {
        Ok(text)
    }
}
