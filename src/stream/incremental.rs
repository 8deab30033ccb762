//! Forwards a concatenated-JSON upstream body as SSE deltas as soon as each
//! object completes.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::time::Instant;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::AdapterError;
use crate::json_scan::JsonObjectScanner;
use crate::observability::log_request_complete;
use crate::observability::token_counter::usage_for;
use crate::protocol::openai_chat::stream::ChunkMeta;
use crate::transport::CallDeadline;
use crate::upstream::normalize::{probe, Extractor};

use super::{done_frame, encode_delta_event, DeltaEvent};

/// Per-stream bookkeeping for the completion log line.
#[derive(Debug, Clone)]
pub struct StreamLog {
    pub provider: &'static str,
    pub prompt_text: String,
    pub started: Instant,
}

struct IncrementalState<S> {
    body: Pin<Box<S>>,
    scanner: JsonObjectScanner,
    extractors: &'static [Extractor],
    meta: ChunkMeta,
    pending: VecDeque<Bytes>,
    completion: String,
    log: StreamLog,
    deadline: CallDeadline,
    finished: bool,
}

/// Scan `body` and emit one content frame per extracted fragment. A clean end
/// of body yields the stop chunk and `[DONE]`. A read error or a body still
/// open at `deadline` ends the stream without the sentinel.
pub fn incremental_sse_stream<S, E>(
    meta: ChunkMeta,
    body: S,
    extractors: &'static [Extractor],
    log: StreamLog,
    deadline: CallDeadline,
) -> impl Stream<Item = Bytes> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = IncrementalState {
        body: Box::pin(body),
        scanner: JsonObjectScanner::new(),
        extractors,
        meta,
        pending: VecDeque::with_capacity(4),
        completion: String::new(),
        log,
        deadline,
        finished: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((frame, state));
            }
            if state.finished {
                return None;
            }
            let Ok(next) =
                tokio::time::timeout_at(state.deadline.instant(), state.body.next()).await
            else {
                tracing::warn!(
                    provider = state.log.provider,
                    model = %state.meta.model,
                    error = %state.deadline.elapsed_error(),
                    "upstream stream exceeded its deadline"
                );
                state.scanner.finish();
                state.finished = true;
                continue;
            };
            match next {
                Some(Ok(chunk)) => {
                    for value in state.scanner.feed(&chunk) {
                        let Some(fragment) = probe(&value, state.extractors) else {
                            continue;
                        };
                        state.completion.push_str(fragment);
                        state.pending.push_back(encode_delta_event(
                            &state.meta,
                            &DeltaEvent::content(fragment),
                            None,
                        ));
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(
                        provider = state.log.provider,
                        model = %state.meta.model,
                        error = %err,
                        "upstream stream failed mid-body"
                    );
                    state.scanner.finish();
                    state.finished = true;
                }
                None => {
                    let dropped = state.scanner.finish();
                    if dropped > 0 {
                        tracing::debug!(dropped, "discarded unparseable stream objects");
                    }
                    let usage = usage_for(&state.log.prompt_text, &state.completion);
                    log_request_complete(
                        state.log.provider,
                        &state.meta.model,
                        &usage,
                        state.log.started,
                    );
                    state.pending.push_back(encode_delta_event(
                        &state.meta,
                        &DeltaEvent::finish(),
                        Some(usage),
                    ));
                    state.pending.push_back(done_frame());
                    state.finished = true;
                }
            }
        }
    })
}

/// Buffer a concatenated-JSON body and join every extracted fragment.
///
/// The caller bounds the whole read; see `with_deadline`.
///
/// # Errors
///
/// [`AdapterError::Network`] when reading the body fails and
/// [`AdapterError::MalformedUpstreamResponse`] when nothing could be extracted.
pub async fn collect_scanned_text<S, E>(
    body: S,
    extractors: &[Extractor],
) -> Result<String, AdapterError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut body = std::pin::pin!(body);
    let mut scanner = JsonObjectScanner::new();
    let mut text = String::new();
    let mut objects = 0usize;

    while let Some(chunk) = body.next().await {
        let chunk =
            chunk.map_err(|err| AdapterError::Network(format!("stream read failed: {err}")))?;
        for value in scanner.feed(&chunk) {
            objects += 1;
            if let Some(fragment) = probe(&value, extractors) {
                text.push_str(fragment);
            }
        }
    }
    scanner.finish();

    if text.is_empty() {
        return Err(AdapterError::MalformedUpstreamResponse(format!(
            "no text in streamed body ({objects} objects)"
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;

    const LLMCHAT: &[Extractor] = &[Extractor::Response, Extractor::ResultResponse];

    fn meta() -> ChunkMeta {
        ChunkMeta {
            id: "chatcmpl-2".into(),
            model: "cf-meta-llama-3-8b-instruct".into(),
            created: 1,
        }
    }

    fn log() -> StreamLog {
        StreamLog {
            provider: "llmchat",
            prompt_text: "hi".into(),
            started: Instant::now(),
        }
    }

    fn far_deadline() -> CallDeadline {
        CallDeadline::after(Duration::from_secs(30))
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        futures_util::stream::iter(
            parts
                .iter()
                .copied()
                .map(|part| Ok(Bytes::from_static(part.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    fn contents(frames: &[Bytes]) -> Vec<String> {
        frames
            .iter()
            .filter_map(|frame| {
                let text = std::str::from_utf8(frame).ok()?;
                let payload = text.strip_prefix("data: ")?.strip_suffix("\n\n")?;
                let json: Value = serde_json::from_str(payload).ok()?;
                json["choices"][0]["delta"]["content"]
                    .as_str()
                    .map(str::to_owned)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_split_objects_are_forwarded_in_order() {
        let body = chunks(&[
            r#"{"response":"Hel"#,
            r#"lo"}{"result":{"resp"#,
            r#"onse":" wor\"#,
            r#""ld"}}"#,
        ]);
        let frames: Vec<Bytes> = incremental_sse_stream(meta(), body, LLMCHAT, log(), far_deadline())
            .collect()
            .await;
        assert_eq!(contents(&frames), vec!["Hello", " wor\"ld"]);
        assert_eq!(frames.last().map(|f| &f[..]), Some(&b"data: [DONE]\n\n"[..]));
        let stop = std::str::from_utf8(&frames[frames.len() - 2]).unwrap();
        assert!(stop.contains("\"finish_reason\":\"stop\""));
    }

    #[tokio::test]
    async fn test_read_error_ends_without_done() {
        let body = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(br#"{"response":"partial"}"#)),
            Err(std::io::Error::other("reset")),
        ]);
        let frames: Vec<Bytes> = incremental_sse_stream(meta(), body, LLMCHAT, log(), far_deadline())
            .collect()
            .await;
        assert_eq!(contents(&frames), vec!["partial"]);
        assert!(frames.iter().all(|frame| &frame[..] != b"data: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn test_stalled_body_ends_at_deadline_without_done() {
        let body = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(
            br#"{"response":"hi"}"#,
        ))])
        .chain(futures_util::stream::pending());
        let deadline = CallDeadline::after(Duration::from_millis(100));
        let frames: Vec<Bytes> = tokio::time::timeout(
            Duration::from_secs(5),
            incremental_sse_stream(meta(), body, LLMCHAT, log(), deadline).collect(),
        )
        .await
        .expect("stream ends at the deadline");
        assert_eq!(contents(&frames), vec!["hi"]);
        assert!(frames.iter().all(|frame| &frame[..] != b"data: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn test_collect_concatenates_fragments() {
        let body = chunks(&[r#"{"response":"a"}{"resp"#, r#"onse":"b"}{"other":1}"#]);
        assert_eq!(collect_scanned_text(body, LLMCHAT).await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn test_collect_without_text_is_malformed() {
        let err = collect_scanned_text(chunks(&["{}{}"]), LLMCHAT)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::MalformedUpstreamResponse(_)));
    }
}
