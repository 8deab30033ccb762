pub mod incremental;
pub mod synthetic;

pub use incremental::{collect_scanned_text, incremental_sse_stream};
pub use synthetic::{synthetic_deltas, synthetic_sse_stream};

use std::pin::Pin;

use axum::response::Response;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::cancel::CancelToken;
use crate::protocol::openai_chat::stream::{
    encode_content_delta, encode_stop_chunk, ChunkMeta, DONE_FRAME,
};
use crate::protocol::openai_chat::Usage;

/// One unit of streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaEvent {
    pub content_fragment: String,
    /// Set only on the terminal event.
    pub finished: bool,
}

impl DeltaEvent {
    #[must_use]
    pub fn content(fragment: impl Into<String>) -> Self {
        Self {
            content_fragment: fragment.into(),
            finished: false,
        }
    }

    #[must_use]
    pub fn finish() -> Self {
        Self {
            content_fragment: String::new(),
            finished: true,
        }
    }
}

/// Boxed stream of encoded SSE frames.
pub type SseStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

/// Encode one event as a `data:` frame; `usage` only applies to the terminal event.
#[must_use]
pub fn encode_delta_event(meta: &ChunkMeta, event: &DeltaEvent, usage: Option<Usage>) -> Bytes {
    if event.finished {
        Bytes::from(encode_stop_chunk(meta, usage))
    } else {
        Bytes::from(encode_content_delta(meta, &event.content_fragment))
    }
}

#[inline]
pub(crate) fn done_frame() -> Bytes {
    Bytes::from_static(DONE_FRAME.as_bytes())
}

/// End `stream` as soon as `cancel` fires. Nothing is emitted afterwards, so a
/// cancelled stream never carries the `[DONE]` sentinel.
pub fn until_cancelled<S>(stream: S, cancel: CancelToken) -> SseStream
where
    S: Stream<Item = Bytes> + Send + 'static,
{
    Box::pin(stream.take_until(cancel.cancelled_owned()))
}

#[inline]
pub fn sse_ok_response(stream: SseStream) -> Response {
    let body = axum::body::Body::from_stream(stream.map(Ok::<Bytes, std::convert::Infallible>));
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
