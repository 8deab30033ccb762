//! Replays a fully buffered completion as a paced SSE sequence.

use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;

use crate::config::StreamGranularity;
use crate::protocol::openai_chat::stream::ChunkMeta;
use crate::protocol::openai_chat::Usage;

use super::{done_frame, encode_delta_event, DeltaEvent};

/// Split `text` into content deltas.
///
/// `Word` splits on single spaces and re-appends one space to every token,
/// so the concatenated fragments equal `text` plus a trailing space.
#[must_use]
pub fn synthetic_deltas(text: &str, granularity: StreamGranularity) -> Vec<DeltaEvent> {
    match granularity {
        StreamGranularity::Word => text
            .split(' ')
            .map(|word| {
                let mut fragment = String::with_capacity(word.len() + 1);
                fragment.push_str(word);
                fragment.push(' ');
                DeltaEvent::content(fragment)
            })
            .collect(),
        StreamGranularity::Whole => vec![DeltaEvent::content(text)],
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Content,
    Sentinel,
    Closed,
}

struct SyntheticState {
    meta: ChunkMeta,
    deltas: std::vec::IntoIter<DeltaEvent>,
    delay: Duration,
    usage: Usage,
    emitted: usize,
    phase: Phase,
}

/// Emit `deltas` with `delay` between consecutive content frames, then the
/// stop chunk carrying `usage`, then `[DONE]`.
pub fn synthetic_sse_stream(
    meta: ChunkMeta,
    deltas: Vec<DeltaEvent>,
    delay: Duration,
    usage: Usage,
) -> impl Stream<Item = Bytes> + Send + 'static {
    let state = SyntheticState {
        meta,
        deltas: deltas.into_iter(),
        delay,
        usage,
        emitted: 0,
        phase: Phase::Content,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        match state.phase {
            Phase::Content => {
                if let Some(event) = state.deltas.next() {
                    if state.emitted > 0 && !state.delay.is_zero() {
                        tokio::time::sleep(state.delay).await;
                    }
                    state.emitted += 1;
                    let frame = encode_delta_event(&state.meta, &event, None);
                    return Some((frame, state));
                }
                state.phase = Phase::Sentinel;
                let frame = encode_delta_event(&state.meta, &DeltaEvent::finish(), Some(state.usage));
                Some((frame, state))
            }
            Phase::Sentinel => {
                state.phase = Phase::Closed;
                Some((done_frame(), state))
            }
            Phase::Closed => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::observability::token_counter::usage_for;
    use crate::stream::until_cancelled;
    use futures_util::StreamExt;
    use serde_json::Value;

    fn meta() -> ChunkMeta {
        ChunkMeta {
            id: "chatcmpl-1".into(),
            model: "gemma-27b".into(),
            created: 1,
        }
    }

    fn frame_json(frame: &Bytes) -> Value {
        let text = std::str::from_utf8(frame).unwrap();
        let payload = text
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        serde_json::from_str(payload).unwrap()
    }

    #[test]
    fn test_word_split_appends_space() {
        let deltas = synthetic_deltas("4.", StreamGranularity::Word);
        assert_eq!(deltas, vec![DeltaEvent::content("4. ")]);

        let text = "Paris is the  capital";
        let joined: String = synthetic_deltas(text, StreamGranularity::Word)
            .into_iter()
            .map(|delta| delta.content_fragment)
            .collect();
        assert_eq!(joined, format!("{text} "));
    }

    #[test]
    fn test_whole_granularity_single_delta() {
        let deltas = synthetic_deltas("one two three", StreamGranularity::Whole);
        assert_eq!(deltas, vec![DeltaEvent::content("one two three")]);
    }

    #[tokio::test]
    async fn test_stream_frames_end_with_stop_and_done() {
        let usage = usage_for("What is 2+2?", "4.");
        let frames: Vec<Bytes> = synthetic_sse_stream(
            meta(),
            synthetic_deltas("4.", StreamGranularity::Word),
            Duration::ZERO,
            usage,
        )
        .collect()
        .await;

        assert_eq!(frames.len(), 3);
        assert_eq!(frame_json(&frames[0])["choices"][0]["delta"]["content"], "4. ");
        let stop = frame_json(&frames[1]);
        assert_eq!(stop["choices"][0]["finish_reason"], "stop");
        assert_eq!(stop["usage"]["total_tokens"], 4);
        assert_eq!(&frames[2][..], b"data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_suppresses_done() {
        let (handle, token) = cancel_pair();
        let inner = synthetic_sse_stream(
            meta(),
            synthetic_deltas("a b c d e f g h", StreamGranularity::Word),
            Duration::from_millis(50),
            Usage::default(),
        );
        let mut stream = until_cancelled(inner, token);

        let first = stream.next().await.expect("first frame");
        assert_eq!(frame_json(&first)["choices"][0]["delta"]["content"], "a ");
        handle.cancel();

        let rest: Vec<Bytes> = stream.collect().await;
        assert!(rest.iter().all(|frame| &frame[..] != b"data: [DONE]\n\n"));
        assert!(rest.len() < 8);
    }
}
