//! Server-sent-events framing shared by the provider adapters.

use bytes::Bytes;
use eventsource_stream::{Event, Eventsource};
use futures::{Stream, StreamExt, future, stream};

use crate::backend::{ChunkStream, terminated};
use crate::types::NormalizedChunk;

/// One dispatched event: its data lines and its `event:` name, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// What a provider decoder made of one frame.
#[derive(Debug)]
pub(crate) enum Decoded {
    Chunks(Vec<NormalizedChunk>),
    /// Nothing useful (keep-alive, unknown or malformed event).
    Skip,
    /// Provider signalled the end of the response.
    Done,
}

/// Split a response body into SSE frames.
///
/// Framing and UTF-8 decoding across chunk boundaries are handled by
/// `eventsource-stream`. A transport error mid-body ends the frame stream; it
/// is logged, not surfaced, so consumers still reach their terminal chunk.
pub(crate) fn sse_frames<S>(byte_stream: S) -> impl Stream<Item = SseFrame> + Send
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    byte_stream
        .eventsource()
        .take_while(|result| {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Provider stream interrupted");
            }
            future::ready(result.is_ok())
        })
        .filter_map(|result| future::ready(result.ok().and_then(SseFrame::from_event)))
}

impl SseFrame {
    /// Events without data carry nothing to decode.
    fn from_event(event: Event) -> Option<Self> {
        if event.data.is_empty() {
            return None;
        }
        // `message` is the default name when the server sent no `event:` line.
        let name = (!event.event.is_empty() && event.event != DEFAULT_EVENT).then_some(event.event);
        Some(Self {
            event: name,
            data: event.data,
        })
    }
}

const DEFAULT_EVENT: &str = "message";

/// Decode frames with `decode` into a terminated chunk stream.
///
/// Stops at the first [`Decoded::Done`] or when the frames run out; either
/// way exactly one `End` follows.
pub(crate) fn normalize_frames<S, F>(frames: S, mut decode: F) -> ChunkStream
where
    S: Stream<Item = SseFrame> + Send + 'static,
    F: FnMut(&SseFrame) -> Decoded + Send + 'static,
{
    let chunks = frames
        .map(move |frame| decode(&frame))
        .take_while(|decoded| future::ready(!matches!(decoded, Decoded::Done)))
        .flat_map(|decoded| match decoded {
            Decoded::Chunks(chunks) => stream::iter(chunks),
            Decoded::Skip | Decoded::Done => stream::iter(Vec::new()),
        })
        .filter(|chunk| future::ready(!chunk.is_end()));

    terminated(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(parts: &[&str]) -> impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static {
        let owned: Vec<reqwest::Result<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn test_frames_across_byte_boundaries() {
        let frames: Vec<SseFrame> =
            sse_frames(body(&["data: {\"a\"", ":1}\n\nda", "ta: [DONE]\n\n"]))
                .collect()
                .await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "{\"a\":1}");
        assert_eq!(frames[1].data, "[DONE]");
    }

    #[tokio::test]
    async fn test_event_names_attach_to_data() {
        let frames: Vec<SseFrame> = sse_frames(body(&[
            "event: ping\ndata: {}\n\n",
            ": comment\n",
            "data: bare\r\n\r\n",
        ]))
        .collect()
        .await;
        assert_eq!(frames[0].event.as_deref(), Some("ping"));
        assert_eq!(frames[1].event, None);
        assert_eq!(frames[1].data, "bare");
    }

    fn raw_body(parts: Vec<Vec<u8>>) -> impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_multibyte_char_split_across_chunks() {
        let bytes = "data: h\u{e9}llo \u{4e16}\u{754c} \u{1f980}\n\n".as_bytes().to_vec();
        // Cut inside the two-byte `é` and inside the four-byte crab.
        let e_acute = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let crab = bytes.iter().position(|b| *b == 0xF0).unwrap() + 2;
        let parts = vec![
            bytes[..e_acute].to_vec(),
            bytes[e_acute..crab].to_vec(),
            bytes[crab..].to_vec(),
        ];

        let frames: Vec<SseFrame> = sse_frames(raw_body(parts)).collect().await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "h\u{e9}llo \u{4e16}\u{754c} \u{1f980}");
    }

    #[tokio::test]
    async fn test_split_char_inside_tool_arguments() {
        let bytes = "data: {\"q\":\"caf\u{e9}\"}\n\n".as_bytes().to_vec();
        let cut = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let parts = vec![bytes[..cut].to_vec(), bytes[cut..].to_vec()];

        let frames: Vec<SseFrame> = sse_frames(raw_body(parts)).collect().await;
        let value: serde_json::Value = serde_json::from_str(&frames[0].data).unwrap();
        assert_eq!(value["q"], "caf\u{e9}");
    }

    #[tokio::test]
    async fn test_normalize_stops_at_done_and_ends_once() {
        let frames = sse_frames(body(&["data: a\n\n", "data: skip\n\n", "data: stop\n\n", "data: b\n\n"]));
        let chunks: Vec<NormalizedChunk> = normalize_frames(frames, |frame| match frame.data.as_str() {
            "stop" => Decoded::Done,
            "skip" => Decoded::Skip,
            other => Decoded::Chunks(vec![NormalizedChunk::delta(other), NormalizedChunk::End]),
        })
        .collect()
        .await;

        assert_eq!(chunks, vec![NormalizedChunk::delta("a"), NormalizedChunk::End]);
    }

    #[tokio::test]
    async fn test_normalize_empty_body_still_ends() {
        let chunks: Vec<NormalizedChunk> =
            normalize_frames(sse_frames(body(&[])), |_| Decoded::Skip)
                .collect()
                .await;
        assert_eq!(chunks, vec![NormalizedChunk::End]);
    }
}
