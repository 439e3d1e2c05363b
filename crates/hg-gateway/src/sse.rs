//! Server-Sent Events decoding.
//!
//! The service pushes every named event as one SSE frame:
//!
//! ```text
//! event: response_chunk
//! data: {"chunk": "Hello"}
//!
//! ```
//!
//! Bytes are buffered until a full line is available, so multi-byte UTF-8
//! sequences split across network reads decode correctly.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use hg_protocol::RawEvent;
use serde_json::Value;

/// Event name used when a frame carries no `event:` field.
pub const DEFAULT_EVENT: &str = "message";

/// One dispatched SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// The `event:` field, if any.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    /// Last seen `id:` value at dispatch time.
    pub id: Option<String>,
}

impl SseFrame {
    /// Convert into the named-event form the client consumes.
    ///
    /// Data that is not JSON is passed through as a JSON string.
    pub fn into_raw_event(self) -> RawEvent {
        let name = match self.event {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_EVENT.to_string(),
        };
        let payload = if self.data.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&self.data).unwrap_or(Value::String(self.data))
        };
        RawEvent::new(name, payload)
    }
}

/// Incremental frame decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every frame completed by them.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush at end of input: an unterminated last line and any frame still
    /// waiting for its blank line are dispatched.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&rest);
            let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            // retry and unknown fields carry nothing for us
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let frame = SseFrame {
            event: self.event.take(),
            data: self.data.join("\n"),
            id: self.last_id.clone(),
        };
        self.data.clear();
        Some(frame)
    }
}

/// Decode a byte stream into frames. A read error ends the stream after
/// being yielded once.
pub fn frames<S, E>(bytes: S) -> impl Stream<Item = Result<SseFrame, E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    async_stream::stream! {
        futures::pin_mut!(bytes);
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for frame in decoder.feed(&chunk) {
                        yield Ok(frame);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            yield Ok(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes_stream(
        chunks: Vec<&'static str>,
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        futures::stream::iter(chunks.into_iter().map(|s| Ok(Bytes::from(s))))
    }

    async fn collect(chunks: Vec<&'static str>) -> Vec<SseFrame> {
        frames(bytes_stream(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn named_event_frame() {
        let frames = collect(vec!["event: status\ndata: {\"message\": \"hi\"}\n\n"]).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("status"));
        assert_eq!(frames[0].data, "{\"message\": \"hi\"}");
    }

    #[tokio::test]
    async fn multi_line_data_joined() {
        let frames = collect(vec!["data: one\ndata: two\n\n"]).await;
        assert_eq!(frames[0].data, "one\ntwo");
        assert_eq!(frames[0].event, None);
    }

    #[tokio::test]
    async fn frames_split_across_reads() {
        let frames = collect(vec!["event: resp", "onse_chunk\nda", "ta: {}\n", "\n"]).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("response_chunk"));
    }

    #[tokio::test]
    async fn utf8_split_across_reads() {
        let stream = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"data: h\xc3")),
            Ok(Bytes::from_static(b"\xa9llo\n\n")),
        ]);
        let frames: Vec<SseFrame> = frames(stream).map(|r| r.unwrap()).collect().await;
        assert_eq!(frames[0].data, "héllo");
    }

    #[tokio::test]
    async fn crlf_line_endings() {
        let frames = collect(vec!["event: connected\r\ndata: {}\r\n\r\n"]).await;
        assert_eq!(frames[0].event.as_deref(), Some("connected"));
        assert_eq!(frames[0].data, "{}");
    }

    #[tokio::test]
    async fn comments_and_unknown_fields_ignored() {
        let frames = collect(vec![": keepalive\nretry: 100\nfoo: bar\ndata: x\n\n"]).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "x");
    }

    #[tokio::test]
    async fn id_is_remembered() {
        let frames = collect(vec!["id: 7\ndata: a\n\ndata: b\n\n"]).await;
        assert_eq!(frames[0].id.as_deref(), Some("7"));
        assert_eq!(frames[1].id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn event_without_data_is_dropped() {
        let frames = collect(vec!["event: orphan\n\ndata: next\n\n"]).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "next");
    }

    #[tokio::test]
    async fn trailing_frame_without_blank_line() {
        let frames = collect(vec!["event: response_end\ndata: {\"time\": 1.5}"]).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("response_end"));
        assert_eq!(frames[0].data, "{\"time\": 1.5}");
    }

    #[tokio::test]
    async fn read_error_ends_stream() {
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"data: a\n\n")),
            Err(std::io::Error::other("reset")),
            Ok(Bytes::from_static(b"data: b\n\n")),
        ]);
        let items: Vec<_> = frames(stream).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn frame_to_raw_event_json() {
        let frame = SseFrame {
            event: Some("confidence".to_string()),
            data: r#"{"level": "HIGH", "score": 0.9}"#.to_string(),
            id: None,
        };
        let raw = frame.into_raw_event();
        assert_eq!(raw.name, "confidence");
        assert_eq!(raw.payload, json!({"level": "HIGH", "score": 0.9}));
    }

    #[test]
    fn frame_to_raw_event_plain_text_and_empty() {
        let raw = SseFrame {
            event: Some("error".to_string()),
            data: "model overloaded".to_string(),
            id: None,
        }
        .into_raw_event();
        assert_eq!(raw.payload, Value::String("model overloaded".to_string()));

        let raw = SseFrame {
            event: None,
            data: String::new(),
            id: None,
        }
        .into_raw_event();
        assert_eq!(raw.name, DEFAULT_EVENT);
        assert_eq!(raw.payload, Value::Null);
    }
}
