//! Server-Sent Events decoding.
//!
//! [`SseDecoder`] is the line-level state machine; [`parse_sse_stream`] runs
//! it over a byte stream.

use futures::Stream;
use tokio_stream::StreamExt;

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Accumulates partial lines across chunks and dispatches events on blank lines.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw text; returns every event completed by it.
    pub fn push(&mut self, text: &str) -> Vec<SseEvent> {
        self.buffer.push_str(text);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                events.extend(self.dispatch());
            } else if line.starts_with(':') {
                // comment
            } else if let Some(value) = line.strip_prefix("event:") {
                self.event = Some(value.trim_start().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.trim_start().to_string());
            } else if let Some(value) = line.strip_prefix("id:") {
                self.id = Some(value.trim_start().to_string());
            }
        }
        events
    }

    /// End of input: dispatch whatever data is pending.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            if let Some(value) = rest.trim_end_matches('\r').strip_prefix("data:") {
                self.data.push(value.trim_start().to_string());
            }
        }
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        Some(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.id.take(),
        })
    }
}

/// Parse a byte stream as SSE events.
pub fn parse_sse_bytes<S, E>(byte_stream: S) -> impl Stream<Item = anyhow::Result<SseEvent>>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures::stream::unfold(
        SseState {
            byte_stream: Box::pin(byte_stream),
            decoder: SseDecoder::new(),
            ready: std::collections::VecDeque::new(),
            ended: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.ready.pop_front() {
                    return Some((Ok(event), state));
                }
                if state.ended {
                    return None;
                }

                match state.byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        let text = String::from_utf8_lossy(&chunk);
                        state.ready.extend(state.decoder.push(&text));
                    }
                    Some(Err(e)) => {
                        state.ended = true;
                        return Some((Err(anyhow::anyhow!("SSE stream error: {e}")), state));
                    }
                    None => {
                        state.ended = true;
                        state.ready.extend(state.decoder.finish());
                    }
                }
            }
        },
    )
}

/// Parse a reqwest response body as an SSE stream.
pub fn parse_sse_stream(response: reqwest::Response) -> impl Stream<Item = anyhow::Result<SseEvent>> {
    parse_sse_bytes(response.bytes_stream())
}

struct SseState<S> {
    byte_stream: std::pin::Pin<Box<S>>,
    decoder: SseDecoder,
    ready: std::collections::VecDeque<SseEvent>,
    ended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_joins_split_lines() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push("data: {\"a\"").is_empty());
        let events = decoder.push(":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"a\":1}");
    }

    #[test]
    fn test_decoder_fields_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(": keep-alive\r\nevent: delta\r\nid: 7\r\ndata: one\r\ndata: two\r\n\r\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: Some("delta".into()),
                data: "one\ntwo".into(),
                id: Some("7".into()),
            }]
        );
    }

    #[test]
    fn test_decoder_finish_flushes_unterminated_data() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push("data: [DONE]").is_empty());
        assert_eq!(decoder.finish().map(|e| e.data), Some("[DONE]".to_string()));
        assert!(decoder.finish().is_none());
    }

    #[tokio::test]
    async fn test_parse_byte_stream() {
        let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::from_static(b"data: first\n\nda")),
            Ok(bytes::Bytes::from_static(b"ta: second\n\n")),
        ];
        let events: Vec<String> = parse_sse_bytes(futures::stream::iter(chunks))
            .map(|e| e.map(|e| e.data).unwrap_or_default())
            .collect()
            .await;
        assert_eq!(events, vec!["first".to_string(), "second".to_string()]);
    }
}
