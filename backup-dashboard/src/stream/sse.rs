//! Incremental Server-Sent Events framing.
//!
//! Bytes arrive in arbitrary chunks; lines may be split anywhere, including
//! between the `\r` and `\n` of a CRLF pair.

use bytes::BytesMut;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field, `None` for the default `message` type
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

impl SseFrame {
    /// Unnamed and `message` events are payloads; named events (e.g. `keep-alive`) are not.
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
    event: Option<String>,
    data: Option<String>,
    last_event_id: Option<String>,
    retry_ms: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n' || *b == b'\r') {
            let consumed = if self.buf[pos] == b'\r' {
                match self.buf.get(pos + 1) {
                    Some(b'\n') => pos + 2,
                    Some(_) => pos + 1,
                    // CR at the end of the chunk: wait to see if LF follows
                    None => break,
                }
            } else {
                pos + 1
            };

            let taken = self.buf.split_to(consumed);
            let line = String::from_utf8_lossy(&taken[..pos]).into_owned();

            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Last `id:` seen, to be sent back as `Last-Event-ID` on reconnect.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Server-requested reconnection delay, if any `retry:` line arrived.
    pub fn take_retry_ms(&mut self) -> Option<u64> {
        self.retry_ms.take()
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
            "data" => match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            "id" if !value.contains('\0') => self.last_event_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry_ms = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take().filter(|e| !e.is_empty());
        let data = self.data.take()?;
        if data.is_empty() {
            return None;
        }
        Some(SseFrame { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: {\"type\":\"backup_deleted\"}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: None,
                data: "{\"type\":\"backup_deleted\"}".to_string(),
            }]
        );
    }

    #[test]
    fn test_multiline_data_and_crlf() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: first\r\ndata:second\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "first\nsecond");
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"da").is_empty());
        assert!(decoder.feed(b"ta: hel").is_empty());
        assert!(decoder.feed(b"lo\r").is_empty());
        let frames = decoder.feed(b"\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "hello");
    }

    #[test]
    fn test_comments_and_named_events() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b": ping\n\nevent: keep-alive\ndata: {}\n\ndata: x\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("keep-alive"));
        assert!(!frames[0].is_message());
        assert!(frames[1].is_message());
    }

    #[test]
    fn test_blank_data_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data:\n\n").is_empty());
        assert!(decoder.feed(b"event: message\n\n").is_empty());
    }

    #[test]
    fn test_id_and_retry_fields() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"id: 42\nretry: 2500\ndata: x\n\n");
        assert_eq!(decoder.last_event_id(), Some("42"));
        assert_eq!(decoder.take_retry_ms(), Some(2500));
        assert_eq!(decoder.take_retry_ms(), None);
    }
}
