//! Incremental Server-Sent Events decoder
//!
//! SSE format:
//!   event: <type>
//!   data: <content>
//!   <blank line>
//!
//! Chunks from the HTTP body can split a line anywhere (including inside a
//! UTF-8 sequence), so bytes are buffered until a full line is available.
//! Each `data:` line is paired with the most recent `event:` line of the
//! current frame; a frame without an `event:` line is a `message`.

/// Event type used when a frame carries no `event:` line
pub const DEFAULT_EVENT: &str = "message";

/// Event announcing the session's POST endpoint
pub const ENDPOINT_EVENT: &str = "endpoint";

/// One decoded `data:` line with its event type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Line-buffering decoder; feed it body chunks as they arrive
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every event completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line left without a newline when the stream ends
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned();
        self.process_line(line.trim_end_matches('\r'))
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            // Frame boundary
            self.event = None;
            return None;
        }
        if line.starts_with(':') {
            // Comment / keep-alive
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => {
                self.event = Some(value.trim().to_string());
                None
            }
            "data" => Some(SseEvent {
                event: self
                    .event
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
                data: value.to_string(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_frame() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: endpoint\ndata: /messages?sessionId=abc\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "endpoint".to_string(),
                data: "/messages?sessionId=abc".to_string(),
            }]
        );
    }

    #[test]
    fn test_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: mess").is_empty());
        assert!(decoder.push(b"age\r\ndata: {\"id\":").is_empty());
        let events = decoder.push(b"1,\"result\":{}}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "{\"id\":1,\"result\":{}}");
    }

    #[test]
    fn test_split_inside_utf8() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: héllo\n".as_bytes();
        let (a, b) = bytes.split_at(8);
        assert!(decoder.push(a).is_empty());
        let events = decoder.push(b);
        assert_eq!(events[0].data, "héllo");
    }

    #[test]
    fn test_default_event_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": ping\n\ndata: plain\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, DEFAULT_EVENT);
    }

    #[test]
    fn test_event_resets_between_frames() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: endpoint\ndata: /a\n\ndata: {}\n\n");
        assert_eq!(events[0].event, "endpoint");
        assert_eq!(events[1].event, "message");
    }

    #[test]
    fn test_finish_flushes_partial_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: endpoint\ndata: /tail").is_empty());
        let last = decoder.finish().unwrap();
        assert_eq!(last.data, "/tail");
        assert!(decoder.finish().is_none());
    }
}
