//! Incremental Server-Sent-Events decoder.
use bytes::{Buf, BytesMut};

/// A dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, or `message` when none was sent.
    pub event: String,
    /// All `data:` lines of the event joined with `\n`.
    pub data: String,
}

/// Turns arbitrary byte chunks into SSE events.
///
/// Chunk boundaries may fall anywhere, including inside a line terminator or
/// a multi-byte character.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(line) = self.next_line(false) {
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing line at end of input.
    ///
    /// An event that was never terminated by a blank line is discarded.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        while let Some(line) = self.next_line(true) {
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        self.event = None;
        self.data.clear();
        events
    }

    fn next_line(&mut self, at_eof: bool) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n' || b == b'\r');
        let Some(pos) = pos else {
            if at_eof && !self.buf.is_empty() {
                let rest = self.buf.split();
                return Some(String::from_utf8_lossy(&rest).into_owned());
            }
            return None;
        };

        let terminator_len = if self.buf[pos] == b'\r' {
            match self.buf.get(pos + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                // A lone '\r' at the end may be the first half of "\r\n".
                None if at_eof => 1,
                None => return None,
            }
        } else {
            1
        };

        let line = self.buf.split_to(pos);
        self.buf.advance(terminator_len);
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
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
            // `id` and `retry` only matter for reconnection, which is not attempted.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}
