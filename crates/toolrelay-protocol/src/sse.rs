use bytes::{Bytes, BytesMut};

/// Data payload that ends an OpenAI-compatible event stream.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn is_done(&self) -> bool {
        self.data.trim() == DONE_SENTINEL
    }
}

/// Incremental `text/event-stream` decoder.
///
/// Network chunks may split a line, or a multi-byte UTF-8 sequence, anywhere.
/// Bytes are buffered until a full line is available, and only complete lines
/// are decoded.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: BytesMut,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, chunk: &Bytes) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            let line = String::from_utf8_lossy(&line[..pos]);
            self.push_line(&line, &mut events);
        }

        events
    }

    pub fn push_str(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.push_bytes(&Bytes::copy_from_slice(chunk.as_bytes()))
    }

    /// Flushes a trailing line without newline and any event still being assembled.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.push_line(&line, &mut events);
        }
        self.finish_event(&mut events);
        events
    }

    fn push_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            self.finish_event(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match name {
            "event" => {
                self.event = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "data" => self.data_lines.push(value.to_string()),
            // `id:` and `retry:` carry nothing the relay uses.
            _ => {}
        }
    }

    fn finish_event(&mut self, events: &mut Vec<SseEvent>) {
        if self.event.is_none() && self.data_lines.is_empty() {
            return;
        }
        let data = self.data_lines.join("\n");
        events.push(SseEvent {
            event: self.event.take(),
            data,
        });
        self.data_lines.clear();
    }
}
