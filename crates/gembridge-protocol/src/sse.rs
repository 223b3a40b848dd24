use bytes::Bytes;
use serde::Serialize;

pub const DONE: &str = "[DONE]";
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Encodes one value as a `data: <json>\n\n` frame.
pub fn sse_json_bytes<T: Serialize>(value: &T) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

pub fn sse_done_bytes() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

/// Incremental decoder for an SSE byte stream.
///
/// Bytes can be pushed in arbitrary splits; each completed event yields its
/// `data` payload (multi-line data joined with `\n`). Comments and fields
/// other than `data` are ignored.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = self.process_line(&line) {
                events.push(data);
            }
        }
        events
    }

    /// Flushes a trailing line without newline and any event still open.
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            if let Some(data) = self.process_line(&line) {
                events.push(data);
            }
        }
        if let Some(data) = self.dispatch() {
            events.push(data);
        }
        events
    }

    fn process_line(&mut self, line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let data = rest.strip_prefix(' ').unwrap_or(rest);
            self.data_lines.push(data.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(data)
    }
}
