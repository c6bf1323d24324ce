//! Incremental server-sent events decoding
//!
//! Bytes arrive in arbitrary network-sized pieces. Lines are only decoded once
//! complete, so multi-byte UTF-8 characters split across reads stay intact.

/// One dispatched server-sent event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Stateful decoder turning a byte stream into events
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(event) = self.process_line(line.trim_end_matches(['\n', '\r'])) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not followed by a blank line
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.pending.is_empty() {
            let raw = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&raw).into_owned();
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment / keep-alive
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
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        // An event without data lines is dropped, name included
        let name = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let event = SseEvent {
            event: name,
            data: self.data.join("\n"),
        };
        self.data.clear();
        Some(event)
    }
}
