//! Server-Sent Events (SSE) line accumulator
//!
//! Implements the event-stream interpretation algorithm from
//! https://html.spec.whatwg.org/multipage/server-sent-events.html, reduced to
//! what the watch endpoint actually sends: `event:` and `data:` fields,
//! comments and blank-line dispatch. `id:` and `retry:` are ignored.

/// A fully assembled SSE record, not a single `data: foo` line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerSentEvent {
    /// Event payload, multiple `data:` lines joined with `\n`
    pub data: String,

    /// Event type from the last `event:` line, if any
    pub event_type: Option<String>,
}

impl ServerSentEvent {
    /// Create an event with the default (message) type
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            event_type: None,
        }
    }

    /// Set the event type
    #[must_use]
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }
}

/// Accumulates SSE lines into [`ServerSentEvent`]s
#[derive(Debug, Default)]
pub struct SseParser {
    /// Payload of the event being assembled, each line followed by `\n`
    data_buffer: String,

    /// Type of the event being assembled, empty when unset
    event_type: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a single line, returning an event when the line dispatches one
    ///
    /// A trailing `\n` and then a trailing `\r` are stripped, so callers may
    /// pass lines with or without their terminator.
    pub fn process_line(&mut self, line: &str) -> Option<ServerSentEvent> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = Self::parse_field(line);
        match field {
            "event" => {
                self.event_type.clear();
                self.event_type.push_str(value);
            }
            "data" => {
                self.data_buffer.push_str(value);
                self.data_buffer.push('\n');
            }
            _ => {
                // Unknown field, ignore (even id and retry)
            }
        }

        None
    }

    /// Handle a blank line
    fn dispatch(&mut self) -> Option<ServerSentEvent> {
        // An event without data is discarded along with its type.
        if self.data_buffer.is_empty() {
            self.event_type.clear();
            return None;
        }

        let mut data = std::mem::take(&mut self.data_buffer);
        if data.ends_with('\n') {
            data.pop();
        }
        let event_type = std::mem::take(&mut self.event_type);

        Some(ServerSentEvent {
            data,
            event_type: Some(event_type),
        })
    }

    /// Parse a field line into (field_name, value)
    fn parse_field(line: &str) -> (&str, &str) {
        match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            // Field with no value
            None => (line, ""),
        }
    }
}
