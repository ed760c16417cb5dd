//! Pull-based change stream state machine
//!
//! [`WatchStream`] is fed data in whatever shape the transport provides
//! (raw bytes, lines, or assembled SSE records) and is then asked what it
//! has. The consumer loop looks like:
//!
//! ```
//! use atlas_watch::stream::{WatchStream, WatchStreamState};
//!
//! let mut stream: WatchStream = WatchStream::new();
//! stream.feed_buffer(b"data: {\"a\": 1}\n\ndata: {\"a\": 2}\n\n");
//!
//! let mut seen = Vec::new();
//! while stream.state() == WatchStreamState::HaveEvent {
//!     seen.push(stream.next_event());
//! }
//! assert_eq!(seen.len(), 2);
//! assert!(stream.error().is_none());
//! ```

use std::fmt;

use serde::de::DeserializeOwned;

use crate::{error::WatchError, events::Document};

use super::{
    classify::{classify, Classified},
    ServerSentEvent, SseParser, Utf8Decoder,
};

/// The state of a [`WatchStream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStreamState {
    /// Call one of the feed functions
    NeedData,

    /// Call [`WatchStream::next_event`] to consume an event
    HaveEvent,

    /// Call [`WatchStream::error`]; this state is terminal
    HaveError,
}

impl WatchStreamState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NeedData => "NEED_DATA",
            Self::HaveEvent => "HAVE_EVENT",
            Self::HaveError => "HAVE_ERROR",
        }
    }
}

impl fmt::Display for WatchStreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the stream currently holds; determines the state
#[derive(Debug, Default)]
enum Pending<T> {
    #[default]
    Nothing,
    Event(T),
    Error(WatchError),
}

/// Parser for a change stream delivered as Server-Sent Events
///
/// Pick one of [`feed_buffer`](Self::feed_buffer),
/// [`feed_line`](Self::feed_line) or [`feed_sse`](Self::feed_sse) per
/// instance; mixing them is not supported. Feeding outside
/// [`WatchStreamState::NeedData`] or calling [`next_event`](Self::next_event)
/// outside [`WatchStreamState::HaveEvent`] is a programming error and panics.
#[derive(Debug)]
pub struct WatchStream<T = Document> {
    pending: Pending<T>,

    /// Used by `feed_buffer` to construct lines
    decoder: Utf8Decoder,
    buffer: String,
    buffer_offset: usize,

    /// Used by `feed_line` to build the next SSE
    parser: SseParser,
}

impl<T: DeserializeOwned> WatchStream<T> {
    pub fn new() -> Self {
        Self {
            pending: Pending::Nothing,
            decoder: Utf8Decoder::new(),
            buffer: String::new(),
            buffer_offset: 0,
            parser: SseParser::new(),
        }
    }

    /// Feed a chunk of the response body
    ///
    /// The chunk may end anywhere, including inside a UTF-8 character.
    pub fn feed_buffer(&mut self, bytes: &[u8]) {
        self.assert_state(WatchStreamState::NeedData);
        self.decoder.decode_into(bytes, &mut self.buffer);
        self.advance_buffer_state();
    }

    /// Feed one line, with or without its `\n` / `\r\n` terminator
    pub fn feed_line(&mut self, line: &str) {
        self.assert_state(WatchStreamState::NeedData);
        if let Some(sse) = self.parser.process_line(line) {
            self.feed_sse(sse);
        }
    }

    /// Feed a fully assembled SSE record
    pub fn feed_sse(&mut self, sse: ServerSentEvent) {
        self.assert_state(WatchStreamState::NeedData);
        tracing::trace!(event_type = ?sse.event_type, len = sse.data.len(), "dispatching event");

        match classify(&sse) {
            Classified::Event(event) => self.pending = Pending::Event(event),
            Classified::Error(error) => self.pending = Pending::Error(error),
            Classified::Ignored => {}
        }
    }

    pub fn state(&self) -> WatchStreamState {
        match self.pending {
            Pending::Nothing => WatchStreamState::NeedData,
            Pending::Event(_) => WatchStreamState::HaveEvent,
            Pending::Error(_) => WatchStreamState::HaveError,
        }
    }

    /// Consume the pending event
    ///
    /// If the stream was fed with [`feed_buffer`](Self::feed_buffer) there
    /// may already be another event or an error buffered, so check
    /// [`state`](Self::state) again afterwards.
    pub fn next_event(&mut self) -> T {
        self.assert_state(WatchStreamState::HaveEvent);
        let Pending::Event(event) = std::mem::take(&mut self.pending) else {
            unreachable!("HAVE_EVENT always holds an event");
        };
        self.advance_buffer_state();
        event
    }

    /// The terminal error, present exactly in [`WatchStreamState::HaveError`]
    ///
    /// Reading it does not consume it. Once set, no more data should be fed.
    pub fn error(&self) -> Option<&WatchError> {
        match &self.pending {
            Pending::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Decoded text that has not been turned into lines yet
    pub fn buffered(&self) -> &str {
        &self.buffer[self.buffer_offset..]
    }

    fn advance_buffer_state(&mut self) {
        self.assert_state(WatchStreamState::NeedData);
        while self.state() == WatchStreamState::NeedData {
            if self.buffer_offset == self.buffer.len() {
                self.buffer.clear();
                self.buffer_offset = 0;
                return;
            }

            // CR-only newlines are not supported, just LF and CRLF.
            let Some(newline) = self.buffer[self.buffer_offset..].find('\n') else {
                // Partial line: slide it down to the front of the buffer.
                if self.buffer_offset != 0 {
                    self.buffer.drain(..self.buffer_offset);
                    self.buffer_offset = 0;
                }
                return;
            };

            let start = self.buffer_offset;
            let end = start + newline;
            self.buffer_offset = end + 1;
            if let Some(sse) = self.parser.process_line(&self.buffer[start..end]) {
                self.feed_sse(sse);
            }
        }
    }

    fn assert_state(&self, expected: WatchStreamState) {
        let actual = self.state();
        if actual != expected {
            panic!("Expected WatchStream to be in state {expected}, but in state {actual}");
        }
    }
}

impl<T: DeserializeOwned> Default for WatchStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    type Stream = WatchStream<Value>;

    fn assert_nd(ws: &Stream) {
        assert_eq!(ws.state(), WatchStreamState::NeedData);
    }

    fn assert_event(ws: &mut Stream, expected: Value) {
        assert_eq!(ws.state(), WatchStreamState::HaveEvent);
        assert_eq!(ws.next_event(), expected);
    }

    /// Strip leading whitespace from every line and drop a leading newline,
    /// so captures can be written indented.
    fn nows(text: &str) -> Vec<u8> {
        let text = text.strip_prefix('\n').unwrap_or(text);
        text.split('\n')
            .map(str::trim_start)
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes()
    }

    mod sse_processing {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_message_kinds() {
            let mut ws = Stream::new();
            ws.feed_sse(ServerSentEvent::new(r#"{"a": 1}"#).with_event_type(""));
            assert_event(&mut ws, json!({"a": 1}));
            assert_nd(&ws);

            ws.feed_sse(ServerSentEvent::new(r#"{"a": 2}"#).with_event_type("message"));
            assert_event(&mut ws, json!({"a": 2}));

            ws.feed_sse(ServerSentEvent::new(r#"{"a": 3}"#));
            assert_event(&mut ws, json!({"a": 3}));
            assert_nd(&ws);
        }

        #[test]
        fn test_array_and_null_events() {
            let mut ws = Stream::new();
            ws.feed_sse(ServerSentEvent::new("[1, 2]"));
            assert_event(&mut ws, json!([1, 2]));
            ws.feed_sse(ServerSentEvent::new("null"));
            assert_event(&mut ws, Value::Null);
            assert_nd(&ws);
        }

        #[test]
        fn test_invalid_extended_json() {
            let data = r#"{"_id": {"$oid": "not-hex"}, "n": {"$numberLong": "x"}}"#;
            let mut ws = Stream::new();
            ws.feed_sse(ServerSentEvent::new(data));
            assert_eq!(ws.state(), WatchStreamState::HaveError);
            assert_eq!(
                ws.error().map(|e| e.code.as_str()),
                Some(WatchError::BAD_BSON_PARSE)
            );
        }

        #[test]
        fn test_unknown_kinds_are_ignored() {
            let mut ws = Stream::new();
            ws.feed_sse(ServerSentEvent::new(r#"{"a": 1}"#).with_event_type("ignoreme"));
            assert_nd(&ws);
            ws.feed_sse(ServerSentEvent::new(r#"{"a": 2}"#));
            assert_event(&mut ws, json!({"a": 2}));
        }

        #[test]
        fn test_percent_encoding_all_valid() {
            let mut ws = Stream::new();
            // %0A and %0D decode to whitespace that the JSON parser skips.
            ws.feed_sse(ServerSentEvent::new(r#"{"a": "%25" %0A %0D }"#));
            assert_event(&mut ws, json!({"a": "%"}));
        }

        #[test]
        fn test_error_reading_does_not_consume() {
            let mut ws = Stream::new();
            ws.feed_sse(
                ServerSentEvent::new(r#"{"error_code": "BadRequest", "error": ":("}"#)
                    .with_event_type("error"),
            );
            assert_eq!(ws.state(), WatchStreamState::HaveError);
            let first = ws.error().cloned();
            assert_eq!(first, Some(WatchError::new("BadRequest", ":(")));
            assert_eq!(ws.error().cloned(), first);
            assert_eq!(ws.state(), WatchStreamState::HaveError);
        }

        #[test]
        fn test_error_percent_encoding() {
            let mut ws = Stream::new();
            ws.feed_sse(
                ServerSentEvent::new(r#"{"error_code": "BadRequest", "error": "100%25 failure"}"#)
                    .with_event_type("error"),
            );
            assert_eq!(ws.error(), Some(&WatchError::new("BadRequest", "100% failure")));
        }

        #[test]
        fn test_error_extra_field() {
            let mut ws = Stream::new();
            ws.feed_sse(
                ServerSentEvent::new(r#"{"bonus": "field", "error_code": "BadRequest", "error": ":("}"#)
                    .with_event_type("error"),
            );
            assert_eq!(ws.error(), Some(&WatchError::new("BadRequest", ":(")));
        }

        #[test]
        fn test_malformed_server_errors() {
            for data in [
                r#"{"no closing: "}""#,
                r#"{"error_code": "BadRequest"}"#,
                r#"{"error": ":("}"#,
            ] {
                let mut ws = Stream::new();
                ws.feed_sse(ServerSentEvent::new(data).with_event_type("error"));
                assert_eq!(ws.state(), WatchStreamState::HaveError);
                assert_eq!(ws.error(), Some(&WatchError::new("unknown", data)));
            }
        }

        #[test]
        fn test_lots_of_percent_encoding_in_error() {
            let mut ws = Stream::new();
            ws.feed_sse(ServerSentEvent::new("%25%26%0A%0D%").with_event_type("error"));
            assert_eq!(ws.error(), Some(&WatchError::new("unknown", "%%26\n\r%")));
        }

        #[test]
        fn test_malformed_ordinary_events() {
            let mut ws = Stream::new();
            ws.feed_sse(ServerSentEvent::new(r#"{"no closing: "}""#));
            assert_eq!(
                ws.error(),
                Some(&WatchError::new(
                    "bad bson parse",
                    r#"server returned malformed event: {"no closing: "}""#
                ))
            );

            let mut ws = Stream::new();
            ws.feed_sse(ServerSentEvent::new(r#""I'm just a string in the world""#));
            assert_eq!(
                ws.error(),
                Some(&WatchError::new(
                    "bad bson parse",
                    r#"server returned malformed event: "I'm just a string in the world""#
                ))
            );
        }
    }

    mod line_processing {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_simple() {
            let mut ws = Stream::new();
            ws.feed_line("event: message");
            assert_nd(&ws);
            ws.feed_line(r#"data: {"a": 1}"#);
            assert_nd(&ws);
            ws.feed_line("");
            assert_event(&mut ws, json!({"a": 1}));
            assert_nd(&ws);
        }

        #[test]
        fn test_terminators() {
            for terminator in ["\n", "\r", "\r\n"] {
                let mut ws = Stream::new();
                ws.feed_line(&format!("event: message{terminator}"));
                ws.feed_line(&format!("data: {{\"a\": 1}}{terminator}"));
                assert_nd(&ws);
                ws.feed_line(terminator);
                assert_event(&mut ws, json!({"a": 1}));
            }
        }

        #[test]
        fn test_multiple_with_implicit_event_kind() {
            let mut ws = Stream::new();
            ws.feed_line(r#"data: {"a": 1}"#);
            ws.feed_line("");
            assert_event(&mut ws, json!({"a": 1}));
            ws.feed_line(r#"data:{"a": 2}"#);
            ws.feed_line("");
            assert_event(&mut ws, json!({"a": 2}));
            assert_nd(&ws);
        }

        #[test]
        fn test_data_spread_over_multiple_lines() {
            let mut ws = Stream::new();
            ws.feed_line(r#"data: {"a""#);
            ws.feed_line(":");
            ws.feed_line("data::");
            ws.feed_line("data: 1}");
            assert_nd(&ws);
            ws.feed_line("");
            assert_event(&mut ws, json!({"a": 1}));
        }

        #[test]
        fn test_events_without_data_are_ignored() {
            let mut ws = Stream::new();
            ws.feed_line("event: message");
            ws.feed_line("");
            assert_nd(&ws);
            ws.feed_line("event: error");
            ws.feed_line("");
            assert_nd(&ws);
            // Prior event kinds were discarded, so this is a default message.
            ws.feed_line(r#"data: {"a": 1}"#);
            ws.feed_line("");
            assert_event(&mut ws, json!({"a": 1}));
        }

        #[test]
        fn test_error_newline_handling() {
            let mut ws = Stream::new();
            ws.feed_line("event: error\r\n");
            ws.feed_line("data: this error\r\n");
            ws.feed_line("data:  has three lines\r\n");
            ws.feed_line("data:  but only two LFs\r\n");
            assert_nd(&ws);
            ws.feed_line("\r\n");
            assert_eq!(ws.state(), WatchStreamState::HaveError);
            assert_eq!(
                ws.error().map(|e| e.message.as_str()),
                Some("this error\n has three lines\n but only two LFs")
            );
        }
    }

    mod buffer_processing {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_simple() {
            let mut ws = Stream::new();
            ws.feed_buffer(&nows(
                r#"
                event: message
                data: {"a": 1}

                "#,
            ));
            assert_event(&mut ws, json!({"a": 1}));
            assert_nd(&ws);
            assert_eq!(ws.buffered(), "");
        }

        #[test]
        fn test_multi_in_one_buffer() {
            let mut ws = Stream::new();
            ws.feed_buffer(&nows(
                r#"
                event: message
                data: {"a": 1}

                event: message
                data: {"a": 2}

                "#,
            ));
            assert_event(&mut ws, json!({"a": 1}));
            assert_event(&mut ws, json!({"a": 2}));
            assert_nd(&ws);
        }

        #[test]
        fn test_partial_lines() {
            let mut ws = Stream::new();
            ws.feed_buffer(&nows(
                r#"
                event: message
                data: {"a":"#,
            ));
            assert_nd(&ws);
            assert_eq!(ws.buffered(), r#"data: {"a":"#);
            ws.feed_buffer(b"1");
            assert_nd(&ws);
            ws.feed_buffer(b"}\n\n");
            assert_event(&mut ws, json!({"a": 1}));
            assert_nd(&ws);
        }

        #[test]
        fn test_multi_and_partial_lines() {
            let mut ws = Stream::new();
            ws.feed_buffer(&nows(
                r#"
                event: message
                data: {"a": 1}

                event: message
                data: {"a":"#,
            ));
            assert_event(&mut ws, json!({"a": 1}));
            assert_nd(&ws);
            ws.feed_buffer(b"2");
            assert_nd(&ws);
            ws.feed_buffer(&nows(
                r#"}

                event: message
                data: {"a": 3}

                "#,
            ));
            assert_event(&mut ws, json!({"a": 2}));
            assert_event(&mut ws, json!({"a": 3}));
            assert_nd(&ws);
        }

        #[test]
        fn test_event_then_error_in_one_buffer() {
            let mut ws = Stream::new();
            ws.feed_buffer(
                b"data: {\"a\": 1}\n\nevent: error\ndata: {\"error_code\": \"X\", \"error\": \"y\"}\n\n",
            );
            assert_event(&mut ws, json!({"a": 1}));
            assert_eq!(ws.state(), WatchStreamState::HaveError);
            assert_eq!(ws.error(), Some(&WatchError::new("X", "y")));
        }

        #[test]
        fn test_cr_alone_is_not_a_newline() {
            let mut ws = Stream::new();
            ws.feed_buffer(b"event: message\rdata: {\"a\": 1}\r\r");
            assert_nd(&ws);
        }

        #[test]
        fn test_split_multibyte_character() {
            let frame = "data: {\"name\": \"Zoë 🌍\"}\n\n".as_bytes();
            let split = frame.iter().position(|&b| b >= 0x80).unwrap() + 1;

            let mut ws = Stream::new();
            ws.feed_buffer(&frame[..split]);
            assert_nd(&ws);
            ws.feed_buffer(&frame[split..]);
            assert_event(&mut ws, json!({"name": "Zoë 🌍"}));
        }
    }

    mod contract {
        use super::*;

        #[test]
        #[should_panic(expected = "Expected WatchStream to be in state HAVE_EVENT, but in state NEED_DATA")]
        fn test_next_event_without_event() {
            let mut ws = Stream::new();
            ws.next_event();
        }

        #[test]
        #[should_panic(expected = "Expected WatchStream to be in state NEED_DATA, but in state HAVE_EVENT")]
        fn test_feed_while_holding_event() {
            let mut ws = Stream::new();
            ws.feed_sse(ServerSentEvent::new("{}"));
            ws.feed_line("data: {}");
        }

        #[test]
        #[should_panic(expected = "but in state HAVE_ERROR")]
        fn test_feed_after_error() {
            let mut ws = Stream::new();
            ws.feed_sse(ServerSentEvent::new("nope"));
            ws.feed_buffer(b"data: {}\n\n");
        }

        #[test]
        fn test_error_absent_outside_error_state() {
            let mut ws = Stream::new();
            assert!(ws.error().is_none());
            ws.feed_sse(ServerSentEvent::new("{}"));
            assert!(ws.error().is_none());
        }
    }
}
