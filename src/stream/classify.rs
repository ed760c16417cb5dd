//! Interpretation of assembled SSE records as change events or errors

use bson::Bson;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::WatchError;

use super::{percent, ServerSentEvent};

/// What a single [`ServerSentEvent`] turned out to be
#[derive(Debug)]
pub enum Classified<T> {
    /// A change event document
    Event(T),

    /// A terminal error, reported by the server or caused by a malformed event
    Error(WatchError),

    /// An event type the watch protocol does not use
    Ignored,
}

/// Classify an SSE record
///
/// Never fails: malformed payloads become [`Classified::Error`] values.
pub fn classify<T: DeserializeOwned>(sse: &ServerSentEvent) -> Classified<T> {
    let data = percent::decode(&sse.data);

    match sse.event_type.as_deref() {
        None | Some("" | "message") => match parse_document(&data) {
            Some(event) => Classified::Event(event),
            None => {
                tracing::warn!(data = %data, "server returned malformed event");
                Classified::Error(WatchError::new(
                    WatchError::BAD_BSON_PARSE,
                    format!("server returned malformed event: {data}"),
                ))
            }
        },
        Some("error") => {
            let error = parse_error(&data)
                .unwrap_or_else(|| WatchError::new(WatchError::UNKNOWN, &*data));
            tracing::warn!(code = %error.code, message = %error.message, "server sent error event");
            Classified::Error(error)
        }
        Some(other) => {
            tracing::debug!(event_type = other, "ignoring event type");
            Classified::Ignored
        }
    }
}

/// Parse extended JSON, normalised to its relaxed form.
///
/// Malformed markers such as `{"$oid": "not-hex"}` are rejected and
/// `$numberLong` / `$numberInt` / `$numberDouble` become plain numbers.
fn parse_ejson(data: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(data).ok()?;
    let bson = Bson::try_from(value).ok()?;
    Some(bson.into_relaxed_extjson())
}

/// Parse an ordinary event.
///
/// Objects, arrays and `null` pass the shape check; whether they are a
/// valid event is then up to `T`.
fn parse_document<T: DeserializeOwned>(data: &str) -> Option<T> {
    let value = parse_ejson(data)?;
    if !matches!(value, Value::Object(_) | Value::Array(_) | Value::Null) {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Parse an `{"error_code": ..., "error": ...}` frame.
///
/// Both fields have to be strings; anything else falls back to the default.
fn parse_error(data: &str) -> Option<WatchError> {
    let value = parse_ejson(data)?;
    let code = value.get("error_code")?.as_str()?;
    let message = value.get("error")?.as_str()?;
    Some(WatchError::new(code, message))
}
