//! Async adapter from a response body to change events
//!
//! [`change_stream`] drives a [`WatchStream`] from a stream of byte chunks
//! and turns it into a stream of decoded events. A terminal watch error is
//! yielded once as [`Error::Watch`] and ends the stream.
//!
//! Cancellation is dropping the returned stream: that drops the byte source
//! as well, which aborts the underlying HTTP body.

use std::pin::Pin;

use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::{
    error::{Error, Result},
    events::Document,
    stream::{WatchStream, WatchStreamState},
};

/// Stream of change events
pub type ChangeStream<T = Document> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

/// Decode change events from a stream of byte chunks
pub fn change_stream<T, S, B, E>(byte_stream: S) -> ChangeStream<T>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<Error> + Send,
{
    Box::pin(async_stream::stream! {
        let mut watch_stream = WatchStream::<T>::new();
        let mut byte_stream = Box::pin(byte_stream);
        let mut events = 0usize;

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(e) => {
                    let e = e.into();
                    tracing::debug!(error = %e, "change stream transport failed");
                    yield Err(e);
                    break;
                }
            };
            let bytes = chunk.as_ref();
            if bytes.is_empty() {
                continue;
            }

            watch_stream.feed_buffer(bytes);
            while watch_stream.state() == WatchStreamState::HaveEvent {
                events += 1;
                yield Ok(watch_stream.next_event());
            }

            if let Some(error) = watch_stream.error().cloned() {
                tracing::debug!(events, code = %error.code, "change stream ended with error");
                yield Err(Error::Watch(error));
                break;
            }
        }

        tracing::debug!(events, "change stream closed");
    })
}
