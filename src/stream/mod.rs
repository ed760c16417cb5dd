//! Change stream parsing
//!
//! The watch endpoint answers with a long-lived Server-Sent Events body.
//! Data flows through the submodules in this order:
//!
//! 1. [`utf8`]: bytes to text, tolerating characters split across chunks
//! 2. [`WatchStream`]: text to lines
//! 3. [`sse_parser`]: lines to [`ServerSentEvent`] records
//! 4. [`percent`]: undo the server's `%25` / `%0A` / `%0D` escaping
//! 5. [`classify`]: records to change events or a [`WatchError`](crate::WatchError)
//!
//! Everything here is synchronous and performs no I/O; see [`crate::watch`]
//! for the async adapter that drives it from an HTTP body.

pub mod classify;
pub mod percent;
pub mod sse_parser;
pub mod utf8;
pub mod watch_stream;

pub use sse_parser::{ServerSentEvent, SseParser};
pub use utf8::Utf8Decoder;
pub use watch_stream::{WatchStream, WatchStreamState};
