//! atlas-watch: MongoDB change streams from Atlas App Services
//!
//! The core is [`stream::WatchStream`], a synchronous parser for the
//! Server-Sent Events body of a `watch` function call. [`watch`] adapts it
//! to an async stream of change events and [`client`] opens the HTTP
//! request that feeds it.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::too_many_lines)]

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod stream;
pub mod watch;

// Re-exports for convenience
pub use error::{Error, Result, WatchError};
pub use events::{ChangeEvent, Document};
pub use stream::{ServerSentEvent, WatchStream, WatchStreamState};
