#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! Typed stream events and the dispatch fabric that routes them to sinks.
//!
//! Layout: `payloads.rs` (event tagged union and payloads), `dispatch.rs`
//! (per-sink-type constant dispatch tables), `source.rs` (`EventSink` and the
//! multicasting `EventSource`), `handler.rs` (the default stream handler).

pub mod dispatch;
pub mod handler;
pub mod payloads;
pub mod source;

pub use dispatch::{DispatchTable, Handler};
pub use handler::{StreamHandler, stream_handler_table};
pub use payloads::{
    Event, EventKind, RangeRequestId, StreamCompleted, StreamDataArrived, StreamFailedOpen,
    StreamOpened,
};
pub use source::{EventSink, EventSource};
