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

//! Host-agnostic browser stream: transfer state machine, range reads, writes and
//! teardown, plus the boundary traits host adapters implement.
//!
//! Layout: `model.rs` (identifiers, ranges, configuration, state snapshots),
//! `error.rs` (stream and host errors), `host.rs` (transport, dispatch context and
//! factory traits), `stream.rs` (the `Stream` entity).

pub mod error;
pub mod host;
pub mod model;
pub mod stream;

pub use error::{HostError, HostResult, StreamError, StreamResult};
pub use host::{DispatchContext, HostTransport, StreamFactory};
pub use model::{
    DEFAULT_INTERNAL_BUFFER_SIZE, Range, StreamConfig, StreamId, StreamProperties, StreamState,
};
pub use stream::Stream;

pub use hoststream_events::{
    Event, EventKind, EventSink, RangeRequestId, StreamCompleted, StreamDataArrived,
    StreamFailedOpen, StreamHandler, StreamOpened,
};
