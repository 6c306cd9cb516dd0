//! Event payload types delivered by host-mediated streams.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifier assigned by a stream to each accepted range read request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RangeRequestId(pub u64);

impl RangeRequestId {
    /// Identifier that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Display for RangeRequestId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// Closed set of event kinds a sink can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The host accepted the transfer request.
    StreamCreated,
    /// The stream is being torn down.
    StreamDestroyed,
    /// The host could not open the transfer.
    StreamFailedOpen,
    /// The transfer was accepted and is active.
    StreamOpened,
    /// Bytes arrived for the transfer.
    StreamDataArrived,
    /// The transfer reached its terminal state.
    StreamCompleted,
}

impl EventKind {
    /// Number of distinct event kinds.
    pub const COUNT: usize = 6;

    /// Every kind in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::StreamCreated,
        Self::StreamDestroyed,
        Self::StreamFailedOpen,
        Self::StreamOpened,
        Self::StreamDataArrived,
        Self::StreamCompleted,
    ];

    /// Stable slot of the kind inside a dispatch table.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::StreamCreated => 0,
            Self::StreamDestroyed => 1,
            Self::StreamFailedOpen => 2,
            Self::StreamOpened => 3,
            Self::StreamDataArrived => 4,
            Self::StreamCompleted => 5,
        }
    }

    /// Machine-friendly name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StreamCreated => "stream_created",
            Self::StreamDestroyed => "stream_destroyed",
            Self::StreamFailedOpen => "stream_failed_open",
            Self::StreamOpened => "stream_opened",
            Self::StreamDataArrived => "stream_data_arrived",
            Self::StreamCompleted => "stream_completed",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Metadata reported by the host once a transfer is open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOpened {
    /// Total size of the resource, when the host knows it.
    pub length: Option<u64>,
    /// Content type reported by the host, e.g. `text/plain`.
    pub mime_type: Option<String>,
    /// Raw response headers.
    pub headers: Option<String>,
    /// Location of the host cache file for cached streams.
    pub cache_filename: Option<PathBuf>,
    /// Host-reported seek capability; `None` keeps the requested value.
    pub seekable: Option<bool>,
}

/// Failure detail for a transfer that never opened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFailedOpen {
    /// Host-provided reason, if any.
    pub reason: Option<String>,
}

/// A chunk of bytes delivered by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDataArrived {
    /// Offset of the first byte within the remote resource.
    pub offset: u64,
    /// Bytes as delivered by the host.
    pub data: Vec<u8>,
    /// Range request this chunk answers; `None` for sequential delivery.
    pub request: Option<RangeRequestId>,
}

impl StreamDataArrived {
    /// Offset one past the last delivered byte.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset
            .saturating_add(u64::try_from(self.data.len()).unwrap_or(u64::MAX))
    }
}

/// Terminal outcome of a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCompleted {
    /// Whether the host finished the transfer successfully.
    pub success: bool,
}

/// One occurrence in the life of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The host accepted the transfer request.
    Created,
    /// The stream is being torn down; always the last event.
    Destroyed,
    /// The host could not open the transfer.
    FailedOpen(StreamFailedOpen),
    /// The transfer is active.
    Opened(StreamOpened),
    /// Bytes arrived.
    DataArrived(StreamDataArrived),
    /// The transfer finished, successfully or not.
    Completed(StreamCompleted),
}

impl Event {
    /// Discriminator used to look up handlers.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Created => EventKind::StreamCreated,
            Self::Destroyed => EventKind::StreamDestroyed,
            Self::FailedOpen(_) => EventKind::StreamFailedOpen,
            Self::Opened(_) => EventKind::StreamOpened,
            Self::DataArrived(_) => EventKind::StreamDataArrived,
            Self::Completed(_) => EventKind::StreamCompleted,
        }
    }
}
