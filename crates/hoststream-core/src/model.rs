//! Stream identifiers, byte ranges, factory parameters and state snapshots.
//!
//! # Design
//! - Pure data carriers; the `Stream` entity owns all mutation.
//! - `StreamConfig` mirrors the factory parameters a host adapter receives.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StreamError, StreamResult};

/// Internal buffer size used when the caller does not request one.
pub const DEFAULT_INTERNAL_BUFFER_SIZE: usize = 128 * 1024;

/// Identifier used by host adapters to route notifications to a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(Uuid);

impl StreamId {
    /// Fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an identifier chosen by the host.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for StreamId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, formatter)
    }
}

/// Byte interval `[start, end)` of the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    /// First requested byte.
    pub start: u64,
    /// One past the last requested byte.
    pub end: u64,
}

impl Range {
    /// Build a range, rejecting empty or inverted intervals.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRange`] when `start >= end`.
    pub fn new(start: u64, end: u64) -> StreamResult<Self> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(StreamError::InvalidRange { start, end })
        }
    }

    /// Whether the interval is non-empty.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Number of bytes covered.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the interval covers no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `offset` falls inside the interval.
    #[must_use]
    pub const fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.end
    }
}

impl Display for Range {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "[{}, {})", self.start, self.end)
    }
}

/// Parameters handed to a stream factory when application code requests a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Resource to transfer.
    pub url: String,
    /// Whether the host should materialise a local cache file.
    #[serde(default)]
    pub cache: bool,
    /// Whether range reads are requested.
    #[serde(default)]
    pub seekable: bool,
    /// Requested chunking size in bytes.
    #[serde(default = "default_internal_buffer_size")]
    pub internal_buffer_size: usize,
}

const fn default_internal_buffer_size() -> usize {
    DEFAULT_INTERNAL_BUFFER_SIZE
}

impl StreamConfig {
    /// Non-cached, sequential transfer of `url` with the default buffer size.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cache: false,
            seekable: false,
            internal_buffer_size: DEFAULT_INTERNAL_BUFFER_SIZE,
        }
    }

    /// Request a host cache file.
    #[must_use]
    pub const fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Request range-read support.
    #[must_use]
    pub const fn with_seekable(mut self, seekable: bool) -> Self {
        self.seekable = seekable;
        self
    }

    /// Override the internal buffer size.
    #[must_use]
    pub const fn with_internal_buffer_size(mut self, size: usize) -> Self {
        self.internal_buffer_size = size;
        self
    }
}

/// Lifecycle position of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Constructed; the host has not acknowledged the request yet.
    Created,
    /// The host acknowledged the request and is opening the transfer.
    Opening,
    /// The transfer is active.
    Opened,
    /// The transfer finished.
    Completed,
    /// The host could not open the transfer.
    FailedOpen,
    /// Torn down; no further events are delivered.
    Destroyed,
}

impl StreamState {
    /// Whether the transfer can make no further progress.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::FailedOpen | Self::Destroyed)
    }

    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Opening => "opening",
            Self::Opened => "opened",
            Self::Completed => "completed",
            Self::FailedOpen => "failed_open",
            Self::Destroyed => "destroyed",
        }
    }
}

impl Display for StreamState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Point-in-time copy of every stream property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamProperties {
    /// Stream identifier.
    pub id: StreamId,
    /// Resource being transferred.
    pub url: String,
    /// Current lifecycle state.
    pub state: StreamState,
    /// Whether range reads are available.
    pub seekable: bool,
    /// Whether a host cache file was requested.
    pub cached: bool,
    /// Requested chunking size.
    pub internal_buffer_size: usize,
    /// Host cache file, once confirmed.
    pub cache_filename: Option<PathBuf>,
    /// Total size, once known.
    pub length: Option<u64>,
    /// Reported content type.
    pub mime_type: Option<String>,
    /// Raw response headers.
    pub headers: Option<String>,
    /// Whether the transfer was accepted and activated.
    pub opened: bool,
    /// Whether the transfer reached a terminal outcome.
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_rejects_empty_and_inverted_intervals() {
        assert!(Range::new(0, 500).is_ok());
        assert!(matches!(
            Range::new(10, 10),
            Err(StreamError::InvalidRange { start: 10, end: 10 })
        ));
        assert!(Range::new(11, 10).is_err());
    }

    #[test]
    fn range_reports_length_and_membership() {
        let range = Range { start: 200, end: 300 };
        assert_eq!(range.len(), 100);
        assert!(range.contains(200));
        assert!(range.contains(299));
        assert!(!range.contains(300));
        assert_eq!(range.to_string(), "[200, 300)");

        let inverted = Range { start: 5, end: 1 };
        assert!(!inverted.is_valid());
        assert!(inverted.is_empty());
    }

    #[test]
    fn stream_config_builders_apply() {
        let config = StreamConfig::new("http://x/y")
            .with_cache(true)
            .with_seekable(true)
            .with_internal_buffer_size(4096);
        assert_eq!(config.url, "http://x/y");
        assert!(config.cache);
        assert!(config.seekable);
        assert_eq!(config.internal_buffer_size, 4096);
    }

    #[test]
    fn stream_config_deserializes_with_defaults() {
        let config: StreamConfig =
            serde_json::from_str(r#"{"url":"http://x/y"}"#).expect("config json");
        assert!(!config.cache);
        assert!(!config.seekable);
        assert_eq!(config.internal_buffer_size, DEFAULT_INTERNAL_BUFFER_SIZE);
    }

    #[test]
    fn terminal_states() {
        assert!(!StreamState::Created.is_terminal());
        assert!(!StreamState::Opening.is_terminal());
        assert!(!StreamState::Opened.is_terminal());
        assert!(StreamState::Completed.is_terminal());
        assert!(StreamState::FailedOpen.is_terminal());
        assert!(StreamState::Destroyed.is_terminal());
    }
}
