//! Error types for stream operations and the host transport boundary.
//!
//! # Design
//! - Precondition rejections are distinct variants so callers can tell them apart
//!   from host failures without string matching.
//! - Messages stay constant; operational context lives in fields.

use std::error::Error;

use thiserror::Error;

use crate::model::StreamId;

/// Failures reported by a host transport.
#[derive(Debug, Error)]
pub enum HostError {
    /// The host does not implement the operation.
    #[error("host operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
    /// The host does not know the stream.
    #[error("stream unknown to host")]
    UnknownStream {
        /// Identifier the host could not resolve.
        stream_id: StreamId,
    },
    /// The host refused the request.
    #[error("host rejected request")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
        /// Host-provided detail.
        reason: String,
    },
    /// The host failed while servicing the request.
    #[error("host operation failed")]
    Failed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Convenience alias for host transport results.
pub type HostResult<T> = Result<T, HostError>;

/// Primary error type for stream operations.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The operation needs an open, not yet completed stream.
    #[error("stream is not open")]
    NotOpen {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Range reads need a seekable stream.
    #[error("stream is not seekable")]
    NotSeekable {
        /// Operation identifier.
        operation: &'static str,
    },
    /// A requested range was empty or inverted.
    #[error("invalid byte range")]
    InvalidRange {
        /// Requested start offset.
        start: u64,
        /// Requested end offset.
        end: u64,
    },
    /// A batched read carried no ranges.
    #[error("no ranges requested")]
    EmptyRequest,
    /// The host transport failed the request.
    #[error("host transport failed")]
    Host {
        /// Operation identifier.
        operation: &'static str,
        /// Transport failure.
        #[source]
        source: HostError,
    },
    /// A stream factory could not produce a stream.
    #[error("stream creation failed")]
    Factory {
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StreamError {
    /// Whether the error is a synchronous precondition rejection that never reached
    /// the host.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotOpen { .. }
                | Self::NotSeekable { .. }
                | Self::InvalidRange { .. }
                | Self::EmptyRequest
        )
    }
}

/// Convenience alias for stream operation results.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_classification() {
        assert!(StreamError::NotOpen { operation: "read_range" }.is_precondition());
        assert!(StreamError::NotSeekable { operation: "read_range" }.is_precondition());
        assert!(StreamError::InvalidRange { start: 4, end: 2 }.is_precondition());
        assert!(StreamError::EmptyRequest.is_precondition());
        assert!(
            !StreamError::Host {
                operation: "write",
                source: HostError::Unsupported { operation: "write" },
            }
            .is_precondition()
        );
    }

    #[test]
    fn host_error_is_exposed_as_source() {
        let err = StreamError::Host {
            operation: "close",
            source: HostError::Rejected {
                operation: "close",
                reason: "busy".into(),
            },
        };
        assert_eq!(err.to_string(), "host transport failed");
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "host rejected request");
    }
}
