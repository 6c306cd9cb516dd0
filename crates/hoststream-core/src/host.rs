//! Boundary traits implemented by host adapters.

use std::sync::Arc;

use hoststream_events::RangeRequestId;

use crate::error::{HostError, HostResult, StreamResult};
use crate::model::{Range, StreamConfig, StreamId};
use crate::stream::Stream;

/// Host transfer backend: performs the actual network or file work.
///
/// Every method is a non-blocking request. Outcomes arrive later as events pushed
/// into the plugin's serialized context.
pub trait HostTransport: Send + Sync {
    /// Start the transfer described by `config` for `stream`.
    ///
    /// # Errors
    ///
    /// Returns an error when the host refuses to start the transfer.
    fn open(&self, stream: StreamId, config: &StreamConfig) -> HostResult<()>;

    /// Request the bytes covered by `ranges`; data arrives tagged with `request`.
    ///
    /// # Errors
    ///
    /// Default implementation reports lack of support.
    fn request_ranges(
        &self,
        stream: StreamId,
        request: RangeRequestId,
        ranges: &[Range],
    ) -> HostResult<()> {
        let _ = (stream, request, ranges);
        Err(HostError::Unsupported {
            operation: "request_ranges",
        })
    }

    /// Hand `data` to the host; returns how many bytes it accepted.
    ///
    /// # Errors
    ///
    /// Default implementation reports lack of support.
    fn write(&self, stream: StreamId, data: &[u8]) -> HostResult<usize> {
        let _ = (stream, data);
        Err(HostError::Unsupported { operation: "write" })
    }

    /// Cancel the transfer. Must tolerate streams that are already finished.
    ///
    /// # Errors
    ///
    /// Returns an error when the host cannot cancel the transfer.
    fn close(&self, stream: StreamId) -> HostResult<()>;
}

/// Serialized context that owns event delivery for the streams it created.
///
/// A stream bound to a context never fires from a foreign thread: teardown requested
/// outside the context is queued and completed inside it.
pub trait DispatchContext: Send + Sync {
    /// Whether the caller is currently running inside this context.
    fn is_current(&self) -> bool;

    /// Queue teardown of `stream`; returns `false` once the context has stopped.
    fn schedule_teardown(&self, stream: StreamId) -> bool;
}

/// Factory application code uses to request a transfer.
pub trait StreamFactory: Send + Sync {
    /// Create a stream for `config` and ask the host to start it.
    ///
    /// # Errors
    ///
    /// Returns an error when the stream cannot be registered or the host refuses it.
    fn create_stream(&self, config: StreamConfig) -> StreamResult<Arc<Stream>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OpenOnly;

    impl HostTransport for OpenOnly {
        fn open(&self, _stream: StreamId, _config: &StreamConfig) -> HostResult<()> {
            Ok(())
        }

        fn close(&self, _stream: StreamId) -> HostResult<()> {
            Ok(())
        }
    }

    #[test]
    fn transport_default_methods_error() {
        let transport = OpenOnly;
        let id = StreamId::new();
        assert!(matches!(
            transport.request_ranges(id, RangeRequestId(1), &[Range { start: 0, end: 1 }]),
            Err(HostError::Unsupported {
                operation: "request_ranges"
            })
        ));
        assert!(matches!(
            transport.write(id, b"abc"),
            Err(HostError::Unsupported { operation: "write" })
        ));
        assert!(transport.open(id, &StreamConfig::new("http://x/y")).is_ok());
        assert!(transport.close(id).is_ok());
    }
}
