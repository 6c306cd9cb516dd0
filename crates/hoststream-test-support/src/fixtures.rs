//! Stream fixtures and canned host events.

use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use hoststream_core::{
    Event, HostTransport, RangeRequestId, Stream, StreamCompleted, StreamConfig,
    StreamDataArrived, StreamFailedOpen, StreamId, StreamOpened,
};

/// URL used by the scenario fixtures.
pub const TEST_URL: &str = "http://x/y";

static TRACING: Once = Once::new();

/// Install a test-writer tracing subscriber once per process. Honours `RUST_LOG`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Build a stream over `transport` and ask the host to open it.
///
/// # Errors
///
/// Returns an error if the transport refuses the open request.
pub fn stream_with_transport<T>(config: &StreamConfig, transport: &Arc<T>) -> Result<Arc<Stream>>
where
    T: HostTransport + 'static,
{
    let handle: Arc<dyn HostTransport> = transport.clone();
    let stream = Arc::new(Stream::new(StreamId::new(), config, handle));
    stream
        .open()
        .with_context(|| format!("failed to open stream for {}", config.url))?;
    Ok(stream)
}

/// Configuration used by the lifecycle scenario: cached, seekable, 4 KiB buffer.
#[must_use]
pub fn scenario_config() -> StreamConfig {
    StreamConfig::new(TEST_URL)
        .with_cache(true)
        .with_seekable(true)
        .with_internal_buffer_size(4096)
}

/// Host acknowledgement that the transfer opened with `length` bytes.
#[must_use]
pub fn opened_event(length: u64) -> Event {
    Event::Opened(StreamOpened {
        length: Some(length),
        ..StreamOpened::default()
    })
}

/// Host report that the transfer could not be opened.
#[must_use]
pub fn failed_open_event(reason: &str) -> Event {
    Event::FailedOpen(StreamFailedOpen {
        reason: Some(reason.to_string()),
    })
}

/// Chunk of `len` bytes starting at `offset`, each byte equal to its offset modulo 256.
#[must_use]
pub fn data_event(offset: u64, len: usize, request: Option<RangeRequestId>) -> Event {
    let data = (offset..)
        .take(len)
        .map(|position: u64| position.to_le_bytes()[0])
        .collect();
    Event::DataArrived(StreamDataArrived {
        offset,
        data,
        request,
    })
}

/// Terminal host notification.
#[must_use]
pub const fn completed_event(success: bool) -> Event {
    Event::Completed(StreamCompleted { success })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingTransport;

    #[test]
    fn data_event_bytes_follow_offsets() {
        let Event::DataArrived(chunk) = data_event(254, 4, None) else {
            panic!("expected data event");
        };
        assert_eq!(chunk.data, vec![254, 255, 0, 1]);
        assert_eq!(chunk.end(), 258);
    }

    #[test]
    fn stream_fixture_requests_open() -> Result<()> {
        let transport = Arc::new(RecordingTransport::new());
        let stream = stream_with_transport(&scenario_config(), &transport)?;
        assert_eq!(stream.url(), TEST_URL);
        assert_eq!(transport.operations(), vec!["open"]);
        Ok(())
    }

    #[test]
    fn refused_open_surfaces_as_error() {
        let transport = Arc::new(RecordingTransport::new());
        transport.fail("open");
        assert!(stream_with_transport(&scenario_config(), &transport).is_err());
    }
}
