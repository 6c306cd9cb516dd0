//! Recording fakes for the host transport and for event sinks.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hoststream_core::{
    Event, EventKind, EventSink, HostError, HostResult, HostTransport, Range, RangeRequestId,
    Stream, StreamConfig, StreamId, StreamState,
};

/// Reason carried by injected host failures.
pub const INJECTED_FAILURE: &str = "injected failure";

/// One request observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    /// `open` was requested.
    Open {
        /// Target stream.
        stream: StreamId,
        /// Parameters passed to the host.
        config: StreamConfig,
    },
    /// `request_ranges` was requested.
    RequestRanges {
        /// Target stream.
        stream: StreamId,
        /// Identifier assigned by the stream.
        request: RangeRequestId,
        /// Requested intervals.
        ranges: Vec<Range>,
    },
    /// `write` was requested.
    Write {
        /// Target stream.
        stream: StreamId,
        /// Bytes the host accepted.
        accepted: Vec<u8>,
        /// Bytes offered by the caller.
        offered: usize,
    },
    /// `close` was requested.
    Close {
        /// Target stream.
        stream: StreamId,
    },
}

impl HostCall {
    /// Operation name matching the [`HostTransport`] method.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::RequestRanges { .. } => "request_ranges",
            Self::Write { .. } => "write",
            Self::Close { .. } => "close",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Rejected,
    Broken,
}

/// Host transport that records every request and can be told to misbehave.
///
/// Like a real host it only knows streams it opened and has not closed since;
/// other requests fail with [`HostError::UnknownStream`].
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<HostCall>>,
    write_cap: Mutex<Option<usize>>,
    failing: Mutex<HashMap<&'static str, Failure>>,
    known: Mutex<HashSet<StreamId>>,
}

impl RecordingTransport {
    /// Transport that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that accepts at most `cap` bytes per write.
    #[must_use]
    pub fn with_write_cap(cap: usize) -> Self {
        let transport = Self::default();
        transport.set_write_cap(Some(cap));
        transport
    }

    /// Change the per-write acceptance cap; `None` accepts whole writes.
    pub fn set_write_cap(&self, cap: Option<usize>) {
        *lock(&self.write_cap) = cap;
    }

    /// Make the host refuse `operation` until [`RecordingTransport::recover`] is called.
    pub fn fail(&self, operation: &'static str) {
        lock(&self.failing).insert(operation, Failure::Rejected);
    }

    /// Make `operation` fail with an I/O error until [`RecordingTransport::recover`]
    /// is called.
    pub fn break_down(&self, operation: &'static str) {
        lock(&self.failing).insert(operation, Failure::Broken);
    }

    /// Drop `stream` on the host side, as if the host lost track of it.
    pub fn forget(&self, stream: StreamId) {
        lock(&self.known).remove(&stream);
    }

    /// Stop failing `operation`.
    pub fn recover(&self, operation: &'static str) {
        lock(&self.failing).remove(operation);
    }

    /// Every recorded request in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        lock(&self.calls).clone()
    }

    /// Operation names of the recorded requests in call order.
    #[must_use]
    pub fn operations(&self) -> Vec<&'static str> {
        lock(&self.calls).iter().map(HostCall::operation).collect()
    }

    /// Concatenation of every accepted write.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                HostCall::Write { accepted, .. } => Some(accepted.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    fn check(&self, operation: &'static str) -> HostResult<()> {
        let failure = lock(&self.failing).get(operation).copied();
        match failure {
            None => Ok(()),
            Some(Failure::Rejected) => Err(HostError::Rejected {
                operation,
                reason: INJECTED_FAILURE.to_string(),
            }),
            Some(Failure::Broken) => Err(HostError::Failed {
                operation,
                source: Box::new(io::Error::other(INJECTED_FAILURE)),
            }),
        }
    }

    fn check_known(&self, operation: &'static str, stream: StreamId) -> HostResult<()> {
        self.check(operation)?;
        if lock(&self.known).contains(&stream) {
            Ok(())
        } else {
            Err(HostError::UnknownStream { stream_id: stream })
        }
    }

    fn record(&self, call: HostCall) {
        lock(&self.calls).push(call);
    }
}

impl HostTransport for RecordingTransport {
    fn open(&self, stream: StreamId, config: &StreamConfig) -> HostResult<()> {
        self.check("open")?;
        lock(&self.known).insert(stream);
        self.record(HostCall::Open {
            stream,
            config: config.clone(),
        });
        Ok(())
    }

    fn request_ranges(
        &self,
        stream: StreamId,
        request: RangeRequestId,
        ranges: &[Range],
    ) -> HostResult<()> {
        self.check_known("request_ranges", stream)?;
        self.record(HostCall::RequestRanges {
            stream,
            request,
            ranges: ranges.to_vec(),
        });
        Ok(())
    }

    fn write(&self, stream: StreamId, data: &[u8]) -> HostResult<usize> {
        self.check_known("write", stream)?;
        let accepted = lock(&self.write_cap).map_or(data.len(), |cap| cap.min(data.len()));
        self.record(HostCall::Write {
            stream,
            accepted: data[..accepted].to_vec(),
            offered: data.len(),
        });
        Ok(accepted)
    }

    fn close(&self, stream: StreamId) -> HostResult<()> {
        self.check_known("close", stream)?;
        lock(&self.known).remove(&stream);
        self.record(HostCall::Close { stream });
        Ok(())
    }
}

/// One delivery observed by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Kind of the delivered event.
    pub kind: EventKind,
    /// The event as delivered.
    pub event: Event,
    /// Stream state observed while handling the event.
    pub state: StreamState,
}

/// Sink that records every event a stream fires at it.
#[derive(Debug)]
pub struct RecordingSink {
    handled: bool,
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingSink {
    /// Sink that reports every event as handled.
    #[must_use]
    pub const fn new() -> Self {
        Self::reporting(true)
    }

    /// Sink whose dispatch returns `handled`.
    #[must_use]
    pub const fn reporting(handled: bool) -> Self {
        Self {
            handled,
            deliveries: Mutex::new(Vec::new()),
        }
    }

    /// Every delivery in order.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        lock(&self.deliveries).clone()
    }

    /// Kinds of the delivered events in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        lock(&self.deliveries)
            .iter()
            .map(|delivery| delivery.kind)
            .collect()
    }

    /// How many events of `kind` were delivered.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        lock(&self.deliveries)
            .iter()
            .filter(|delivery| delivery.kind == kind)
            .count()
    }

    /// Forget every recorded delivery.
    pub fn reset(&self) {
        lock(&self.deliveries).clear();
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink<Stream> for RecordingSink {
    fn dispatch(&self, event: &Event, stream: &Stream) -> bool {
        let state = stream.state();
        lock(&self.deliveries).push(Delivery {
            kind: event.kind(),
            event: event.clone(),
            state,
        });
        self.handled
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
