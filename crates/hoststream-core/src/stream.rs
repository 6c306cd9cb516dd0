//! The `Stream` entity: one host-mediated transfer and its lifecycle.
//!
//! # Design
//! - Mutable facets live behind one mutex that is never held while sinks run or
//!   while the host is called.
//! - Host notifications enter through [`Stream::handle_event`]; application code
//!   only observes state and issues requests.
//! - Teardown fires `Destroyed` exactly once, then detaches every sink.
//! - A stream bound to a [`DispatchContext`] only fires inside that context; a
//!   `close` from any other thread cancels with the host at once and queues the
//!   teardown behind whatever the context is delivering.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hoststream_events::{
    Event, EventSink, EventSource, RangeRequestId, StreamDataArrived, StreamFailedOpen,
    StreamOpened,
};
use tracing::{debug, info, trace, warn};

use crate::error::{StreamError, StreamResult};
use crate::host::{DispatchContext, HostTransport};
use crate::model::{Range, StreamConfig, StreamId, StreamProperties, StreamState};

/// Reason attached to a synthesized open failure when the host completes a transfer
/// that never opened.
const COMPLETED_BEFORE_OPEN: &str = "transfer completed before it was opened";

#[derive(Debug)]
struct PendingRead {
    remaining: Vec<Range>,
}

impl PendingRead {
    fn consume(&mut self, start: u64, end: u64) {
        let mut rest = Vec::with_capacity(self.remaining.len() + 1);
        for range in self.remaining.drain(..) {
            if range.end <= start || end <= range.start {
                rest.push(range);
                continue;
            }
            if range.start < start {
                rest.push(Range {
                    start: range.start,
                    end: start,
                });
            }
            if end < range.end {
                rest.push(Range {
                    start: end,
                    end: range.end,
                });
            }
        }
        self.remaining = rest;
    }

    fn is_satisfied(&self) -> bool {
        self.remaining.is_empty()
    }
}

#[derive(Debug)]
struct Facets {
    state: StreamState,
    requested: bool,
    closing: bool,
    seekable: bool,
    opened: bool,
    completed: bool,
    length: Option<u64>,
    mime_type: Option<String>,
    headers: Option<String>,
    cache_filename: Option<PathBuf>,
    next_request: RangeRequestId,
    pending: BTreeMap<RangeRequestId, PendingRead>,
}

impl Facets {
    const fn new(seekable: bool) -> Self {
        Self {
            state: StreamState::Created,
            requested: false,
            closing: false,
            seekable,
            opened: false,
            completed: false,
            length: None,
            mime_type: None,
            headers: None,
            cache_filename: None,
            next_request: RangeRequestId(1),
            pending: BTreeMap::new(),
        }
    }

    fn apply_opened(&mut self, payload: &StreamOpened) {
        self.state = StreamState::Opened;
        self.opened = true;
        self.length = payload.length;
        self.mime_type.clone_from(&payload.mime_type);
        self.headers.clone_from(&payload.headers);
        self.cache_filename.clone_from(&payload.cache_filename);
        if let Some(seekable) = payload.seekable {
            self.seekable = seekable;
        }
    }

    fn apply_failed_open(&mut self) {
        self.state = StreamState::FailedOpen;
        self.opened = false;
        self.completed = true;
        self.pending.clear();
    }

    /// Marks the transfer finished and returns how many reads went unanswered.
    fn apply_completed(&mut self) -> usize {
        self.state = StreamState::Completed;
        self.completed = true;
        let unanswered = self.pending.len();
        self.pending.clear();
        unanswered
    }

    fn retire(&mut self, arrived: &StreamDataArrived) {
        let (start, end) = (arrived.offset, arrived.end());
        if start >= end {
            return;
        }
        let satisfied: Vec<RangeRequestId> = self
            .pending
            .iter_mut()
            .filter(|(id, _)| arrived.request.is_none_or(|request| request == **id))
            .filter_map(|(id, read)| {
                read.consume(start, end);
                read.is_satisfied().then_some(*id)
            })
            .collect();
        for id in satisfied {
            self.pending.remove(&id);
        }
    }

    fn ensure_readable(&self, operation: &'static str) -> StreamResult<()> {
        if self.state != StreamState::Opened || self.closing {
            return Err(StreamError::NotOpen { operation });
        }
        if !self.seekable {
            return Err(StreamError::NotSeekable { operation });
        }
        Ok(())
    }
}

/// Outcome of applying a host notification to the facets.
enum Reaction<'a> {
    Fire(Cow<'a, Event>),
    Destroy,
    Ignore,
}

/// One host-mediated data transfer.
///
/// A stream is an event source: host notifications update its facets and are then
/// multicast to the attached sinks in attachment order.
pub struct Stream {
    id: StreamId,
    url: String,
    cached: bool,
    internal_buffer_size: usize,
    facets: Mutex<Facets>,
    sinks: EventSource<Self>,
    transport: Arc<dyn HostTransport>,
    context: Option<Arc<dyn DispatchContext>>,
}

impl Stream {
    /// Build a stream for `config`. The host is not contacted until [`Stream::open`].
    #[must_use]
    pub fn new(id: StreamId, config: &StreamConfig, transport: Arc<dyn HostTransport>) -> Self {
        Self {
            id,
            url: config.url.clone(),
            cached: config.cache,
            internal_buffer_size: config.internal_buffer_size,
            facets: Mutex::new(Facets::new(config.seekable)),
            sinks: EventSource::new(),
            transport,
            context: None,
        }
    }

    /// Bind the stream to the serialized context that delivers its events.
    #[must_use]
    pub fn with_context(mut self, context: Arc<dyn DispatchContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Ask the host to start the transfer. Factories call this once, after the
    /// stream is reachable by host notifications; later calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Host`] when the host refuses the transfer. The stream
    /// is then torn down without a host round-trip.
    pub fn open(&self) -> StreamResult<()> {
        let config = {
            let mut facets = self.lock();
            if facets.requested || facets.state != StreamState::Created {
                debug!(stream_id = %self.id, state = %facets.state, "stream already requested");
                return Ok(());
            }
            facets.requested = true;
            StreamConfig {
                url: self.url.clone(),
                cache: self.cached,
                seekable: facets.seekable,
                internal_buffer_size: self.internal_buffer_size,
            }
        };
        if let Err(source) = self.transport.open(self.id, &config) {
            warn!(stream_id = %self.id, url = %self.url, error = %source, "host refused stream");
            self.destroy();
            return Err(StreamError::Host {
                operation: "open",
                source,
            });
        }
        info!(stream_id = %self.id, url = %self.url, "stream requested");
        Ok(())
    }

    /// Attach `sink`; returns whether it was added. Destroyed streams accept no sinks.
    pub fn attach<S>(&self, sink: &Arc<S>) -> bool
    where
        S: EventSink<Self> + 'static,
    {
        let facets = self.lock();
        if facets.state == StreamState::Destroyed {
            return false;
        }
        self.sinks.attach(sink)
    }

    /// Detach `sink`; returns whether it was attached. Safe from inside a handler.
    pub fn detach<S>(&self, sink: &Arc<S>) -> bool
    where
        S: EventSink<Self> + 'static,
    {
        self.sinks.detach(sink)
    }

    /// Number of live attached sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Apply a host notification and fire it to the attached sinks.
    ///
    /// Must be called from the plugin's serialized context. Returns whether any
    /// sink handled the event; ignored notifications return `false`.
    pub fn handle_event(&self, event: &Event) -> bool {
        let synthesize_created = matches!(
            event,
            Event::Opened(_) | Event::FailedOpen(_) | Event::Completed(_)
        ) && self.state() == StreamState::Created;
        if synthesize_created {
            self.handle_event(&Event::Created);
        }

        match self.react(event) {
            Reaction::Fire(event) => self.sinks.fire(self, &event),
            Reaction::Destroy => {
                self.destroy();
                false
            }
            Reaction::Ignore => false,
        }
    }

    /// Request the bytes `[start, end)` from a seekable, open stream.
    ///
    /// # Errors
    ///
    /// Returns a precondition error without contacting the host when the stream is
    /// not open, not seekable, or the range is empty; [`StreamError::Host`] when the
    /// host refuses the request.
    pub fn read_range(&self, start: u64, end: u64) -> StreamResult<RangeRequestId> {
        self.lock().ensure_readable("read_range")?;
        let range = Range::new(start, end)?;
        self.request("read_range", &[range])
    }

    /// Request several ranges as one logical request.
    ///
    /// # Errors
    ///
    /// Fails as a unit, like [`Stream::read_range`]; an empty slice is
    /// [`StreamError::EmptyRequest`].
    pub fn read_ranges(&self, ranges: &[Range]) -> StreamResult<RangeRequestId> {
        self.lock().ensure_readable("read_ranges")?;
        if ranges.is_empty() {
            return Err(StreamError::EmptyRequest);
        }
        if let Some(invalid) = ranges.iter().find(|range| !range.is_valid()) {
            return Err(StreamError::InvalidRange {
                start: invalid.start,
                end: invalid.end,
            });
        }
        self.request("read_ranges", ranges)
    }

    /// Hand `data` to the host; returns how many bytes it accepted.
    ///
    /// A short count is a normal outcome; callers loop over the remainder.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::NotOpen`] unless the stream is open, and
    /// [`StreamError::Host`] on a hard host failure.
    pub fn write(&self, data: &[u8]) -> StreamResult<usize> {
        {
            let facets = self.lock();
            if facets.state != StreamState::Opened || facets.closing {
                return Err(StreamError::NotOpen { operation: "write" });
            }
        }
        if data.is_empty() {
            return Ok(0);
        }
        let accepted = self
            .transport
            .write(self.id, data)
            .map_err(|source| StreamError::Host {
                operation: "write",
                source,
            })?
            .min(data.len());
        trace!(stream_id = %self.id, requested = data.len(), accepted, "stream write");
        Ok(accepted)
    }

    /// Terminate the transfer and tear the stream down.
    ///
    /// Closing a destroyed or already closing stream is a no-op. Finished transfers
    /// are torn down without contacting the host. Outside the stream's dispatch
    /// context the host is cancelled immediately and `Destroyed` fires later, from
    /// inside the context; late host events are ignored meanwhile.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Host`] when the host cannot cancel an active
    /// transfer; the stream stays alive in that case.
    pub fn close(&self) -> StreamResult<()> {
        let (state, requested, already_closing) = {
            let mut facets = self.lock();
            if facets.state == StreamState::Destroyed {
                return Ok(());
            }
            let already_closing = facets.closing;
            facets.closing = true;
            (facets.state, facets.requested, already_closing)
        };
        if !already_closing
            && requested
            && !state.is_terminal()
            && let Err(source) = self.transport.close(self.id)
        {
            self.lock().closing = false;
            return Err(StreamError::Host {
                operation: "close",
                source,
            });
        }

        if let Some(context) = self.context.as_ref().filter(|context| !context.is_current()) {
            if already_closing {
                return Ok(());
            }
            if context.schedule_teardown(self.id) {
                debug!(stream_id = %self.id, "stream teardown queued");
                return Ok(());
            }
            debug!(stream_id = %self.id, "dispatch context stopped; tearing down in place");
        }
        self.destroy();
        Ok(())
    }

    /// Stream identifier used to route host notifications.
    #[must_use]
    pub const fn id(&self) -> StreamId {
        self.id
    }

    /// Resource being transferred.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether a host cache file was requested.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        self.cached
    }

    /// Requested chunking size in bytes.
    #[must_use]
    pub const fn internal_buffer_size(&self) -> usize {
        self.internal_buffer_size
    }

    /// Whether range reads are available.
    #[must_use]
    pub fn is_seekable(&self) -> bool {
        self.lock().seekable
    }

    /// Whether the transfer was accepted and activated.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock().opened
    }

    /// Whether the transfer reached a terminal outcome.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    /// Whether `close` was accepted and teardown has not finished yet.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        let facets = self.lock();
        facets.closing && facets.state != StreamState::Destroyed
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.lock().state
    }

    /// Total size, once the host reports it.
    #[must_use]
    pub fn length(&self) -> Option<u64> {
        self.lock().length
    }

    /// Reported content type.
    #[must_use]
    pub fn mime_type(&self) -> Option<String> {
        self.lock().mime_type.clone()
    }

    /// Raw response headers.
    #[must_use]
    pub fn headers(&self) -> Option<String> {
        self.lock().headers.clone()
    }

    /// Host cache file, once confirmed.
    #[must_use]
    pub fn cache_filename(&self) -> Option<PathBuf> {
        self.lock().cache_filename.clone()
    }

    /// Range requests still waiting for bytes, oldest first.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<RangeRequestId> {
        self.lock().pending.keys().copied().collect()
    }

    /// Consistent snapshot of every property.
    #[must_use]
    pub fn properties(&self) -> StreamProperties {
        let facets = self.lock();
        StreamProperties {
            id: self.id,
            url: self.url.clone(),
            state: facets.state,
            seekable: facets.seekable,
            cached: self.cached,
            internal_buffer_size: self.internal_buffer_size,
            cache_filename: facets.cache_filename.clone(),
            length: facets.length,
            mime_type: facets.mime_type.clone(),
            headers: facets.headers.clone(),
            opened: facets.opened,
            completed: facets.completed,
        }
    }

    fn react<'a>(&self, event: &'a Event) -> Reaction<'a> {
        let mut facets = self.lock();
        let state = facets.state;
        let closing = facets.closing && state != StreamState::Destroyed;
        if closing && !matches!(event, Event::Destroyed) {
            debug!(
                stream_id = %self.id,
                kind = %event.kind(),
                "ignoring event for closing stream"
            );
            return Reaction::Ignore;
        }
        match (event, state) {
            (Event::Created, StreamState::Created) => {
                facets.state = StreamState::Opening;
                Reaction::Fire(Cow::Borrowed(event))
            }
            (Event::Opened(payload), StreamState::Opening) => {
                facets.apply_opened(payload);
                debug!(stream_id = %self.id, length = ?payload.length, "stream opened");
                Reaction::Fire(Cow::Borrowed(event))
            }
            (Event::FailedOpen(payload), StreamState::Opening) => {
                facets.apply_failed_open();
                debug!(stream_id = %self.id, reason = ?payload.reason, "stream failed to open");
                Reaction::Fire(Cow::Borrowed(event))
            }
            (Event::Completed(_), StreamState::Opening) => {
                facets.apply_failed_open();
                debug!(stream_id = %self.id, "stream completed before opening");
                Reaction::Fire(Cow::Owned(Event::FailedOpen(StreamFailedOpen {
                    reason: Some(COMPLETED_BEFORE_OPEN.to_string()),
                })))
            }
            (Event::DataArrived(payload), StreamState::Opened) => {
                facets.retire(payload);
                Reaction::Fire(Cow::Borrowed(event))
            }
            (Event::Completed(payload), StreamState::Opened) => {
                let unanswered = facets.apply_completed();
                debug!(
                    stream_id = %self.id,
                    success = payload.success,
                    unanswered,
                    "stream completed"
                );
                Reaction::Fire(Cow::Borrowed(event))
            }
            (Event::Destroyed, state) if state != StreamState::Destroyed => Reaction::Destroy,
            (event, state) => {
                debug!(
                    stream_id = %self.id,
                    kind = %event.kind(),
                    state = %state,
                    "ignoring stream event"
                );
                Reaction::Ignore
            }
        }
    }

    fn request(&self, operation: &'static str, ranges: &[Range]) -> StreamResult<RangeRequestId> {
        let id = {
            let mut facets = self.lock();
            let id = facets.next_request;
            facets.next_request = id.next();
            facets.pending.insert(
                id,
                PendingRead {
                    remaining: ranges.to_vec(),
                },
            );
            id
        };
        if let Err(source) = self.transport.request_ranges(self.id, id, ranges) {
            self.lock().pending.remove(&id);
            return Err(StreamError::Host { operation, source });
        }
        debug!(stream_id = %self.id, request = %id, ranges = ranges.len(), "range read requested");
        Ok(id)
    }

    /// Fire `Destroyed` and detach every sink; later calls do nothing.
    ///
    /// Dispatch contexts call this to finish a queued teardown. It runs the sinks on
    /// the calling thread.
    pub fn destroy(&self) {
        {
            let mut facets = self.lock();
            if facets.state == StreamState::Destroyed {
                return;
            }
            facets.state = StreamState::Destroyed;
            facets.pending.clear();
        }
        self.sinks.fire(self, &Event::Destroyed);
        self.sinks.clear();
        debug!(stream_id = %self.id, "stream destroyed");
    }

    fn lock(&self) -> MutexGuard<'_, Facets> {
        self.facets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        let (state, requested, closing) = {
            let facets = self.lock();
            (facets.state, facets.requested, facets.closing)
        };
        if state == StreamState::Destroyed {
            return;
        }
        if requested
            && !closing
            && !state.is_terminal()
            && let Err(error) = self.transport.close(self.id)
        {
            debug!(stream_id = %self.id, error = %error, "host close failed during drop");
        }
        self.destroy();
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Stream")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("state", &self.state())
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}
