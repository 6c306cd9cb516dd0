use chrono::{DateTime, Utc};
use hoststream_core::{Event, StreamId};

/// Closure queued to run on the serialized context.
pub(crate) type Job = Box<dyn FnOnce() + Send>;

/// Command definitions consumed by the dispatch worker.
pub(crate) enum RuntimeCommand {
    /// A host notification for one stream.
    Notify(Notification),
    /// A closure to run on the serialized context.
    Invoke(Job),
    /// Close every registered stream and stop the worker.
    Shutdown,
}

/// Host notification waiting in the queue.
#[derive(Debug)]
pub(crate) struct Notification {
    pub(crate) stream_id: StreamId,
    pub(crate) event: Event,
    pub(crate) received_at: DateTime<Utc>,
}

impl Notification {
    pub(crate) fn new(stream_id: StreamId, event: Event) -> Self {
        Self {
            stream_id,
            event,
            received_at: Utc::now(),
        }
    }
}
