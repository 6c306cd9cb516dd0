//! Sinks and the multicasting event source.
//!
//! # Design
//! - Sources hold `Weak` references: a sink's lifetime belongs to whoever created it.
//! - `fire` walks a snapshot of the attachment list and never holds the lock while a
//!   handler runs, so handlers may attach, detach, or fire again.
//! - Every attachment carries a liveness flag checked right before delivery, which is
//!   how a detach issued mid-pass takes effect for the rest of that pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::trace;

use crate::payloads::Event;

/// Listener that can receive events fired by a source of type `Src`.
pub trait EventSink<Src: ?Sized>: Send + Sync {
    /// Route `event` to this sink's handler; returns whether it was handled.
    fn dispatch(&self, event: &Event, source: &Src) -> bool;
}

struct Attachment<Src: ?Sized> {
    sink: Weak<dyn EventSink<Src>>,
    address: usize,
    live: AtomicBool,
}

impl<Src: ?Sized> Attachment<Src> {
    fn points_to(&self, address: usize) -> bool {
        self.address == address && self.sink.strong_count() > 0
    }
}

/// Ordered set of attached sinks that events are multicast to.
pub struct EventSource<Src: ?Sized> {
    attachments: Mutex<Vec<Arc<Attachment<Src>>>>,
}

impl<Src: ?Sized + 'static> EventSource<Src> {
    /// Source with no attached sinks.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attachments: Mutex::new(Vec::new()),
        }
    }

    /// Attach `sink` after any already attached sinks.
    ///
    /// Attaching the same sink again is a no-op; returns whether it was added.
    pub fn attach<S>(&self, sink: &Arc<S>) -> bool
    where
        S: EventSink<Src> + 'static,
    {
        let address = sink_address(sink);
        let mut attachments = self.lock();
        attachments.retain(|entry| entry.sink.strong_count() > 0);
        if attachments.iter().any(|entry| entry.points_to(address)) {
            return false;
        }
        let weak: Weak<S> = Arc::downgrade(sink);
        let weak: Weak<dyn EventSink<Src>> = weak;
        attachments.push(Arc::new(Attachment {
            sink: weak,
            address,
            live: AtomicBool::new(true),
        }));
        true
    }

    /// Detach `sink`; returns whether it was attached.
    ///
    /// Safe to call from inside a handler: the sink receives nothing further from the
    /// pass in progress.
    pub fn detach<S>(&self, sink: &Arc<S>) -> bool
    where
        S: EventSink<Src> + 'static,
    {
        let address = sink_address(sink);
        let mut attachments = self.lock();
        let before = attachments.len();
        attachments.retain(|entry| {
            if entry.points_to(address) {
                entry.live.store(false, Ordering::Release);
                false
            } else {
                true
            }
        });
        attachments.len() != before
    }

    /// Whether `sink` is currently attached.
    pub fn is_attached<S>(&self, sink: &Arc<S>) -> bool
    where
        S: EventSink<Src> + 'static,
    {
        let address = sink_address(sink);
        self.lock().iter().any(|entry| entry.points_to(address))
    }

    /// Detach every sink.
    pub fn clear(&self) {
        let drained: Vec<_> = self.lock().drain(..).collect();
        for entry in drained {
            entry.live.store(false, Ordering::Release);
        }
    }

    /// Number of attached sinks that are still alive.
    pub fn len(&self) -> usize {
        self.lock()
            .iter()
            .filter(|entry| entry.sink.strong_count() > 0)
            .count()
    }

    /// Whether no live sink is attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every attached sink in attachment order.
    ///
    /// Delivery continues past sinks that handle the event; the return value reports
    /// whether at least one sink handled it.
    pub fn fire(&self, source: &Src, event: &Event) -> bool {
        let snapshot: Vec<_> = self.lock().clone();
        let mut handled = false;
        let mut stale = false;
        for entry in snapshot {
            if !entry.live.load(Ordering::Acquire) {
                continue;
            }
            let Some(sink) = entry.sink.upgrade() else {
                stale = true;
                continue;
            };
            handled |= sink.dispatch(event, source);
        }
        if stale {
            self.lock().retain(|entry| entry.sink.strong_count() > 0);
        }
        trace!(kind = %event.kind(), handled, "event fired");
        handled
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Attachment<Src>>>> {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<Src: ?Sized + 'static> Default for EventSource<Src> {
    fn default() -> Self {
        Self::new()
    }
}

fn sink_address<S>(sink: &Arc<S>) -> usize {
    Arc::as_ptr(sink).cast::<()>().addr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::{EventKind, StreamCompleted};

    struct Owner;

    struct Recorder {
        name: &'static str,
        handled: bool,
        seen: Mutex<Vec<EventKind>>,
    }

    impl Recorder {
        fn named(name: &'static str, handled: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                handled,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<EventKind> {
            self.seen.lock().expect("seen lock").clone()
        }
    }

    impl EventSink<Log> for Recorder {
        fn dispatch(&self, event: &Event, source: &Log) -> bool {
            self.seen.lock().expect("seen lock").push(event.kind());
            source.push(self.name);
            self.handled
        }
    }

    #[derive(Default)]
    struct Log(Mutex<Vec<&'static str>>);

    impl Log {
        fn push(&self, name: &'static str) {
            self.0.lock().expect("log lock").push(name);
        }

        fn entries(&self) -> Vec<&'static str> {
            self.0.lock().expect("log lock").clone()
        }
    }

    impl EventSink<Owner> for Recorder {
        fn dispatch(&self, event: &Event, _source: &Owner) -> bool {
            self.seen.lock().expect("seen lock").push(event.kind());
            self.handled
        }
    }

    #[test]
    fn fire_multicasts_in_attachment_order_past_handled_sinks() {
        let source = EventSource::<Log>::new();
        let first = Recorder::named("first", true);
        let second = Recorder::named("second", false);
        assert!(source.attach(&first));
        assert!(source.attach(&second));

        let log = Log::default();
        assert!(source.fire(&log, &Event::Created));
        assert_eq!(log.entries(), vec!["first", "second"]);
        assert_eq!(second.seen(), vec![EventKind::StreamCreated]);
    }

    #[test]
    fn fire_reports_unhandled_when_no_sink_handles() {
        let source = EventSource::<Owner>::new();
        let sink = Recorder::named("only", false);
        source.attach(&sink);
        assert!(!source.fire(&Owner, &Event::Created));
        assert_eq!(sink.seen().len(), 1);
    }

    #[test]
    fn attach_is_idempotent_and_detach_tolerates_absent_sinks() {
        let source = EventSource::<Owner>::new();
        let sink = Recorder::named("dup", true);
        assert!(source.attach(&sink));
        assert!(!source.attach(&sink));
        assert_eq!(source.len(), 1);

        source.fire(&Owner, &Event::Created);
        assert_eq!(sink.seen().len(), 1);

        assert!(source.detach(&sink));
        assert!(!source.detach(&sink));
        assert!(source.is_empty());
        assert!(!source.fire(&Owner, &Event::Created));
        assert_eq!(sink.seen().len(), 1);
    }

    #[test]
    fn dropped_sinks_are_skipped_and_pruned() {
        let source = EventSource::<Owner>::new();
        let kept = Recorder::named("kept", true);
        let dropped = Recorder::named("dropped", true);
        source.attach(&dropped);
        source.attach(&kept);
        drop(dropped);

        assert_eq!(source.len(), 1);
        assert!(source.fire(&Owner, &Event::Created));
        assert_eq!(kept.seen().len(), 1);
    }

    struct Detacher {
        source: Arc<EventSource<Owner>>,
        victim: Arc<Recorder>,
        calls: Mutex<usize>,
    }

    impl EventSink<Owner> for Detacher {
        fn dispatch(&self, _event: &Event, _source: &Owner) -> bool {
            *self.calls.lock().expect("calls lock") += 1;
            self.source.detach(&self.victim);
            true
        }
    }

    #[test]
    fn sink_detached_mid_pass_misses_that_event() {
        let source = Arc::new(EventSource::<Owner>::new());
        let before = Recorder::named("before", true);
        let victim = Recorder::named("victim", true);
        let detacher = Arc::new(Detacher {
            source: Arc::clone(&source),
            victim: Arc::clone(&victim),
            calls: Mutex::new(0),
        });
        source.attach(&before);
        source.attach(&detacher);
        source.attach(&victim);

        source.fire(&Owner, &Event::Created);
        assert_eq!(before.seen(), vec![EventKind::StreamCreated]);
        assert!(victim.seen().is_empty());
        assert!(!source.is_attached(&victim));

        source.fire(&Owner, &Event::Destroyed);
        assert_eq!(before.seen().len(), 2);
        assert_eq!(*detacher.calls.lock().expect("calls lock"), 2);
        assert!(victim.seen().is_empty());
    }

    struct Attacher {
        source: Arc<EventSource<Owner>>,
        late: Arc<Recorder>,
    }

    impl EventSink<Owner> for Attacher {
        fn dispatch(&self, _event: &Event, _source: &Owner) -> bool {
            self.source.attach(&self.late);
            false
        }
    }

    #[test]
    fn sink_attached_mid_pass_waits_for_next_pass() {
        let source = Arc::new(EventSource::<Owner>::new());
        let late = Recorder::named("late", true);
        let attacher = Arc::new(Attacher {
            source: Arc::clone(&source),
            late: Arc::clone(&late),
        });
        source.attach(&attacher);

        assert!(!source.fire(&Owner, &Event::Created));
        assert!(late.seen().is_empty());

        assert!(source.fire(&Owner, &Event::Destroyed));
        assert_eq!(late.seen(), vec![EventKind::StreamDestroyed]);
    }

    struct Refirer {
        source: Arc<EventSource<Owner>>,
        seen: Mutex<Vec<EventKind>>,
    }

    impl EventSink<Owner> for Refirer {
        fn dispatch(&self, event: &Event, source: &Owner) -> bool {
            self.seen.lock().expect("seen lock").push(event.kind());
            if matches!(event, Event::Created) {
                self.source
                    .fire(source, &Event::Completed(StreamCompleted { success: true }));
            }
            true
        }
    }

    #[test]
    fn handlers_may_fire_reentrantly() {
        let source = Arc::new(EventSource::<Owner>::new());
        let refirer = Arc::new(Refirer {
            source: Arc::clone(&source),
            seen: Mutex::new(Vec::new()),
        });
        source.attach(&refirer);

        assert!(source.fire(&Owner, &Event::Created));
        assert_eq!(
            *refirer.seen.lock().expect("seen lock"),
            vec![EventKind::StreamCreated, EventKind::StreamCompleted]
        );
    }

    #[test]
    fn clear_detaches_everything() {
        let source = EventSource::<Owner>::new();
        let sink = Recorder::named("cleared", true);
        source.attach(&sink);
        source.clear();
        assert!(!source.fire(&Owner, &Event::Created));
        assert!(sink.seen().is_empty());
    }
}
