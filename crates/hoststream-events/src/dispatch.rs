//! Constant per-sink-type dispatch tables.
//!
//! # Design
//! - One slot per [`EventKind`], indexed by [`EventKind::index`], so lookup is a
//!   single array access.
//! - Tables are assembled with `const fn` builders and live in `const` items, so a
//!   sink type's table exists once and is shared by every instance.

use std::fmt::{self, Debug, Formatter};

use crate::payloads::{Event, EventKind};

/// Handler invoked for one event kind: receives the sink, the event and the
/// firing source, and reports whether it handled the event.
pub type Handler<S, Src> = fn(&S, &Event, &Src) -> bool;

/// Mapping from event kind to handler for one sink type.
pub struct DispatchTable<S: ?Sized, Src: ?Sized> {
    entries: [Option<Handler<S, Src>>; EventKind::COUNT],
}

impl<S: ?Sized, Src: ?Sized> DispatchTable<S, Src> {
    /// Table with no registered handlers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [const { None }; EventKind::COUNT],
        }
    }

    /// Register `handler` for `kind`, replacing any previous registration.
    #[must_use]
    pub const fn on(mut self, kind: EventKind, handler: Handler<S, Src>) -> Self {
        self.entries[kind.index()] = Some(handler);
        self
    }

    /// Handler registered for `kind`, if any.
    #[must_use]
    pub const fn handler(&self, kind: EventKind) -> Option<Handler<S, Src>> {
        self.entries[kind.index()]
    }

    /// Whether a handler is registered for `kind`.
    #[must_use]
    pub const fn handles(&self, kind: EventKind) -> bool {
        self.entries[kind.index()].is_some()
    }

    /// Registered kinds in slot order.
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        EventKind::ALL
            .into_iter()
            .filter(|kind| self.handles(*kind))
    }

    /// Route `event` to the handler registered for its kind.
    ///
    /// Returns `false` without invoking anything when the kind is not registered.
    pub fn dispatch(&self, sink: &S, event: &Event, source: &Src) -> bool {
        self.handler(event.kind())
            .is_some_and(|handler| handler(sink, event, source))
    }
}

impl<S: ?Sized, Src: ?Sized> Default for DispatchTable<S, Src> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized, Src: ?Sized> Debug for DispatchTable<S, Src> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_set()
            .entries(self.kinds().map(EventKind::as_str))
            .finish()
    }
}
