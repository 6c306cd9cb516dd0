//! The worker's identity as a [`DispatchContext`].

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use hoststream_core::{DispatchContext, StreamId};
use tokio::sync::mpsc;

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Context handed to every stream a runtime creates.
///
/// Teardowns travel on their own unbounded channel so `close` never fails on a
/// full notification queue.
pub(crate) struct WorkerContext {
    id: u64,
    teardowns: mpsc::UnboundedSender<StreamId>,
}

impl WorkerContext {
    pub(crate) fn new(teardowns: mpsc::UnboundedSender<StreamId>) -> Self {
        Self {
            id: NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed),
            teardowns,
        }
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }
}

impl DispatchContext for WorkerContext {
    fn is_current(&self) -> bool {
        CURRENT.with(|current| current.get() == Some(self.id))
    }

    fn schedule_teardown(&self, stream: StreamId) -> bool {
        self.teardowns.send(stream).is_ok()
    }
}

/// Marks the current thread as running inside context `id` until dropped.
///
/// Only held across synchronous work: the worker never awaits while a scope is live.
pub(crate) struct ContextScope {
    previous: Option<u64>,
}

pub(crate) fn enter(id: u64) -> ContextScope {
    ContextScope {
        previous: CURRENT.with(|current| current.replace(Some(id))),
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        CURRENT.with(|current| current.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_marks_only_its_own_context() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let first = WorkerContext::new(tx.clone());
        let second = WorkerContext::new(tx);
        assert!(!first.is_current());
        {
            let _scope = enter(first.id());
            assert!(first.is_current());
            assert!(!second.is_current());
            {
                let _inner = enter(second.id());
                assert!(second.is_current());
            }
            assert!(first.is_current());
        }
        assert!(!first.is_current());
    }

    #[test]
    fn teardown_fails_once_worker_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let context = WorkerContext::new(tx);
        let id = StreamId::new();
        assert!(context.schedule_teardown(id));
        drop(rx);
        assert!(!context.schedule_teardown(id));
    }
}
