//! Span helpers for the plugin process and individual streams.
//!
//! # Design
//! - Provides a process-level span guard so top-level spans carry mode/build info.
//! - Stream spans carry the identifier host adapters route on.

use std::fmt::Display;

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the plugin-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    #[must_use]
    /// Enter the plugin-level tracing span for the lifetime of the guard.
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("plugin", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Record the current plugin mode on the active span.
pub fn record_plugin_mode(mode: &str) {
    Span::current().record("mode", tracing::field::display(mode));
}

/// Span covering the handling of one stream notification.
#[must_use]
pub fn stream_span(stream_id: impl Display, kind: &str) -> Span {
    tracing::debug_span!("stream", stream_id = %stream_id, kind = %kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_context_guard_sets_plugin_mode_field() {
        let guard = GlobalContextGuard::new("test");
        record_plugin_mode("running");
        drop(guard);
    }

    #[test]
    fn stream_span_can_be_entered() {
        let span = stream_span("abc", "stream_opened");
        let _entered = span.enter();
    }
}
