//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges relevant to serialized stream dispatch.

use std::convert::TryFrom;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared by the runtime and host adapters.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    stream_events_total: IntCounterVec,
    stream_events_dropped_total: IntCounter,
    notifications_rejected_total: IntCounterVec,
    handler_panics_total: IntCounter,
    active_streams: IntGauge,
    queue_depth: IntGauge,
    dispatch_latency_ms: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Streams currently registered with the runtime.
    pub active_streams: i64,
    /// Host notifications waiting for the worker.
    pub queue_depth: i64,
    /// Latest time (ms) spent dispatching one notification.
    pub dispatch_latency_ms: i64,
    /// Notifications dropped because their stream was gone.
    pub stream_events_dropped_total: u64,
    /// Handlers or jobs that panicked on the worker.
    pub handler_panics_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let stream_events_total = IntCounterVec::new(
            Opts::new(
                "stream_events_total",
                "Host notifications dispatched to streams by kind",
            ),
            &["kind"],
        )?;
        let stream_events_dropped_total = IntCounter::with_opts(Opts::new(
            "stream_events_dropped_total",
            "Host notifications dropped because the stream was unknown or destroyed",
        ))?;
        let notifications_rejected_total = IntCounterVec::new(
            Opts::new(
                "host_notifications_rejected_total",
                "Host notifications refused before reaching the queue",
            ),
            &["reason"],
        )?;
        let handler_panics_total = IntCounter::with_opts(Opts::new(
            "handler_panics_total",
            "Sink handlers or invoked jobs that panicked on the dispatch worker",
        ))?;
        let active_streams = IntGauge::with_opts(Opts::new(
            "active_streams",
            "Streams registered with the runtime",
        ))?;
        let queue_depth =
            IntGauge::with_opts(Opts::new("queue_depth", "Queued host notifications"))?;
        let dispatch_latency_ms = IntGauge::with_opts(Opts::new(
            "dispatch_latency_ms",
            "Time spent dispatching the latest host notification (ms)",
        ))?;

        registry.register(Box::new(stream_events_total.clone()))?;
        registry.register(Box::new(stream_events_dropped_total.clone()))?;
        registry.register(Box::new(notifications_rejected_total.clone()))?;
        registry.register(Box::new(handler_panics_total.clone()))?;
        registry.register(Box::new(active_streams.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(dispatch_latency_ms.clone()))?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                stream_events_total,
                stream_events_dropped_total,
                notifications_rejected_total,
                handler_panics_total,
                active_streams,
                queue_depth,
                dispatch_latency_ms,
            }),
        })
    }

    /// Increment the dispatched notification counter for `kind`.
    pub fn inc_stream_event(&self, kind: &str) {
        self.inner
            .stream_events_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Number of notifications of `kind` dispatched so far.
    #[must_use]
    pub fn stream_events(&self, kind: &str) -> u64 {
        self.inner
            .stream_events_total
            .with_label_values(&[kind])
            .get()
    }

    /// Increment the dropped notification counter.
    pub fn inc_stream_event_dropped(&self) {
        self.inner.stream_events_dropped_total.inc();
    }

    /// Increment the rejected notification counter (`queue_full`, `stopped`).
    pub fn inc_notification_rejected(&self, reason: &str) {
        self.inner
            .notifications_rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Increment the panicked handler counter.
    pub fn inc_handler_panic(&self) {
        self.inner.handler_panics_total.inc();
    }

    /// Set the active stream gauge.
    pub fn set_active_streams(&self, count: i64) {
        self.inner.active_streams.set(count);
    }

    /// Raise the queue depth gauge by one.
    pub fn inc_queue_depth(&self) {
        self.inner.queue_depth.inc();
    }

    /// Lower the queue depth gauge by one.
    pub fn dec_queue_depth(&self) {
        self.inner.queue_depth.dec();
    }

    /// Record the time spent dispatching one notification.
    pub fn observe_dispatch_latency(&self, duration: Duration) {
        self.inner
            .dispatch_latency_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_streams: self.inner.active_streams.get(),
            queue_depth: self.inner.queue_depth.get(),
            dispatch_latency_ms: self.inner.dispatch_latency_ms.get(),
            stream_events_dropped_total: self.inner.stream_events_dropped_total.get(),
            handler_panics_total: self.inner.handler_panics_total.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}
