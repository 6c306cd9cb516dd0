//! Plugin runtime handle and the host-facing notifier.
//!
//! # Design
//! - One bounded queue and one worker task per plugin instance; the worker is the
//!   only place host notifications reach `Stream::handle_event`.
//! - Host threads never block on the queue unless they opt into `notify_blocking`.
//! - Start and shutdown are explicit; every entry point reports `Stopped` afterwards.
//! - Streams are bound to the worker as their dispatch context, so a `close` from an
//!   application thread queues the final `Destroyed` onto the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use hoststream_config::{HoststreamConfig, StreamDefaults};
use hoststream_core::{
    DispatchContext, Event, HostTransport, Stream, StreamConfig, StreamError, StreamFactory,
    StreamId, StreamResult,
};
use hoststream_telemetry::Metrics;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::command::{Notification, RuntimeCommand};
use crate::context::WorkerContext;
use crate::error::{RuntimeError, RuntimeResult};
use crate::registry::StreamRegistry;
use crate::worker;

/// Cloneable handle host adapters use to push notifications from any thread.
#[derive(Clone)]
pub struct HostNotifier {
    commands: mpsc::Sender<RuntimeCommand>,
    stopped: Arc<AtomicBool>,
    metrics: Metrics,
    capacity: usize,
}

impl HostNotifier {
    /// Queue `event` for `stream_id` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::QueueFull`] when the queue is at capacity and
    /// [`RuntimeError::Stopped`] after shutdown.
    pub fn notify(&self, stream_id: StreamId, event: Event) -> RuntimeResult<()> {
        self.ensure_running()?;
        self.metrics.inc_queue_depth();
        match self
            .commands
            .try_send(RuntimeCommand::Notify(Notification::new(stream_id, event)))
        {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.metrics.dec_queue_depth();
                self.metrics.inc_notification_rejected("queue_full");
                Err(RuntimeError::QueueFull {
                    stream_id,
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.dec_queue_depth();
                self.reject_stopped()
            }
        }
    }

    /// Queue `event` for `stream_id`, waiting for room in the queue.
    ///
    /// For host threads outside the async executor; calling this from inside an
    /// async context panics.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Stopped`] after shutdown.
    pub fn notify_blocking(&self, stream_id: StreamId, event: Event) -> RuntimeResult<()> {
        self.ensure_running()?;
        self.metrics.inc_queue_depth();
        if self
            .commands
            .blocking_send(RuntimeCommand::Notify(Notification::new(stream_id, event)))
            .is_err()
        {
            self.metrics.dec_queue_depth();
            return self.reject_stopped();
        }
        Ok(())
    }

    fn ensure_running(&self) -> RuntimeResult<()> {
        if self.stopped.load(Ordering::Acquire) {
            return self.reject_stopped();
        }
        Ok(())
    }

    fn reject_stopped(&self) -> RuntimeResult<()> {
        self.metrics.inc_notification_rejected("stopped");
        Err(RuntimeError::Stopped)
    }
}

/// Serialized dispatch context owned by one plugin instance.
pub struct PluginRuntime {
    notifier: HostNotifier,
    registry: StreamRegistry,
    transport: Arc<dyn HostTransport>,
    context: Arc<WorkerContext>,
    defaults: StreamDefaults,
    metrics: Metrics,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PluginRuntime {
    /// Spawn the dispatch worker on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NoExecutor`] outside a Tokio runtime and
    /// [`RuntimeError::InvalidQueueCapacity`] for a zero capacity.
    pub fn start(
        config: &HoststreamConfig,
        transport: Arc<dyn HostTransport>,
        metrics: Metrics,
    ) -> RuntimeResult<Self> {
        let capacity = config.runtime.queue_capacity;
        if capacity == 0 {
            return Err(RuntimeError::InvalidQueueCapacity { capacity });
        }
        Handle::try_current().map_err(|_| RuntimeError::NoExecutor)?;

        let (commands, rx) = mpsc::channel(capacity);
        let (teardowns, teardown_rx) = mpsc::unbounded_channel();
        let context = Arc::new(WorkerContext::new(teardowns));
        let registry = StreamRegistry::new(metrics.clone());
        let worker = worker::spawn(
            rx,
            teardown_rx,
            registry.clone(),
            metrics.clone(),
            context.id(),
        );
        info!(queue_capacity = capacity, "stream runtime started");

        Ok(Self {
            notifier: HostNotifier {
                commands,
                stopped: Arc::new(AtomicBool::new(false)),
                metrics: metrics.clone(),
                capacity,
            },
            registry,
            transport,
            context,
            defaults: config.streams.clone(),
            metrics,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Handle for host adapters.
    #[must_use]
    pub fn notifier(&self) -> HostNotifier {
        self.notifier.clone()
    }

    /// Metrics registry the runtime reports into.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Number of streams reachable by host notifications.
    ///
    /// A stream stays registered until it is closed or the runtime shuts down, even
    /// after the application drops its handle.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.registry.len()
    }

    /// Whether [`PluginRuntime::shutdown`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.notifier.stopped.load(Ordering::Acquire)
    }

    /// Create a stream for `url` using the configured stream defaults.
    ///
    /// # Errors
    ///
    /// As [`StreamFactory::create_stream`].
    pub fn open_url(&self, url: impl Into<String>) -> StreamResult<Arc<Stream>> {
        self.create_stream(self.defaults.stream_config(url))
    }

    /// Run `job` on the serialized context and return its result.
    ///
    /// Application code uses this to issue stream operations from the same context
    /// that delivers events.
    ///
    /// A panic inside `job` is contained on the worker and reported here.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::JobPanicked`] when `job` panicked and
    /// [`RuntimeError::Stopped`] when the worker is gone before running it.
    pub async fn invoke<F, T>(&self, job: F) -> RuntimeResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_stopped() {
            return Err(RuntimeError::Stopped);
        }
        let (tx, rx) = oneshot::channel();
        let command = RuntimeCommand::Invoke(Box::new(move || {
            let _ = tx.send(job());
        }));
        self.notifier
            .commands
            .send(command)
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        rx.await.map_err(|_| {
            if self.is_stopped() {
                RuntimeError::Stopped
            } else {
                RuntimeError::JobPanicked
            }
        })
    }

    /// Close every registered stream, stop the worker and wait for it.
    ///
    /// Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Worker`] if the worker task panicked.
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        if self.notifier.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self
            .notifier
            .commands
            .send(RuntimeCommand::Shutdown)
            .await
            .is_err()
        {
            debug!("stream runtime worker already gone");
        }
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker
                .await
                .map_err(|source| RuntimeError::Worker { source })?;
        }
        info!("stream runtime shut down");
        Ok(())
    }
}

impl StreamFactory for PluginRuntime {
    fn create_stream(&self, config: StreamConfig) -> StreamResult<Arc<Stream>> {
        if self.is_stopped() {
            return Err(StreamError::Factory {
                source: Box::new(RuntimeError::Stopped),
            });
        }
        let context: Arc<dyn DispatchContext> = self.context.clone();
        let stream = Arc::new(
            Stream::new(StreamId::new(), &config, Arc::clone(&self.transport))
                .with_context(context),
        );
        self.registry.insert(&stream);
        if let Err(err) = stream.open() {
            drop(self.registry.remove(stream.id()));
            return Err(err);
        }
        debug!(stream_id = %stream.id(), url = %config.url, "stream registered");
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoststream_core::{HostResult, StreamState};

    struct NullTransport;

    impl HostTransport for NullTransport {
        fn open(&self, _stream: StreamId, _config: &StreamConfig) -> HostResult<()> {
            Ok(())
        }

        fn close(&self, _stream: StreamId) -> HostResult<()> {
            Ok(())
        }
    }

    fn start(capacity: usize) -> anyhow::Result<PluginRuntime> {
        let mut config = HoststreamConfig::default();
        config.runtime.queue_capacity = capacity;
        Ok(PluginRuntime::start(
            &config,
            Arc::new(NullTransport),
            Metrics::new()?,
        )?)
    }

    #[test]
    fn start_requires_an_executor() {
        let result = PluginRuntime::start(
            &HoststreamConfig::default(),
            Arc::new(NullTransport),
            Metrics::new().expect("metrics"),
        );
        assert!(matches!(result, Err(RuntimeError::NoExecutor)));
    }

    #[tokio::test]
    async fn zero_capacity_is_rejected() {
        assert!(matches!(
            start(0).map_err(|err| err.downcast::<RuntimeError>()),
            Err(Ok(RuntimeError::InvalidQueueCapacity { capacity: 0 }))
        ));
    }

    #[tokio::test]
    async fn invoke_runs_on_worker_and_returns_value() -> anyhow::Result<()> {
        let runtime = start(4)?;
        let value = runtime.invoke(|| 40 + 2).await?;
        assert_eq!(value, 42);
        runtime.shutdown().await?;
        assert!(matches!(
            runtime.invoke(|| ()).await,
            Err(RuntimeError::Stopped)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn panicking_job_leaves_worker_running() -> anyhow::Result<()> {
        let runtime = start(4)?;
        let failed = runtime.invoke(|| -> u8 { panic!("job failed") }).await;
        assert!(matches!(failed, Err(RuntimeError::JobPanicked)));
        assert_eq!(runtime.metrics().snapshot().handler_panics_total, 1);

        assert_eq!(runtime.invoke(|| "still running").await?, "still running");
        runtime.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    async fn streams_are_bound_to_the_worker_context() -> anyhow::Result<()> {
        let runtime = start(4)?;
        let stream = runtime.open_url("http://x/y")?;
        let target = Arc::clone(&stream);
        runtime.invoke(move || target.close()).await??;
        assert_eq!(stream.state(), StreamState::Destroyed);

        let other = runtime.open_url("http://x/z")?;
        other.close()?;
        assert!(other.is_closing());
        runtime.invoke(|| ()).await?;
        assert_eq!(other.state(), StreamState::Destroyed);
        assert_eq!(runtime.active_streams(), 0);
        runtime.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_closes_streams() -> anyhow::Result<()> {
        let runtime = start(4)?;
        let stream = runtime.open_url("http://x/y")?;
        assert_eq!(runtime.active_streams(), 1);

        runtime.shutdown().await?;
        runtime.shutdown().await?;
        assert!(runtime.is_stopped());
        assert_eq!(stream.state(), StreamState::Destroyed);
        assert_eq!(runtime.active_streams(), 0);
        assert!(matches!(
            runtime.open_url("http://x/z"),
            Err(StreamError::Factory { .. })
        ));
        assert!(matches!(
            runtime.notifier().notify(stream.id(), Event::Created),
            Err(RuntimeError::Stopped)
        ));
        Ok(())
    }
}
