use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use chrono::Utc;
use hoststream_core::{StreamId, StreamState};
use hoststream_telemetry::{Metrics, stream_span};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::command::{Job, Notification, RuntimeCommand};
use crate::context;
use crate::registry::StreamRegistry;

pub(crate) fn spawn(
    mut commands: mpsc::Receiver<RuntimeCommand>,
    mut teardowns: mpsc::UnboundedReceiver<StreamId>,
    registry: StreamRegistry,
    metrics: Metrics,
    context_id: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let worker = Worker { registry, metrics };
        loop {
            tokio::select! {
                biased;
                Some(stream_id) = teardowns.recv() => {
                    let _scope = context::enter(context_id);
                    worker.tear_down(stream_id);
                }
                command = commands.recv() => {
                    let _scope = context::enter(context_id);
                    match command {
                        Some(RuntimeCommand::Notify(notification)) => worker.dispatch(notification),
                        Some(RuntimeCommand::Invoke(job)) => worker.run(job),
                        Some(RuntimeCommand::Shutdown) | None => break,
                    }
                }
            }
        }

        commands.close();
        while let Ok(command) = commands.try_recv() {
            if let RuntimeCommand::Notify(notification) = command {
                worker.discard(&notification);
            }
        }
        teardowns.close();
        let _scope = context::enter(context_id);
        while let Ok(stream_id) = teardowns.try_recv() {
            worker.tear_down(stream_id);
        }
        worker.close_all();
        info!("stream runtime worker stopped");
    })
}

struct Worker {
    registry: StreamRegistry,
    metrics: Metrics,
}

impl Worker {
    fn dispatch(&self, notification: Notification) {
        self.metrics.dec_queue_depth();
        let kind = notification.event.kind();
        let Some(stream) = self.registry.get(notification.stream_id) else {
            self.metrics.inc_stream_event_dropped();
            debug!(
                stream_id = %notification.stream_id,
                kind = %kind,
                "dropping notification for unknown stream"
            );
            return;
        };

        let span = stream_span(notification.stream_id, kind.as_str());
        let _entered = span.enter();
        let queued_ms = (Utc::now() - notification.received_at).num_milliseconds();
        let started = Instant::now();
        match catch_unwind(AssertUnwindSafe(|| stream.handle_event(&notification.event))) {
            Ok(handled) => trace!(handled, queued_ms, "notification dispatched"),
            Err(payload) => self.contain("stream handler", &*payload),
        }
        self.metrics.observe_dispatch_latency(started.elapsed());
        self.metrics.inc_stream_event(kind.as_str());

        if stream.state() == StreamState::Destroyed {
            drop(self.registry.remove(notification.stream_id));
        }
    }

    fn run(&self, job: Job) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            self.contain("invoked job", &*payload);
        }
        self.registry.prune();
    }

    fn tear_down(&self, stream_id: StreamId) {
        let Some(stream) = self.registry.remove(stream_id) else {
            trace!(stream_id = %stream_id, "teardown for unregistered stream");
            return;
        };
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| stream.destroy())) {
            self.contain("stream teardown", &*payload);
        }
    }

    fn contain(&self, origin: &'static str, payload: &(dyn Any + Send)) {
        self.metrics.inc_handler_panic();
        error!(origin, panic = panic_message(payload), "panic contained on runtime worker");
    }

    fn discard(&self, notification: &Notification) {
        self.metrics.dec_queue_depth();
        self.metrics.inc_stream_event_dropped();
        debug!(
            stream_id = %notification.stream_id,
            kind = %notification.event.kind(),
            "discarding notification queued behind shutdown"
        );
    }

    fn close_all(&self) {
        for stream in self.registry.live() {
            let stream_id = stream.id();
            match catch_unwind(AssertUnwindSafe(|| stream.close())) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(
                    stream_id = %stream_id,
                    error = %err,
                    "stream close failed during shutdown"
                ),
                Err(payload) => self.contain("stream teardown", &*payload),
            }
            self.tear_down(stream_id);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
