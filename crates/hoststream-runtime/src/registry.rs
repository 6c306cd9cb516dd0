use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hoststream_core::{Stream, StreamId, StreamState};
use hoststream_telemetry::Metrics;

/// Streams reachable by host notifications, keyed by id.
///
/// The registry keeps each stream alive until its teardown has run on the worker,
/// so the final `Destroyed` never fires from whichever thread dropped the last
/// application handle.
#[derive(Clone)]
pub(crate) struct StreamRegistry {
    streams: Arc<Mutex<HashMap<StreamId, Arc<Stream>>>>,
    metrics: Metrics,
}

impl StreamRegistry {
    pub(crate) fn new(metrics: Metrics) -> Self {
        Self {
            streams: Arc::new(Mutex::new(HashMap::new())),
            metrics,
        }
    }

    pub(crate) fn insert(&self, stream: &Arc<Stream>) {
        let mut streams = self.lock();
        streams.insert(stream.id(), Arc::clone(stream));
        self.publish(streams.len());
    }

    /// Forget `id`, handing back the registry's handle so the caller decides
    /// where the last reference is released.
    pub(crate) fn remove(&self, id: StreamId) -> Option<Arc<Stream>> {
        let mut streams = self.lock();
        let removed = streams.remove(&id);
        if removed.is_some() {
            self.publish(streams.len());
        }
        removed
    }

    /// Registered stream under `id` that has not been destroyed yet.
    pub(crate) fn get(&self, id: StreamId) -> Option<Arc<Stream>> {
        let stream = self.lock().get(&id).cloned()?;
        if stream.state() == StreamState::Destroyed {
            drop(self.remove(id));
            return None;
        }
        Some(stream)
    }

    /// Forget streams that were destroyed in place, e.g. closed by a job on the worker.
    pub(crate) fn prune(&self) {
        let destroyed: Vec<Arc<Stream>> = {
            let mut streams = self.lock();
            let before = streams.len();
            let ids: Vec<StreamId> = streams
                .iter()
                .filter(|(_, stream)| stream.state() == StreamState::Destroyed)
                .map(|(id, _)| *id)
                .collect();
            let removed: Vec<Arc<Stream>> =
                ids.iter().filter_map(|id| streams.remove(id)).collect();
            if streams.len() != before {
                self.publish(streams.len());
            }
            removed
        };
        drop(destroyed);
    }

    /// Every registered stream.
    pub(crate) fn live(&self) -> Vec<Arc<Stream>> {
        self.lock().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn publish(&self, count: usize) {
        self.metrics
            .set_active_streams(i64::try_from(count).unwrap_or(i64::MAX));
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StreamId, Arc<Stream>>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
