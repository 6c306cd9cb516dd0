//! Default stream handler with overridable no-op hooks.
//!
//! Implement [`StreamHandler`] and override only the hooks you need; every
//! implementor is an [`EventSink`] routed through one constant table.

use std::marker::PhantomData;

use crate::dispatch::DispatchTable;
use crate::payloads::{
    Event, EventKind, StreamCompleted, StreamDataArrived, StreamFailedOpen, StreamOpened,
};
use crate::source::EventSink;

/// Hooks for each stream event kind. Unoverridden hooks do nothing and report the
/// event as unhandled.
pub trait StreamHandler<Src: ?Sized>: Send + Sync {
    /// The host accepted the transfer request.
    fn on_stream_created(&self, stream: &Src) -> bool {
        let _ = stream;
        false
    }

    /// The stream is being torn down; its final state is still readable.
    fn on_stream_destroyed(&self, stream: &Src) -> bool {
        let _ = stream;
        false
    }

    /// The host could not open the transfer.
    fn on_stream_failed_open(&self, event: &StreamFailedOpen, stream: &Src) -> bool {
        let _ = (event, stream);
        false
    }

    /// The transfer was opened successfully.
    fn on_stream_opened(&self, event: &StreamOpened, stream: &Src) -> bool {
        let _ = (event, stream);
        false
    }

    /// Bytes arrived.
    fn on_stream_data_arrived(&self, event: &StreamDataArrived, stream: &Src) -> bool {
        let _ = (event, stream);
        false
    }

    /// The transfer finished.
    fn on_stream_completed(&self, event: &StreamCompleted, stream: &Src) -> bool {
        let _ = (event, stream);
        false
    }
}

struct StreamHandlerTable<Src: ?Sized>(PhantomData<fn(&Src)>);

impl<Src: ?Sized + 'static> StreamHandlerTable<Src> {
    const TABLE: DispatchTable<dyn StreamHandler<Src>, Src> = DispatchTable::new()
        .on(EventKind::StreamCreated, created::<Src>)
        .on(EventKind::StreamDestroyed, destroyed::<Src>)
        .on(EventKind::StreamFailedOpen, failed_open::<Src>)
        .on(EventKind::StreamOpened, opened::<Src>)
        .on(EventKind::StreamDataArrived, data_arrived::<Src>)
        .on(EventKind::StreamCompleted, completed::<Src>);
}

/// Table shared by every [`StreamHandler`] implementation for sources of type `Src`.
#[must_use]
pub fn stream_handler_table<Src: ?Sized + 'static>()
-> &'static DispatchTable<dyn StreamHandler<Src>, Src> {
    &StreamHandlerTable::<Src>::TABLE
}

impl<Src, T> EventSink<Src> for T
where
    Src: ?Sized + 'static,
    T: StreamHandler<Src> + 'static,
{
    fn dispatch(&self, event: &Event, source: &Src) -> bool {
        let handler: &(dyn StreamHandler<Src> + 'static) = self;
        stream_handler_table::<Src>().dispatch(handler, event, source)
    }
}

fn created<Src: ?Sized>(
    handler: &(dyn StreamHandler<Src> + 'static),
    _event: &Event,
    stream: &Src,
) -> bool {
    handler.on_stream_created(stream)
}

fn destroyed<Src: ?Sized>(
    handler: &(dyn StreamHandler<Src> + 'static),
    _event: &Event,
    stream: &Src,
) -> bool {
    handler.on_stream_destroyed(stream)
}

fn failed_open<Src: ?Sized>(
    handler: &(dyn StreamHandler<Src> + 'static),
    event: &Event,
    stream: &Src,
) -> bool {
    match event {
        Event::FailedOpen(payload) => handler.on_stream_failed_open(payload, stream),
        _ => false,
    }
}

fn opened<Src: ?Sized>(
    handler: &(dyn StreamHandler<Src> + 'static),
    event: &Event,
    stream: &Src,
) -> bool {
    match event {
        Event::Opened(payload) => handler.on_stream_opened(payload, stream),
        _ => false,
    }
}

fn data_arrived<Src: ?Sized>(
    handler: &(dyn StreamHandler<Src> + 'static),
    event: &Event,
    stream: &Src,
) -> bool {
    match event {
        Event::DataArrived(payload) => handler.on_stream_data_arrived(payload, stream),
        _ => false,
    }
}

fn completed<Src: ?Sized>(
    handler: &(dyn StreamHandler<Src> + 'static),
    event: &Event,
    stream: &Src,
) -> bool {
    match event {
        Event::Completed(payload) => handler.on_stream_completed(payload, stream),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::EventSource;
    use std::sync::{Arc, Mutex};

    struct Transfer;

    #[derive(Default)]
    struct DataOnly {
        chunks: Mutex<Vec<(u64, usize)>>,
    }

    impl StreamHandler<Transfer> for DataOnly {
        fn on_stream_data_arrived(&self, event: &StreamDataArrived, _stream: &Transfer) -> bool {
            self.chunks
                .lock()
                .expect("chunks lock")
                .push((event.offset, event.data.len()));
            true
        }
    }

    struct Silent;

    impl StreamHandler<Transfer> for Silent {}

    #[test]
    fn table_covers_every_stream_kind() {
        let table = stream_handler_table::<Transfer>();
        assert_eq!(table.kinds().count(), EventKind::COUNT);
    }

    #[test]
    fn unoverridden_hooks_report_unhandled() {
        let silent = Silent;
        let events = [
            Event::Created,
            Event::Opened(StreamOpened::default()),
            Event::FailedOpen(StreamFailedOpen::default()),
            Event::DataArrived(StreamDataArrived::default()),
            Event::Completed(StreamCompleted { success: true }),
            Event::Destroyed,
        ];
        for event in &events {
            assert!(!silent.dispatch(event, &Transfer));
        }
    }

    #[test]
    fn overridden_hook_receives_payload_through_source() {
        let source = EventSource::<Transfer>::new();
        let handler = Arc::new(DataOnly::default());
        source.attach(&handler);

        assert!(!source.fire(&Transfer, &Event::Created));
        let chunk = Event::DataArrived(StreamDataArrived {
            offset: 64,
            data: vec![1, 2, 3],
            request: None,
        });
        assert!(source.fire(&Transfer, &chunk));
        assert_eq!(*handler.chunks.lock().expect("chunks lock"), vec![(64, 3)]);
    }

    #[test]
    fn default_handler_matches_hand_written_table() {
        fn data(sink: &DataOnly, event: &Event, stream: &Transfer) -> bool {
            match event {
                Event::DataArrived(payload) => sink.on_stream_data_arrived(payload, stream),
                _ => false,
            }
        }
        let hand_written: DispatchTable<DataOnly, Transfer> =
            DispatchTable::new().on(EventKind::StreamDataArrived, data);

        let via_trait = DataOnly::default();
        let via_table = DataOnly::default();
        let events = [
            Event::Created,
            Event::DataArrived(StreamDataArrived {
                offset: 0,
                data: vec![9; 4],
                request: None,
            }),
            Event::Destroyed,
        ];
        for event in &events {
            assert_eq!(
                via_trait.dispatch(event, &Transfer),
                hand_written.dispatch(&via_table, event, &Transfer)
            );
        }
        assert_eq!(
            *via_trait.chunks.lock().expect("chunks lock"),
            *via_table.chunks.lock().expect("chunks lock")
        );
    }
}
