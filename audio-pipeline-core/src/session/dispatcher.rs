//! Typed event fan-out and the raw audio-data subscriber set.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::events::{CaptureEvent, EventKind};
use crate::models::telemetry::PcmFrame;

pub type EventHandler = Arc<dyn Fn(&CaptureEvent) + Send + Sync>;
pub type AudioDataHandler = Arc<dyn Fn(&PcmFrame) + Send + Sync>;

/// Identifies one subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Per-type publish/subscribe registry.
///
/// Delivery is best-effort and one-to-many. A panicking handler is caught
/// and logged; it never prevents delivery to other handlers or propagates
/// into the emitting call stack.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Mutex<HashMap<EventKind, Vec<(u64, EventHandler)>>>,
    audio_handlers: Mutex<Vec<(u64, AudioDataHandler)>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&CaptureEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(registered) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|(handler_id, _)| *handler_id != id.0);
        registered.len() != before
    }

    pub fn subscribe_audio_data(
        &self,
        handler: impl Fn(&PcmFrame) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.audio_handlers.lock().push((id, Arc::new(handler)));
        SubscriptionId(id)
    }

    pub fn unsubscribe_audio_data(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.audio_handlers.lock();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id.0);
        handlers.len() != before
    }

    /// Emit a typed event to every handler registered for its kind.
    pub fn emit(&self, event: &CaptureEvent) {
        let handlers: Vec<(u64, EventHandler)> = self
            .handlers
            .lock()
            .get(&event.kind())
            .map(|registered| registered.to_vec())
            .unwrap_or_default();

        for (id, handler) in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                log::error!(
                    "event handler {id} panicked handling {:?}; continuing",
                    event.kind()
                );
            }
        }
    }

    /// Deliver one PCM frame synchronously to every audio-data subscriber.
    pub fn dispatch_audio(&self, frame: &PcmFrame) {
        let handlers: Vec<(u64, AudioDataHandler)> = self.audio_handlers.lock().to_vec();
        for (id, handler) in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(frame))).is_err() {
                log::error!("audio-data subscriber {id} panicked; continuing");
            }
        }
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.handlers.lock().clear();
        self.audio_handlers.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::events::{AudioLevelEvent, DeviceChangedEvent};
    use std::sync::atomic::AtomicUsize;

    fn level_event() -> CaptureEvent {
        CaptureEvent::AudioLevelChanged(AudioLevelEvent {
            level: 0.5,
            peak: 0.8,
            rms: 0.4,
        })
    }

    #[test]
    fn delivers_only_to_matching_kind() {
        let dispatcher = EventDispatcher::new();
        let level_count = Arc::new(AtomicUsize::new(0));
        let device_count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&level_count);
        dispatcher.subscribe(EventKind::AudioLevelChanged, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&device_count);
        dispatcher.subscribe(EventKind::DeviceChanged, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.emit(&level_event());
        assert_eq!(level_count.load(Ordering::SeqCst), 1);
        assert_eq!(device_count.load(Ordering::SeqCst), 0);

        dispatcher.emit(&CaptureEvent::DeviceChanged(DeviceChangedEvent {
            device_id: "mic-1".into(),
            label: None,
        }));
        assert_eq!(device_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_is_isolated() {
        let dispatcher = EventDispatcher::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        dispatcher.subscribe(EventKind::AudioLevelChanged, |_| panic!("bad handler"));
        let counter = Arc::clone(&delivered);
        dispatcher.subscribe(EventKind::AudioLevelChanged, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.emit(&level_event());
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let dispatcher = EventDispatcher::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let id = dispatcher.subscribe(EventKind::AudioLevelChanged, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.emit(&level_event());
        assert!(dispatcher.unsubscribe(EventKind::AudioLevelChanged, id));
        dispatcher.emit(&level_event());
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert!(!dispatcher.unsubscribe(EventKind::AudioLevelChanged, id));
    }

    #[test]
    fn audio_data_subscribers_receive_frames() {
        let dispatcher = EventDispatcher::new();
        let bytes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&bytes);
        let id = dispatcher.subscribe_audio_data(move |frame| {
            counter.fetch_add(frame.data.len(), Ordering::SeqCst);
        });

        dispatcher.dispatch_audio(&PcmFrame::new(vec![0u8; 320]));
        assert_eq!(bytes.load(Ordering::SeqCst), 320);

        assert!(dispatcher.unsubscribe_audio_data(id));
        dispatcher.dispatch_audio(&PcmFrame::new(vec![0u8; 320]));
        assert_eq!(bytes.load(Ordering::SeqCst), 320);
    }

    #[test]
    fn clear_drops_all_registrations() {
        let dispatcher = EventDispatcher::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        dispatcher.subscribe(EventKind::AudioLevelChanged, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        dispatcher.clear();
        dispatcher.emit(&level_event());
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }
}
