//! Ingestion of render-thread quantum telemetry.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::models::telemetry::RenderQuantumTelemetry;
use crate::processing::levels;

/// Notified synchronously for every ingested quantum, in arrival order.
pub type TelemetryListener = Box<dyn Fn(&RenderQuantumTelemetry) + Send + Sync>;

/// Identifies one registered telemetry listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryListenerId(u64);

/// Running render-thread counters for one processing graph.
///
/// Counters are monotonically non-decreasing until a new graph resets them.
#[derive(Debug, Default, Clone)]
pub struct RenderCounters {
    pub underrun_count: u64,
    pub overrun_count: u64,
    pub dropped_frame_count: u64,
    pub consecutive_underruns: u32,

    telemetry_frame_total: u64,
    telemetry_dropped_total: u64,
    seen_telemetry: bool,
}

impl RenderCounters {
    /// Fold one quantum report into the counters.
    ///
    /// Underrun/overrun are derived from the frame counts when the flags are
    /// absent; a totals block, when present, is authoritative for the
    /// running underrun/overrun counts.
    pub fn fold(&mut self, telemetry: &RenderQuantumTelemetry) {
        self.seen_telemetry = true;

        let short = telemetry.expected_frame_count > 0
            && telemetry.frame_count < telemetry.expected_frame_count;
        let long = telemetry.expected_frame_count > 0
            && telemetry.frame_count > telemetry.expected_frame_count;
        let underrun = telemetry.underrun || short;
        let overrun = telemetry.overrun || long;

        if underrun {
            self.underrun_count += 1;
            self.consecutive_underruns += 1;
        } else {
            self.consecutive_underruns = 0;
        }
        if overrun {
            self.overrun_count += 1;
        }
        self.dropped_frame_count += telemetry.dropped_frames;

        if let Some(totals) = &telemetry.totals {
            if let Some(count) = totals.underrun_count {
                self.underrun_count = count;
            }
            if let Some(count) = totals.overrun_count {
                self.overrun_count = count;
            }
        }

        let quantum_frames = if telemetry.expected_frame_count > 0 {
            telemetry.expected_frame_count
        } else {
            telemetry.frame_count
        };
        self.telemetry_frame_total += quantum_frames;
        self.telemetry_dropped_total += telemetry.dropped_frames;
    }

    /// Buffer health computed from telemetry-reported drops. Authoritative
    /// over the generic frame counter once any telemetry has arrived.
    pub fn buffer_health(&self) -> Option<f32> {
        self.seen_telemetry.then(|| {
            levels::buffer_health(self.telemetry_frame_total, self.telemetry_dropped_total)
        })
    }
}

/// Listener registry for render telemetry, with isolated dispatch.
#[derive(Default)]
pub struct RenderTelemetryBridge {
    listeners: Mutex<Vec<(u64, TelemetryListener)>>,
    next_id: AtomicU64,
}

impl RenderTelemetryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: TelemetryListener) -> TelemetryListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        TelemetryListenerId(id)
    }

    pub fn remove_listener(&self, id: TelemetryListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id.0);
        listeners.len() != before
    }

    /// Drop every registered listener. Previously issued ids become stale.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    /// Notify every listener synchronously. A panicking listener is logged
    /// and does not prevent delivery to the others.
    pub fn notify(&self, telemetry: &RenderQuantumTelemetry) {
        let listeners = self.listeners.lock();
        for (id, listener) in listeners.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(telemetry))).is_err() {
                log::error!("telemetry listener {id} panicked; continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn quantum(frame_count: u64, expected: u64, dropped: u64) -> RenderQuantumTelemetry {
        RenderQuantumTelemetry {
            frame_count,
            expected_frame_count: expected,
            underrun: expected > 0 && frame_count < expected,
            dropped_frames: dropped,
            ..Default::default()
        }
    }

    #[test]
    fn underrun_then_clean_quantum() {
        let mut counters = RenderCounters::default();

        counters.fold(&quantum(96, 128, 32));
        assert_eq!(counters.underrun_count, 1);
        assert_eq!(counters.consecutive_underruns, 1);
        assert_eq!(counters.buffer_health(), Some(0.75));

        counters.fold(&quantum(128, 128, 0));
        assert_eq!(counters.underrun_count, 1);
        assert_eq!(counters.consecutive_underruns, 0);
        // 32 dropped out of 256 expected.
        assert_eq!(counters.buffer_health(), Some(0.875));
    }

    #[test]
    fn underrun_derived_from_frame_shortfall_without_flag() {
        let mut counters = RenderCounters::default();
        counters.fold(&RenderQuantumTelemetry {
            frame_count: 64,
            expected_frame_count: 128,
            ..Default::default()
        });
        assert_eq!(counters.underrun_count, 1);
    }

    #[test]
    fn totals_block_overrides_running_counts() {
        let mut counters = RenderCounters::default();
        counters.fold(&RenderQuantumTelemetry {
            frame_count: 128,
            expected_frame_count: 128,
            totals: Some(crate::models::telemetry::RenderTotals {
                underrun_count: Some(17),
                overrun_count: Some(3),
            }),
            ..Default::default()
        });
        assert_eq!(counters.underrun_count, 17);
        assert_eq!(counters.overrun_count, 3);
    }

    #[test]
    fn no_telemetry_means_no_authoritative_health() {
        assert_eq!(RenderCounters::default().buffer_health(), None);
    }

    #[test]
    fn listener_panic_is_isolated() {
        let bridge = RenderTelemetryBridge::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        bridge.add_listener(Box::new(|_| panic!("bad listener")));
        let counter = Arc::clone(&delivered);
        bridge.add_listener(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        bridge.notify(&RenderQuantumTelemetry::default());
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_listener_stops_delivery() {
        let bridge = RenderTelemetryBridge::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let id = bridge.add_listener(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        bridge.notify(&RenderQuantumTelemetry::default());
        assert!(bridge.remove_listener(id));
        bridge.notify(&RenderQuantumTelemetry::default());
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert!(!bridge.remove_listener(id));
    }

    #[test]
    fn clear_drops_all_listeners() {
        let bridge = RenderTelemetryBridge::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let id = bridge.add_listener(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        bridge.clear();
        bridge.notify(&RenderQuantumTelemetry::default());
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
        assert!(!bridge.remove_listener(id));
    }
}
