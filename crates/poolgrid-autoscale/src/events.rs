//! Audit events for pool size changes.
//!
//! Every size mutation that reaches the reconciler produces exactly one
//! [`AuditEvent`]: `ScaledUpGroup`/`ScaledDownGroup` on success,
//! `ScaleUpFailed`/`ScaleDownFailed` on failure. Sinks are best-effort;
//! a sink that cannot record an event logs and moves on.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use poolgrid_state::{AuditEvent, EventReason, Severity, StateStore};

/// Destination for audit events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Build an event for a size change of `delta` on `pool`.
pub fn size_change_event(
    cluster: &str,
    pool: &str,
    delta: i32,
    success: bool,
    message: String,
) -> AuditEvent {
    let reason = EventReason::for_delta(delta, success);
    AuditEvent {
        reason,
        severity: reason.severity(),
        cluster: cluster.to_string(),
        pool: pool.to_string(),
        delta,
        message,
        timestamp: epoch_secs(),
    }
}

/// Writes events to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: AuditEvent) {
        match event.severity {
            Severity::Normal => info!(
                reason = %event.reason,
                cluster = %event.cluster,
                pool = %event.pool,
                delta = event.delta,
                "{}",
                event.message
            ),
            Severity::Warning => warn!(
                reason = %event.reason,
                cluster = %event.cluster,
                pool = %event.pool,
                delta = event.delta,
                "{}",
                event.message
            ),
        }
    }
}

impl EventSink for StateStore {
    fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.append_event(&event) {
            warn!(
                reason = %event.reason,
                pool = %event.pool,
                error = %e,
                "failed to persist audit event"
            );
        }
    }
}

/// Keeps events in memory, for in-process consumers and tests.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reasons(&self) -> Vec<EventReason> {
        self.events().iter().map(|e| e.reason).collect()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Delivers each event to every inner sink, in order.
#[derive(Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutEventSink {
    fn emit(&self, event: AuditEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_change_event_reason_and_severity() {
        let up = size_change_event("ns/c", "workers", 2, true, "ok".to_string());
        assert_eq!(up.reason, EventReason::ScaledUpGroup);
        assert_eq!(up.severity, Severity::Normal);
        assert!(up.timestamp > 0);

        let down = size_change_event("ns/c", "workers", -1, false, "no".to_string());
        assert_eq!(down.reason, EventReason::ScaleDownFailed);
        assert_eq!(down.severity, Severity::Warning);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(MemoryEventSink::new());
        let b = Arc::new(MemoryEventSink::new());
        let fanout = FanoutEventSink::new()
            .with(a.clone())
            .with(b.clone())
            .with(Arc::new(TracingEventSink));

        fanout.emit(size_change_event("ns/c", "workers", 1, true, "ok".to_string()));

        assert_eq!(a.reasons(), vec![EventReason::ScaledUpGroup]);
        assert_eq!(b.reasons(), vec![EventReason::ScaledUpGroup]);
    }

    #[test]
    fn state_store_sink_persists() {
        let store = StateStore::open_in_memory().unwrap();
        store.emit(size_change_event("ns/c", "workers", -1, true, "ok".to_string()));

        let events = store.list_events(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, EventReason::ScaledDownGroup);
    }
}
