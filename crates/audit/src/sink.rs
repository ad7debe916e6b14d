//! Audit sink trait and the in-process sink

use crate::error::AuditError;
use crate::event::AuditEvent;
use parking_lot::Mutex;

/// Destination for audit events.
///
/// Sinks must tolerate duplicate delivery (publication is at-least-once,
/// idempotent by resource id).
pub trait AuditSink: Send + Sync {
    /// Sink name, for logging failed publications
    fn name(&self) -> &str;

    /// Deliver one event
    fn publish(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// In-process sink that buffers events in memory.
///
/// The test double of choice, and useful as a tap for operator UIs.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl AuditSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn publish(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use betledger_ledger::WalletKey;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_memory_sink_buffers_events() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        let wallet = WalletKey::new("P1", "ACME");
        let event = AuditEvent::discrepancy(&wallet, dec!(90), dec!(100), Utc::now());
        sink.publish(&event).unwrap();
        sink.publish(&event).unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.events()[0], event);
    }
}
