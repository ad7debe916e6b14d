//! Betledger Audit - outbound audit events
//!
//! Every committed ledger entry, breaker trip/reset and reconciliation
//! discrepancy is published as an `AuditEvent` to the configured sinks.
//! Publication is at-least-once and idempotent by resource id; a sink
//! failure never rolls back the financial write it describes.

pub mod error;
pub mod event;
pub mod sink;
pub mod store;

pub use error::AuditError;
pub use event::{AuditEvent, Severity};
pub use sink::{AuditSink, MemorySink};
pub use store::JsonlAuditStore;
