//! Betledger Reconcile - independent balance verification
//!
//! Recomputes a wallet's balance by replaying its ledger history and
//! compares it against the stored record. Discrepancies beyond the
//! currency's smallest unit are logged and published for manual review —
//! never auto-corrected, because silently fixing a wallet could mask a
//! double-spend or a missed compensating entry.

pub mod error;
pub mod service;

pub use error::ReconcileError;
pub use service::{ReconciliationReport, ReconciliationService};
