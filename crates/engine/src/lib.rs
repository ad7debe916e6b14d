//! Betledger Engine - the ledger transaction engine
//!
//! The only writer of wallets and the transaction ledger. Every balance
//! mutation flows through `LedgerEngine::apply`:
//!
//! validate → risk gate → optimistic commit (wallet CAS + journal +
//! ledger append, with rollback) → post-commit publication (risk
//! counters, audit sinks).
//!
//! Collaborators (bet placement, settlement, voucher redemption) never
//! touch a balance field directly.

pub mod engine;
pub mod error;
pub mod request;

pub use engine::LedgerEngine;
pub use error::EngineError;
pub use request::EntryRequest;
