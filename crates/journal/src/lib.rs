//! Betledger Journal - JSONL ledger persistence
//!
//! Committed ledger entries are appended to date-rotated JSONL files, one
//! JSON document per line. The journal is the durable record the engine
//! replays on startup to rebuild wallet balances, the ledger tail, and
//! the risk counters.

pub mod error;
pub mod reader;
pub mod store;

pub use error::JournalError;
pub use reader::JournalReader;
pub use store::JournalStore;
