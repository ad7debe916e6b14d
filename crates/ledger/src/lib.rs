//! Betledger Ledger - Wallet store and append-only transaction ledger
//!
//! This is the HEART of betledger. All balance state lives here and every
//! change to it is recorded as an immutable `LedgerEntry`.
//!
//! # Key Types
//! - `WalletKey`: Tenant-scoped wallet identifier (TENANT:ACCOUNT)
//! - `Wallet`: One balance record per (account, tenant), version-stamped
//! - `WalletStore`: Concurrent wallet map with compare-and-swap commits
//! - `LedgerEntry`: Immutable record of one balance-affecting event
//! - `TransactionLedger`: Append-only, hash-chained entry log

pub mod chain;
pub mod entry;
pub mod error;
pub mod store;
pub mod wallet;

pub use chain::{entry_hash, verify_chain, ChainError, GENESIS_HASH};
pub use entry::{EntryStatus, EntryType, LedgerEntry};
pub use error::LedgerError;
pub use store::TransactionLedger;
pub use wallet::{Wallet, WalletKey, WalletStore};
