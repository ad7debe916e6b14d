//! Ledger errors

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in wallet-store and ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid wallet reference format: {0}")]
    InvalidWalletRef(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Stale wallet version for {wallet}: expected {expected}, found {found}")]
    VersionConflict {
        wallet: String,
        expected: u64,
        found: u64,
    },

    #[error("Currency mismatch for {wallet}: wallet holds {wallet_currency}, entry carries {entry_currency}")]
    CurrencyMismatch {
        wallet: String,
        wallet_currency: String,
        entry_currency: String,
    },

    #[error("Insufficient available funds in {wallet}: available {available}, requested {requested}")]
    InsufficientAvailable {
        wallet: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Entry {id} breaks the balance invariant: {balance_before} + {amount} != {balance_after}")]
    BalanceInvariant {
        id: String,
        balance_before: Decimal,
        amount: Decimal,
        balance_after: Decimal,
    },

    #[error("Entry for {wallet} does not chain: expected balance_before {expected}, got {actual}")]
    NonContiguousEntry {
        wallet: String,
        expected: Decimal,
        actual: Decimal,
    },

    #[error("Entry out of sequence: expected {expected}, got {actual}")]
    OutOfSequence { expected: u64, actual: u64 },

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Entry {id} is {status}, only completed entries can be reversed")]
    NotReversible { id: String, status: String },

    #[error("Balance would go negative for {wallet}")]
    NegativeBalance { wallet: String },

    #[error(transparent)]
    Chain(#[from] crate::chain::ChainError),
}
