//! Engine errors - the caller-facing failure taxonomy

use betledger_ledger::LedgerError;
use betledger_risk::BreakerStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the ledger transaction engine.
///
/// Validation failures are typed and leave financial state untouched;
/// `ConcurrentModification` has already been retried internally;
/// `PersistenceFailure` is fatal and the caller must not assume success.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Amount {amount} is invalid for entry type {entry_type}")]
    InvalidAmount { entry_type: String, amount: Decimal },

    #[error("Insufficient balance in {wallet}: available {available}, requested {requested}")]
    InsufficientBalance {
        wallet: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Risk limit exceeded for tenant {tenant}: breaker is {status}")]
    RiskLimitExceeded {
        tenant: String,
        status: BreakerStatus,
    },

    #[error("Wallet {wallet} still contended after {attempts} attempts")]
    ConcurrentModification { wallet: String, attempts: u32 },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
