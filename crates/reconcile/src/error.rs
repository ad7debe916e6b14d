//! Reconciliation errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),
}
