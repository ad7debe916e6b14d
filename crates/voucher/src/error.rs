//! Voucher errors

use betledger_engine::EngineError;
use thiserror::Error;

/// Errors surfaced by voucher operations
#[derive(Error, Debug)]
pub enum VoucherError {
    #[error("Voucher not found: {0}")]
    NotFound(String),

    #[error("Voucher {code} belongs to tenant {voucher_tenant}, not {account_tenant}")]
    TenantMismatch {
        code: String,
        voucher_tenant: String,
        account_tenant: String,
    },

    #[error("Voucher {0} has already been redeemed")]
    AlreadyRedeemed(String),

    #[error("Voucher {0} was cancelled")]
    Cancelled(String),

    #[error("Voucher {0} has expired")]
    Expired(String),

    #[error("Voucher code already exists: {0}")]
    DuplicateCode(String),

    #[error("Voucher {code} is {status}, only unused vouchers can be cancelled")]
    NotCancellable { code: String, status: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}
