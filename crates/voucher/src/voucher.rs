//! Voucher - single-use, pre-funded credit code

use betledger_core::{Amount, Currency};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Voucher lifecycle: `unused` transitions exactly once to a terminal
/// state; only `redeemed` also mutates a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VoucherStatus {
    Unused,
    Redeemed,
    Expired,
    Cancelled,
}

/// Canonical lookup form of a voucher code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// A single-use, pre-funded voucher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    /// Unique code, stored normalized
    pub code: String,

    pub tenant_id: String,

    /// Agent who issued the voucher and earns the commission
    pub agent_id: String,

    pub amount: Amount,

    pub currency: Currency,

    pub status: VoucherStatus,

    pub expires_at: DateTime<Utc>,

    pub redeemed_by: Option<String>,

    pub redeemed_at: Option<DateTime<Utc>>,

    /// Commission percentage (e.g. 10 = 10%)
    pub commission_rate: Decimal,

    /// Commission actually paid out, set on redemption
    pub commission_paid: Option<Decimal>,
}

impl Voucher {
    pub fn new(
        code: &str,
        tenant_id: &str,
        agent_id: &str,
        amount: Amount,
        currency: Currency,
        expires_at: DateTime<Utc>,
        commission_rate: Decimal,
    ) -> Self {
        Self {
            code: normalize_code(code),
            tenant_id: tenant_id.to_uppercase(),
            agent_id: agent_id.to_uppercase(),
            amount,
            currency,
            status: VoucherStatus::Unused,
            expires_at,
            redeemed_by: None,
            redeemed_at: None,
            commission_rate,
            commission_paid: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Agent commission, rounded to the currency's minor unit
    pub fn commission_amount(&self) -> Decimal {
        self.currency
            .round(self.amount.value() * self.commission_rate / Decimal::ONE_HUNDRED)
    }
}
