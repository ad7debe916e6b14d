//! Redemption protocol - all-or-nothing voucher redemption
//!
//! The voucher's mutex is held across the whole sequence (lookup checks,
//! wallet credit, status transition, commission), so a code can be
//! redeemed exactly once. A commission failure compensates the already
//! committed credit and puts the voucher back to `unused` — nothing
//! partially applies.

use crate::error::VoucherError;
use crate::store::VoucherStore;
use crate::voucher::{normalize_code, VoucherStatus};
use betledger_core::Currency;
use betledger_engine::{EntryRequest, LedgerEngine};
use betledger_ledger::{EntryType, WalletKey};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// What a successful redemption returns
#[derive(Debug, Clone, PartialEq)]
pub struct Redemption {
    pub amount: Decimal,
    pub currency: Currency,
    pub new_balance: Decimal,
}

/// Voucher redemption workflow over the ledger transaction engine
pub struct RedemptionProtocol {
    vouchers: Arc<VoucherStore>,
    engine: Arc<LedgerEngine>,
}

impl RedemptionProtocol {
    pub fn new(vouchers: Arc<VoucherStore>, engine: Arc<LedgerEngine>) -> Self {
        Self { vouchers, engine }
    }

    /// Redeem a voucher into the account's wallet
    pub fn redeem(
        &self,
        code: &str,
        account_id: &str,
        tenant_id: &str,
    ) -> Result<Redemption, VoucherError> {
        self.redeem_at(code, account_id, tenant_id, Utc::now())
    }

    pub fn redeem_at(
        &self,
        code: &str,
        account_id: &str,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Redemption, VoucherError> {
        let code = normalize_code(code);
        let account_tenant = tenant_id.to_uppercase();

        let cell = self
            .vouchers
            .cell(&code)
            .ok_or_else(|| VoucherError::NotFound(code.clone()))?;
        let mut voucher = cell.lock();

        if voucher.tenant_id != account_tenant {
            return Err(VoucherError::TenantMismatch {
                code,
                voucher_tenant: voucher.tenant_id.clone(),
                account_tenant,
            });
        }

        match voucher.status {
            VoucherStatus::Unused => {}
            VoucherStatus::Redeemed => return Err(VoucherError::AlreadyRedeemed(code)),
            VoucherStatus::Cancelled => return Err(VoucherError::Cancelled(code)),
            VoucherStatus::Expired => return Err(VoucherError::Expired(code)),
        }

        // Lazy expiry: the transition persists even though the
        // redemption fails
        if voucher.is_expired(now) {
            voucher.status = VoucherStatus::Expired;
            tracing::info!(code = %voucher.code, "voucher expired on redemption attempt");
            return Err(VoucherError::Expired(code));
        }

        let player_wallet = WalletKey::new(account_id, tenant_id);
        let credit = self.engine.apply_at(
            EntryRequest::new(
                player_wallet.clone(),
                EntryType::VoucherRedemption,
                voucher.amount.value(),
                voucher.currency.clone(),
            )
            .related(voucher.code.clone())
            .meta("agent_id", serde_json::json!(voucher.agent_id)),
            now,
        )?;

        voucher.status = VoucherStatus::Redeemed;
        voucher.redeemed_by = Some(player_wallet.account_id.clone());
        voucher.redeemed_at = Some(now);

        let commission = voucher.commission_amount();
        if commission > Decimal::ZERO {
            let agent_wallet = WalletKey::new(voucher.agent_id.clone(), tenant_id);
            let paid = self.engine.apply_at(
                EntryRequest::new(
                    agent_wallet,
                    EntryType::Commission,
                    commission,
                    voucher.currency.clone(),
                )
                .related(voucher.code.clone())
                .meta("redeemed_by", serde_json::json!(player_wallet.account_id)),
                now,
            );

            if let Err(err) = paid {
                // Compensate: back out the credit, restore the voucher
                if let Err(reversal_err) =
                    self.engine.reverse_at(&credit.id, "commission failed", now)
                {
                    tracing::error!(
                        code = %voucher.code,
                        error = %reversal_err,
                        "failed to compensate redemption credit"
                    );
                }
                voucher.status = VoucherStatus::Unused;
                voucher.redeemed_by = None;
                voucher.redeemed_at = None;
                return Err(err.into());
            }

            voucher.commission_paid = Some(commission);
        }

        tracing::info!(
            code = %voucher.code,
            wallet = %player_wallet,
            amount = %voucher.amount,
            commission = %commission,
            "voucher redeemed"
        );

        let new_balance = self
            .engine
            .wallet(&player_wallet)
            .map(|w| w.available.value())
            .unwrap_or(credit.balance_after);

        Ok(Redemption {
            amount: voucher.amount.value(),
            currency: voucher.currency.clone(),
            new_balance,
        })
    }
}
