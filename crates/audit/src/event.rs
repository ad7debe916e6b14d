//! Audit event shape consumed by the external audit-log collaborator

use betledger_ledger::{LedgerEntry, WalletKey};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// How urgently an operator should look at this
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One audit event: who did what to which resource, with the balance
/// movement when there is one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub tenant_id: String,
    pub actor_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub amount_before: Option<Decimal>,
    pub amount_after: Option<Decimal>,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// A ledger entry was committed
    pub fn entry_committed(entry: &LedgerEntry) -> Self {
        Self {
            tenant_id: entry.wallet.tenant_id.clone(),
            actor_id: entry.wallet.account_id.clone(),
            action: format!("ledger.{}", entry.entry_type),
            resource_type: "ledger_entry".to_string(),
            resource_id: entry.id.clone(),
            amount_before: Some(entry.balance_before),
            amount_after: Some(entry.balance_after),
            severity: Severity::Info,
            timestamp: entry.created_at,
        }
    }

    /// A committed entry was superseded by a compensating entry
    pub fn entry_reversed(original: &LedgerEntry, at: DateTime<Utc>) -> Self {
        Self {
            tenant_id: original.wallet.tenant_id.clone(),
            actor_id: original.wallet.account_id.clone(),
            action: "ledger.entry_reversed".to_string(),
            resource_type: "ledger_entry".to_string(),
            resource_id: original.id.clone(),
            amount_before: Some(original.balance_after),
            amount_after: Some(original.balance_before),
            severity: Severity::Warning,
            timestamp: at,
        }
    }

    /// A tenant's circuit breaker tripped.
    ///
    /// `amount_before` carries the limit at trip, `amount_after` the net
    /// loss that breached it.
    pub fn breaker_tripped(
        tenant_id: &str,
        period: &str,
        net_loss_at_trip: Decimal,
        limit_at_trip: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            actor_id: "system".to_string(),
            action: format!("risk.breaker_tripped_{}", period),
            resource_type: "circuit_breaker".to_string(),
            resource_id: tenant_id.to_string(),
            amount_before: Some(limit_at_trip),
            amount_after: Some(net_loss_at_trip),
            severity: Severity::Critical,
            timestamp: at,
        }
    }

    /// A tripped breaker was reset (boundary auto-reset or operator)
    pub fn breaker_reset(tenant_id: &str, period: &str, actor_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            actor_id: actor_id.to_string(),
            action: format!("risk.breaker_reset_{}", period),
            resource_type: "circuit_breaker".to_string(),
            resource_id: tenant_id.to_string(),
            amount_before: None,
            amount_after: None,
            severity: Severity::Info,
            timestamp: at,
        }
    }

    /// Reconciliation found a wallet whose stored balance disagrees with
    /// its ledger history. Surfaced for manual review, never auto-fixed.
    pub fn discrepancy(
        wallet: &WalletKey,
        wallet_balance: Decimal,
        ledger_balance: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: wallet.tenant_id.clone(),
            actor_id: "system".to_string(),
            action: "reconcile.discrepancy".to_string(),
            resource_type: "wallet".to_string(),
            resource_id: wallet.to_string(),
            amount_before: Some(ledger_balance),
            amount_after: Some(wallet_balance),
            severity: Severity::Critical,
            timestamp: at,
        }
    }
}
