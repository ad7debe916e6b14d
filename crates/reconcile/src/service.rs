//! Reconciliation service - ledger replay vs stored balance

use crate::error::ReconcileError;
use betledger_audit::{AuditEvent, AuditSink};
use betledger_ledger::{TransactionLedger, WalletKey, WalletStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Outcome of reconciling one wallet
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    pub wallet: WalletKey,

    /// Stored custodial balance (`available + locked`; holds move value
    /// between the two buckets without a ledger entry)
    pub wallet_balance: Decimal,

    /// Sum of signed amounts of all applied ledger entries
    pub ledger_balance: Decimal,

    /// `wallet_balance - ledger_balance`
    pub discrepancy: Decimal,

    /// Tolerance: the currency's smallest unit
    pub epsilon: Decimal,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.discrepancy.abs() <= self.epsilon
    }
}

/// Read-only balance verifier.
///
/// Reads the wallet store and the ledger; writes nothing but audit
/// events.
pub struct ReconciliationService {
    wallets: Arc<WalletStore>,
    ledger: Arc<TransactionLedger>,
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl ReconciliationService {
    pub fn new(wallets: Arc<WalletStore>, ledger: Arc<TransactionLedger>) -> Self {
        Self {
            wallets,
            ledger,
            sinks: Vec::new(),
        }
    }

    /// Attach an audit sink for discrepancy events
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Recompute one wallet's balance from its ledger history
    pub fn reconcile(&self, wallet: &WalletKey) -> Result<ReconciliationReport, ReconcileError> {
        self.reconcile_at(wallet, Utc::now())
    }

    pub fn reconcile_at(
        &self,
        wallet: &WalletKey,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationReport, ReconcileError> {
        let stored = self
            .wallets
            .get(wallet)
            .ok_or_else(|| ReconcileError::WalletNotFound(wallet.to_string()))?;

        let ledger_balance = self.ledger.sum_applied(wallet);
        let wallet_balance = stored.total();

        let report = ReconciliationReport {
            wallet: wallet.clone(),
            wallet_balance,
            ledger_balance,
            discrepancy: wallet_balance - ledger_balance,
            epsilon: stored.currency.smallest_unit(),
        };

        if !report.is_consistent() {
            tracing::warn!(
                wallet = %report.wallet,
                wallet_balance = %report.wallet_balance,
                ledger_balance = %report.ledger_balance,
                discrepancy = %report.discrepancy,
                "balance discrepancy detected"
            );
            let event =
                AuditEvent::discrepancy(wallet, report.wallet_balance, report.ledger_balance, now);
            for sink in &self.sinks {
                if let Err(err) = sink.publish(&event) {
                    tracing::warn!(sink = sink.name(), error = %err, "audit publication failed");
                }
            }
        }

        Ok(report)
    }

    /// Sweep every wallet in the store
    pub fn reconcile_all(&self) -> Vec<ReconciliationReport> {
        self.reconcile_all_at(Utc::now())
    }

    pub fn reconcile_all_at(&self, now: DateTime<Utc>) -> Vec<ReconciliationReport> {
        let mut reports = Vec::new();
        for key in self.wallets.keys() {
            if let Ok(report) = self.reconcile_at(&key, now) {
                reports.push(report);
            }
        }
        reports
    }
}
