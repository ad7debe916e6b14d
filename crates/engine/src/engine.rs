//! The ledger transaction engine
//!
//! Commit flow: validate → risk gate → optimistic commit → publish.
//!
//! The commit itself is a short critical section: wallet compare-and-swap,
//! journal append, ledger append — together or not at all. A stale wallet
//! snapshot retries up to `max_attempts` before surfacing
//! `ConcurrentModification`; a journal failure rolls the wallet back and
//! surfaces `PersistenceFailure`. Post-commit publication (risk counters,
//! audit sinks) is at-least-once and never rolls back the financial write.

use crate::error::EngineError;
use crate::request::EntryRequest;
use betledger_audit::{AuditEvent, AuditSink};
use betledger_core::Amount;
use betledger_journal::{JournalReader, JournalStore};
use betledger_ledger::{
    EntryStatus, EntryType, LedgerEntry, LedgerError, TransactionLedger, Wallet, WalletKey,
    WalletStore,
};
use betledger_risk::{RiskEngine, RiskError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// The only writer of wallets and the transaction ledger.
///
/// Dependencies are constructed explicitly and passed in; the engine owns
/// no hidden global state.
pub struct LedgerEngine {
    wallets: Arc<WalletStore>,
    ledger: Arc<TransactionLedger>,
    risk: Arc<RiskEngine>,
    sinks: Vec<Arc<dyn AuditSink>>,
    journal: Option<Mutex<JournalStore>>,
    /// Serializes commit critical sections
    commit_lock: Mutex<()>,
    /// Serializes check-then-compensate reversals
    reversal_lock: Mutex<()>,
    max_attempts: u32,
}

impl LedgerEngine {
    /// A fresh in-memory engine (no journal)
    pub fn new(risk: Arc<RiskEngine>) -> Self {
        Self {
            wallets: Arc::new(WalletStore::new()),
            ledger: Arc::new(TransactionLedger::new()),
            risk,
            sinks: Vec::new(),
            journal: None,
            commit_lock: Mutex::new(()),
            reversal_lock: Mutex::new(()),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Open an engine over a journal directory, replaying any existing
    /// history to rebuild wallets, the ledger tail, and risk counters.
    pub fn open(data_dir: impl AsRef<Path>, risk: Arc<RiskEngine>) -> Result<Self, EngineError> {
        Self::open_at(data_dir, risk, Utc::now())
    }

    pub fn open_at(
        data_dir: impl AsRef<Path>,
        risk: Arc<RiskEngine>,
        now: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let data_dir = data_dir.as_ref();

        let reader = JournalReader::from_directory(data_dir)
            .map_err(|e| EngineError::PersistenceFailure(e.to_string()))?;
        let entries = reader
            .read_all()
            .map_err(|e| EngineError::PersistenceFailure(e.to_string()))?;

        let mut engine = Self::new(risk);

        if !entries.is_empty() {
            engine.ledger.load_replayed(entries.clone())?;
            engine.risk.replay_at(entries.iter(), now);
            for wallet in rebuild_wallets(&entries) {
                engine.wallets.load_replayed(wallet);
            }
            tracing::info!(
                entries = entries.len(),
                wallets = engine.wallets.len(),
                "journal replay complete"
            );
        }

        let journal = JournalStore::new(data_dir)
            .map_err(|e| EngineError::PersistenceFailure(e.to_string()))?;
        engine.journal = Some(Mutex::new(journal));
        Ok(engine)
    }

    /// Attach an audit sink
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Override the optimistic-commit retry bound
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Apply a balance mutation and its ledger entry as one atomic unit
    pub fn apply(&self, request: EntryRequest) -> Result<LedgerEntry, EngineError> {
        self.apply_at(request, Utc::now())
    }

    pub fn apply_at(
        &self,
        request: EntryRequest,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, EngineError> {
        request.validate()?;

        // Loss-increasing operations consult the breaker before any write
        if let Some(action) = RiskEngine::action_for(request.entry_type) {
            self.risk
                .admit_at(&request.wallet.tenant_id, action, now)
                .map_err(|err| match err {
                    RiskError::LimitTripped { tenant, status } => {
                        EngineError::RiskLimitExceeded { tenant, status }
                    }
                })?;
        }

        let entry = self.commit(&request, now)?;
        self.publish_post_commit(&entry, now);
        Ok(entry)
    }

    fn commit(
        &self,
        request: &EntryRequest,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, EngineError> {
        for attempt in 1..=self.max_attempts {
            let snapshot = self
                .wallets
                .get_or_create(&request.wallet, &request.currency, now);

            if snapshot.currency != request.currency {
                return Err(LedgerError::CurrencyMismatch {
                    wallet: request.wallet.to_string(),
                    wallet_currency: snapshot.currency.code().to_string(),
                    entry_currency: request.currency.code().to_string(),
                }
                .into());
            }

            let mut updated = snapshot.clone();
            updated.available = snapshot.available.apply_signed(request.amount).map_err(|_| {
                EngineError::InsufficientBalance {
                    wallet: request.wallet.to_string(),
                    available: snapshot.available.value(),
                    requested: request.amount.abs(),
                }
            })?;
            if request.entry_type == EntryType::Bonus {
                // Sign check guarantees bonus credits are positive
                updated.bonus = Amount::new_unchecked(snapshot.bonus.value() + request.amount);
            }

            let id = uuid::Uuid::new_v4().to_string();
            updated.last_synced_at = now;
            updated.last_sync_source = id.clone();

            let mut entry = LedgerEntry {
                id,
                sequence: 0,
                prev_hash: String::new(),
                hash: String::new(),
                wallet: request.wallet.clone(),
                entry_type: request.entry_type,
                amount: request.amount,
                currency: request.currency.clone(),
                balance_before: snapshot.total(),
                balance_after: snapshot.total() + request.amount,
                status: EntryStatus::Completed,
                related_entity_id: request.related_entity_id.clone(),
                metadata: request.metadata.clone(),
                created_at: now,
            };

            // Critical section: everything below commits together or not
            // at all.
            let guard = self.commit_lock.lock();

            match self.wallets.try_commit(updated, snapshot.version) {
                Ok(()) => {}
                Err(LedgerError::VersionConflict { .. }) => {
                    drop(guard);
                    tracing::debug!(wallet = %request.wallet, attempt, "wallet contended, retrying");
                    continue;
                }
                Err(other) => return Err(other.into()),
            }

            if let Err(err) = self.ledger.stamp(&mut entry) {
                self.wallets.restore(snapshot);
                return Err(err.into());
            }

            if let Some(ref journal) = self.journal {
                if let Err(err) = journal.lock().append(&entry) {
                    self.wallets.restore(snapshot);
                    return Err(EngineError::PersistenceFailure(err.to_string()));
                }
            }

            if let Err(err) = self.ledger.append(entry.clone()) {
                self.wallets.restore(snapshot);
                return Err(err.into());
            }

            drop(guard);

            tracing::info!(
                sequence = entry.sequence,
                wallet = %entry.wallet,
                entry_type = %entry.entry_type,
                amount = %entry.amount,
                "ledger entry committed"
            );
            return Ok(entry);
        }

        Err(EngineError::ConcurrentModification {
            wallet: request.wallet.to_string(),
            attempts: self.max_attempts,
        })
    }

    fn publish_post_commit(&self, entry: &LedgerEntry, now: DateTime<Utc>) {
        if let Some(trip) = self.risk.apply_at(entry, now) {
            self.publish(&AuditEvent::breaker_tripped(
                &entry.wallet.tenant_id,
                &trip.period.to_string(),
                trip.net_loss_at_trip,
                trip.limit_at_trip,
                now,
            ));
        }
        self.publish(&AuditEvent::entry_committed(entry));
    }

    fn publish(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            if let Err(err) = sink.publish(event) {
                // At-least-once: the committed write stands; a failed
                // sink catches up from the journal.
                tracing::warn!(
                    sink = sink.name(),
                    action = %event.action,
                    error = %err,
                    "audit publication failed"
                );
            }
        }
    }

    /// Supersede a completed entry with a compensating adjustment.
    ///
    /// The original's status flips to `reversed`; its balance effect is
    /// backed out by the compensating entry, and any net-loss
    /// contribution it made is withdrawn from the breaker counters.
    pub fn reverse(&self, entry_id: &str, reason: &str) -> Result<LedgerEntry, EngineError> {
        self.reverse_at(entry_id, reason, Utc::now())
    }

    pub fn reverse_at(
        &self,
        entry_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, EngineError> {
        let _guard = self.reversal_lock.lock();

        let original = self
            .ledger
            .get(entry_id)
            .ok_or_else(|| LedgerError::EntryNotFound(entry_id.to_string()))?;

        if original.status != EntryStatus::Completed {
            return Err(LedgerError::NotReversible {
                id: original.id.clone(),
                status: original.status.to_string(),
            }
            .into());
        }

        let request = EntryRequest::new(
            original.wallet.clone(),
            EntryType::Adjustment,
            -original.amount,
            original.currency.clone(),
        )
        .related(original.id.clone())
        .meta("reversal_of", serde_json::json!(original.id))
        .meta("reason", serde_json::json!(reason));

        let compensating = self.apply_at(request, now)?;
        self.ledger.mark_reversed(entry_id)?;

        if let Some(delta) = RiskEngine::net_loss_delta(&original) {
            self.risk
                .record_net_change_at(&original.wallet.tenant_id, -delta, now);
        }

        self.publish(&AuditEvent::entry_reversed(&original, now));
        Ok(compensating)
    }

    /// Move available funds to `locked` for an in-flight withdrawal
    pub fn hold(&self, wallet: &WalletKey, amount: Amount) -> Result<Wallet, EngineError> {
        self.wallets.hold(wallet, amount, Utc::now()).map_err(Into::into)
    }

    /// Release held funds back to `available`
    pub fn release(&self, wallet: &WalletKey, amount: Amount) -> Result<Wallet, EngineError> {
        self.wallets
            .release(wallet, amount, Utc::now())
            .map_err(Into::into)
    }

    /// Close an account's wallet: return the remaining balance to the
    /// house as an adjustment, then archive the zeroed record.
    pub fn close_wallet(&self, wallet: &WalletKey) -> Result<Wallet, EngineError> {
        self.close_wallet_at(wallet, Utc::now())
    }

    pub fn close_wallet_at(
        &self,
        wallet: &WalletKey,
        now: DateTime<Utc>,
    ) -> Result<Wallet, EngineError> {
        let current = self
            .wallets
            .get(wallet)
            .ok_or_else(|| LedgerError::WalletNotFound(wallet.to_string()))?;

        if !current.locked.is_zero() {
            self.wallets.release(wallet, current.locked, now)?;
        }

        let total = current.total();
        if !total.is_zero() {
            let request = EntryRequest::new(
                wallet.clone(),
                EntryType::Adjustment,
                -total,
                current.currency.clone(),
            )
            .meta("reason", serde_json::json!("account_closure"));
            self.apply_at(request, now)?;
        }

        Ok(self.wallets.archive(wallet, now)?)
    }

    /// Snapshot one wallet
    pub fn wallet(&self, key: &WalletKey) -> Option<Wallet> {
        self.wallets.get(key)
    }

    /// Shared handle to the wallet store (read-side collaborators)
    pub fn wallets(&self) -> Arc<WalletStore> {
        self.wallets.clone()
    }

    /// Shared handle to the transaction ledger
    pub fn ledger(&self) -> Arc<TransactionLedger> {
        self.ledger.clone()
    }

    /// Shared handle to the risk engine
    pub fn risk(&self) -> Arc<RiskEngine> {
        self.risk.clone()
    }
}

/// Fold a replayed history into final wallet records.
///
/// Balances snapshot the custodial total; holds are transient in-process
/// state, so replayed wallets come back with everything in `available`.
fn rebuild_wallets(entries: &[LedgerEntry]) -> Vec<Wallet> {
    let mut wallets: HashMap<WalletKey, Wallet> = HashMap::new();

    for entry in entries {
        let wallet = wallets.entry(entry.wallet.clone()).or_insert_with(|| {
            Wallet::new(entry.wallet.clone(), entry.currency.clone(), entry.created_at)
        });
        // Chain validation has already run; balance_after is trusted
        wallet.available = Amount::new_unchecked(entry.balance_after);
        if entry.entry_type == EntryType::Bonus {
            wallet.bonus = Amount::new_unchecked(wallet.bonus.value() + entry.amount);
        }
        wallet.version += 1;
        wallet.last_synced_at = entry.created_at;
        wallet.last_sync_source = entry.id.clone();
    }

    wallets.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use betledger_core::Currency;
    use betledger_risk::{BreakerStatus, RiskConfig};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn engine() -> LedgerEngine {
        LedgerEngine::new(Arc::new(RiskEngine::new(RiskConfig::default())))
    }

    fn engine_with_daily_limit(limit: Decimal) -> LedgerEngine {
        LedgerEngine::new(Arc::new(RiskEngine::new(RiskConfig {
            daily_net_loss_limit: limit,
            ..RiskConfig::default()
        })))
    }

    fn deposit(wallet: &WalletKey, amount: Decimal) -> EntryRequest {
        EntryRequest::new(wallet.clone(), EntryType::Deposit, amount, Currency::Usd)
    }

    #[test]
    fn test_apply_creates_wallet_and_entry() {
        let engine = engine();
        let wallet = WalletKey::new("P1", "ACME");

        let entry = engine.apply(deposit(&wallet, dec!(100))).unwrap();

        assert_eq!(entry.sequence, 1);
        assert_eq!(entry.balance_before, dec!(0));
        assert_eq!(entry.balance_after, dec!(100));
        assert_eq!(entry.status, EntryStatus::Completed);

        let stored = engine.wallet(&wallet).unwrap();
        assert_eq!(stored.available.value(), dec!(100));
        assert_eq!(stored.last_sync_source, entry.id);
    }

    #[test]
    fn test_insufficient_balance_leaves_state_untouched() {
        let engine = engine();
        let wallet = WalletKey::new("P1", "ACME");
        engine.apply(deposit(&wallet, dec!(50))).unwrap();

        let request =
            EntryRequest::new(wallet.clone(), EntryType::Withdrawal, dec!(-80), Currency::Usd);
        let result = engine.apply(request);

        assert!(matches!(result, Err(EngineError::InsufficientBalance { .. })));
        assert_eq!(engine.wallet(&wallet).unwrap().available.value(), dec!(50));
        assert_eq!(engine.ledger().len(), 1);
    }

    #[test]
    fn test_risk_gate_denies_before_any_write() {
        let engine = engine_with_daily_limit(dec!(1000));
        let wallet = WalletKey::new("P1", "ACME");
        engine.apply(deposit(&wallet, dec!(500))).unwrap();

        // Trip the tenant's breaker
        engine.risk().record_net_change(&wallet.tenant_id, dec!(1500));

        let stake =
            EntryRequest::new(wallet.clone(), EntryType::BetPlaced, dec!(-100), Currency::Usd);
        let result = engine.apply(stake);

        assert!(matches!(result, Err(EngineError::RiskLimitExceeded { .. })));
        // The wallet write was never attempted
        assert_eq!(engine.wallet(&wallet).unwrap().available.value(), dec!(500));
        assert_eq!(engine.ledger().len(), 1);
    }

    #[test]
    fn test_bet_settlement_trips_breaker() {
        let engine = engine_with_daily_limit(dec!(1000));
        let wallet = WalletKey::new("P1", "ACME");
        engine.apply(deposit(&wallet, dec!(100))).unwrap();

        // Payout of 1200 pushes house net loss over the 1000 limit
        let payout = EntryRequest::new(
            wallet.clone(),
            EntryType::BetWon,
            dec!(1200),
            Currency::Usd,
        )
        .related("bet-1");
        engine.apply(payout).unwrap();

        let risk = engine.risk();
        assert_eq!(
            risk.snapshot(&wallet.tenant_id).status,
            BreakerStatus::TrippedDaily
        );
        // But the payout itself committed: settled liabilities are not gated
        assert_eq!(engine.wallet(&wallet).unwrap().available.value(), dec!(1300));
    }

    #[test]
    fn test_currency_mismatch_rejected() {
        let engine = engine();
        let wallet = WalletKey::new("P1", "ACME");
        engine.apply(deposit(&wallet, dec!(100))).unwrap();

        let request = EntryRequest::new(wallet, EntryType::Deposit, dec!(10), Currency::Eur);
        let result = engine.apply(request);
        assert!(matches!(
            result,
            Err(EngineError::Ledger(LedgerError::CurrencyMismatch { .. }))
        ));
    }

    #[test]
    fn test_reverse_backs_out_entry() {
        let engine = engine();
        let wallet = WalletKey::new("P1", "ACME");
        let original = engine.apply(deposit(&wallet, dec!(100))).unwrap();

        let compensating = engine.reverse(&original.id, "operator error").unwrap();

        assert_eq!(compensating.amount, dec!(-100));
        assert_eq!(compensating.related_entity_id.as_deref(), Some(original.id.as_str()));
        assert_eq!(engine.wallet(&wallet).unwrap().available.value(), dec!(0));
        assert_eq!(
            engine.ledger().get(&original.id).unwrap().status,
            EntryStatus::Reversed
        );

        // Already reversed entries cannot be reversed again
        let again = engine.reverse(&original.id, "twice");
        assert!(matches!(
            again,
            Err(EngineError::Ledger(LedgerError::NotReversible { .. }))
        ));
    }

    #[test]
    fn test_hold_does_not_break_entry_chaining() {
        let engine = engine();
        let wallet = WalletKey::new("P1", "ACME");
        engine.apply(deposit(&wallet, dec!(100))).unwrap();

        engine.hold(&wallet, Amount::new(dec!(30)).unwrap()).unwrap();

        // The next entry chains on the custodial total, which the hold
        // did not change
        let entry = engine.apply(deposit(&wallet, dec!(10))).unwrap();
        assert_eq!(entry.balance_before, dec!(100));
        assert_eq!(entry.balance_after, dec!(110));

        let stored = engine.wallet(&wallet).unwrap();
        assert_eq!(stored.available.value(), dec!(80));
        assert_eq!(stored.locked.value(), dec!(30));
    }

    #[test]
    fn test_bonus_tracks_sub_balance() {
        let engine = engine();
        let wallet = WalletKey::new("P1", "ACME");

        engine
            .apply(EntryRequest::new(
                wallet.clone(),
                EntryType::Bonus,
                dec!(25),
                Currency::Usd,
            ))
            .unwrap();

        let stored = engine.wallet(&wallet).unwrap();
        assert_eq!(stored.available.value(), dec!(25));
        assert_eq!(stored.bonus.value(), dec!(25));
    }

    #[test]
    fn test_close_wallet_returns_balance_and_archives() {
        let engine = engine();
        let wallet = WalletKey::new("P1", "ACME");
        engine.apply(deposit(&wallet, dec!(100))).unwrap();
        engine.hold(&wallet, Amount::new(dec!(20)).unwrap()).unwrap();

        let archived = engine.close_wallet(&wallet).unwrap();

        assert!(archived.available.is_zero());
        assert!(archived.locked.is_zero());
        // Closure entry drains the full custodial total
        assert_eq!(engine.ledger().sum_applied(&wallet), dec!(0));
    }
}
