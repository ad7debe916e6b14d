//! Risk engine - pre-commit gate and counter feed
//!
//! One `CircuitBreaker` per tenant, created on first touch from the
//! engine-wide default config. The counter increment-and-test runs under
//! the tenant's breaker mutex so two concurrent near-limit operations
//! cannot both slip through before either trips.

use crate::breaker::{BreakerStatus, CircuitBreaker, Period, TripRecord};
use crate::config::RiskConfig;
use crate::error::RiskError;
use betledger_ledger::{EntryType, LedgerEntry};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Operation classes a tripped breaker can block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskAction {
    PlaceBet,
    Deposit,
}

/// Per-tenant circuit breaker registry and gate
pub struct RiskEngine {
    default_config: RiskConfig,
    breakers: RwLock<HashMap<String, Arc<Mutex<CircuitBreaker>>>>,
}

impl RiskEngine {
    /// Create an engine whose tenants start from `default_config`
    pub fn new(default_config: RiskConfig) -> Self {
        Self {
            default_config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// The gate class an entry type is subject to, if any.
    ///
    /// Only new risk (bets) and optionally deposits are gated; payouts of
    /// already-placed bets never are.
    pub fn action_for(entry_type: EntryType) -> Option<RiskAction> {
        match entry_type {
            EntryType::BetPlaced => Some(RiskAction::PlaceBet),
            EntryType::Deposit => Some(RiskAction::Deposit),
            _ => None,
        }
    }

    /// House-perspective net-loss delta an entry contributes, if any.
    ///
    /// A placed bet's signed amount is the negated stake (house collects,
    /// net loss falls); wins and voids are payouts (net loss rises). The
    /// signed entry amount already carries exactly that delta.
    pub fn net_loss_delta(entry: &LedgerEntry) -> Option<Decimal> {
        match entry.entry_type {
            EntryType::BetPlaced | EntryType::BetWon | EntryType::BetVoid => Some(entry.amount),
            _ => None,
        }
    }

    fn breaker(&self, tenant_id: &str, now: DateTime<Utc>) -> Arc<Mutex<CircuitBreaker>> {
        let tenant = tenant_id.to_uppercase();
        if let Some(breaker) = self.breakers.read().get(&tenant) {
            return breaker.clone();
        }
        let mut breakers = self.breakers.write();
        breakers
            .entry(tenant.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(CircuitBreaker::new(
                    tenant,
                    self.default_config.clone(),
                    now,
                )))
            })
            .clone()
    }

    /// Replace one tenant's limit configuration, keeping its counters
    pub fn set_tenant_config(&self, tenant_id: &str, config: RiskConfig) {
        let breaker = self.breaker(tenant_id, Utc::now());
        breaker.lock().config = config;
    }

    /// Pure read-time gate: may this tenant take on `action` right now?
    ///
    /// Runs the lazy boundary reset, then answers from the breaker status
    /// and `trip_actions` flags. Never mutates counters.
    pub fn admit(&self, tenant_id: &str, action: RiskAction) -> Result<(), RiskError> {
        self.admit_at(tenant_id, action, Utc::now())
    }

    pub fn admit_at(
        &self,
        tenant_id: &str,
        action: RiskAction,
        now: DateTime<Utc>,
    ) -> Result<(), RiskError> {
        let breaker = self.breaker(tenant_id, now);
        let mut breaker = breaker.lock();
        breaker.roll_periods(now);

        if !breaker.status.is_tripped() {
            return Ok(());
        }

        let blocked = match action {
            RiskAction::PlaceBet => breaker.config.trip_actions.block_new_bets,
            RiskAction::Deposit => breaker.config.trip_actions.block_deposits,
        };

        if blocked {
            Err(RiskError::LimitTripped {
                tenant: breaker.tenant_id.clone(),
                status: breaker.status,
            })
        } else {
            Ok(())
        }
    }

    /// Atomic increment-and-test of a tenant's rolling counters
    pub fn record_net_change(&self, tenant_id: &str, delta: Decimal) -> Option<TripRecord> {
        self.record_net_change_at(tenant_id, delta, Utc::now())
    }

    pub fn record_net_change_at(
        &self,
        tenant_id: &str,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> Option<TripRecord> {
        let breaker = self.breaker(tenant_id, now);
        let mut breaker = breaker.lock();
        breaker.record(delta, now)
    }

    /// Feed a committed entry's net-loss contribution, if it has one
    pub fn apply_at(&self, entry: &LedgerEntry, now: DateTime<Utc>) -> Option<TripRecord> {
        let delta = Self::net_loss_delta(entry)?;
        self.record_net_change_at(&entry.wallet.tenant_id, delta, now)
    }

    /// Rebuild counters from replayed entries.
    ///
    /// Only entries inside the current UTC windows are counted (per
    /// period); afterwards each touched breaker is re-evaluated so a
    /// still-breached limit re-trips.
    pub fn replay_at<'a>(
        &self,
        entries: impl Iterator<Item = &'a LedgerEntry>,
        now: DateTime<Utc>,
    ) {
        let mut touched = Vec::new();
        for entry in entries {
            if let Some(delta) = Self::net_loss_delta(entry) {
                let breaker = self.breaker(&entry.wallet.tenant_id, now);
                breaker.lock().replay_feed(delta, entry.created_at, now);
                if !touched.iter().any(|t| Arc::ptr_eq(t, &breaker)) {
                    touched.push(breaker);
                }
            }
        }
        for breaker in touched {
            breaker.lock().evaluate(now);
        }
    }

    /// Operator reset of one period's counter
    pub fn manual_reset(&self, tenant_id: &str, period: Period) {
        self.manual_reset_at(tenant_id, period, Utc::now());
    }

    pub fn manual_reset_at(&self, tenant_id: &str, period: Period, now: DateTime<Utc>) {
        let breaker = self.breaker(tenant_id, now);
        breaker.lock().manual_reset(period, now);
    }

    /// Administrative suspension of a tenant's breaker
    pub fn disable(&self, tenant_id: &str) {
        let breaker = self.breaker(tenant_id, Utc::now());
        breaker.lock().disable();
    }

    /// End suspension; re-tests counters immediately
    pub fn enable(&self, tenant_id: &str) -> Option<TripRecord> {
        self.enable_at(tenant_id, Utc::now())
    }

    pub fn enable_at(&self, tenant_id: &str, now: DateTime<Utc>) -> Option<TripRecord> {
        let breaker = self.breaker(tenant_id, now);
        let result = breaker.lock().enable(now);
        result
    }

    /// Current status after a lazy roll
    pub fn status_at(&self, tenant_id: &str, now: DateTime<Utc>) -> BreakerStatus {
        let breaker = self.breaker(tenant_id, now);
        let mut breaker = breaker.lock();
        breaker.roll_periods(now);
        breaker.status
    }

    /// Cloned breaker state for operators and tests
    pub fn snapshot(&self, tenant_id: &str) -> CircuitBreaker {
        self.snapshot_at(tenant_id, Utc::now())
    }

    pub fn snapshot_at(&self, tenant_id: &str, now: DateTime<Utc>) -> CircuitBreaker {
        let breaker = self.breaker(tenant_id, now);
        let mut breaker = breaker.lock();
        breaker.roll_periods(now);
        breaker.clone()
    }
}
