//! Wallet - tenant-scoped balance records
//!
//! One wallet exists per (account, tenant). Wallets are created on the
//! first money-relevant action, mutated exclusively through the ledger
//! transaction engine, and archived (zeroed) rather than deleted.
//!
//! Concurrency follows optimistic versioning: readers take a snapshot,
//! compute, and commit with `try_commit`, which rejects stale versions so
//! no update is ever lost.

use crate::error::LedgerError;
use betledger_core::{Amount, Currency};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Tenant-scoped wallet identifier.
///
/// Format: `TENANT:ACCOUNT`, both segments uppercased on construction so
/// lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletKey {
    /// Owning account identifier
    pub account_id: String,

    /// Tenant the wallet is scoped to
    pub tenant_id: String,
}

impl WalletKey {
    /// Create a new WalletKey
    pub fn new(account_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into().to_uppercase(),
            tenant_id: tenant_id.into().to_uppercase(),
        }
    }
}

impl fmt::Display for WalletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tenant_id, self.account_id)
    }
}

impl FromStr for WalletKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(LedgerError::InvalidWalletRef(s.to_string()));
        }
        Ok(WalletKey::new(parts[1], parts[0]))
    }
}

/// One balance record per (account, tenant).
///
/// `version` is the optimistic-concurrency stamp: it advances by one on
/// every committed mutation and `WalletStore::try_commit` rejects writes
/// built against a stale snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub key: WalletKey,

    /// Funds the account can spend right now
    pub available: Amount,

    /// Funds held for in-flight withdrawal workflows
    pub locked: Amount,

    /// Lifetime bonus value credited (tracking sub-balance; the value
    /// itself sits in `available`)
    pub bonus: Amount,

    pub currency: Currency,

    /// Optimistic-concurrency stamp
    pub version: u64,

    pub last_synced_at: DateTime<Utc>,

    /// What last touched this wallet (an entry id, "hold", "archive", ...)
    pub last_sync_source: String,
}

impl Wallet {
    /// A fresh zero-balance wallet
    pub fn new(key: WalletKey, currency: Currency, now: DateTime<Utc>) -> Self {
        Self {
            key,
            available: Amount::ZERO,
            locked: Amount::ZERO,
            bonus: Amount::ZERO,
            currency,
            version: 0,
            last_synced_at: now,
            last_sync_source: "create".to_string(),
        }
    }

    /// Total custodied balance: `available + locked`.
    ///
    /// This is the quantity ledger entries snapshot and chain on; holds
    /// move value between the two buckets without changing it.
    pub fn total(&self) -> Decimal {
        self.available.value() + self.locked.value()
    }
}

/// Concurrent wallet map keyed by (account, tenant).
///
/// The store never exposes `&mut Wallet`; all mutation goes through
/// snapshot-then-`try_commit` (or the dedicated hold/release/archive
/// operations, which take the write lock directly).
#[derive(Debug, Default)]
pub struct WalletStore {
    wallets: RwLock<HashMap<WalletKey, Wallet>>,
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a wallet, if it exists
    pub fn get(&self, key: &WalletKey) -> Option<Wallet> {
        self.wallets.read().get(key).cloned()
    }

    /// Snapshot a wallet, creating a zero-balance record on first touch
    pub fn get_or_create(
        &self,
        key: &WalletKey,
        currency: &Currency,
        now: DateTime<Utc>,
    ) -> Wallet {
        if let Some(wallet) = self.get(key) {
            return wallet;
        }
        let mut wallets = self.wallets.write();
        wallets
            .entry(key.clone())
            .or_insert_with(|| Wallet::new(key.clone(), currency.clone(), now))
            .clone()
    }

    /// Commit a mutated snapshot if nobody else has committed since it was
    /// taken.
    ///
    /// `expected_version` is the version of the snapshot the update was
    /// computed from. On success the stored wallet carries
    /// `expected_version + 1`.
    pub fn try_commit(&self, updated: Wallet, expected_version: u64) -> Result<(), LedgerError> {
        let mut wallets = self.wallets.write();
        let current_version = wallets.get(&updated.key).map(|w| w.version).unwrap_or(0);

        if current_version != expected_version {
            return Err(LedgerError::VersionConflict {
                wallet: updated.key.to_string(),
                expected: expected_version,
                found: current_version,
            });
        }

        let mut committed = updated;
        committed.version = expected_version + 1;
        wallets.insert(committed.key.clone(), committed);
        Ok(())
    }

    /// Put a wallet back exactly as it was.
    ///
    /// Rollback hook for the transaction engine: undoes a `try_commit`
    /// when a later step of the same commit fails. Not for general use.
    pub fn restore(&self, previous: Wallet) {
        self.wallets.write().insert(previous.key.clone(), previous);
    }

    /// Move funds from `available` to `locked` (withdrawal hold).
    ///
    /// Conserves the custodial total, so no ledger entry is produced.
    pub fn hold(
        &self,
        key: &WalletKey,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<Wallet, LedgerError> {
        let mut wallets = self.wallets.write();
        let wallet = wallets
            .get_mut(key)
            .ok_or_else(|| LedgerError::WalletNotFound(key.to_string()))?;

        let available = wallet.available.checked_sub(amount).ok_or_else(|| {
            LedgerError::InsufficientAvailable {
                wallet: key.to_string(),
                available: wallet.available.value(),
                requested: amount.value(),
            }
        })?;

        wallet.available = available;
        wallet.locked = wallet
            .locked
            .checked_add(amount)
            .ok_or_else(|| LedgerError::NegativeBalance {
                wallet: key.to_string(),
            })?;
        wallet.version += 1;
        wallet.last_synced_at = now;
        wallet.last_sync_source = "hold".to_string();
        Ok(wallet.clone())
    }

    /// Move held funds back to `available` (hold released)
    pub fn release(
        &self,
        key: &WalletKey,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<Wallet, LedgerError> {
        let mut wallets = self.wallets.write();
        let wallet = wallets
            .get_mut(key)
            .ok_or_else(|| LedgerError::WalletNotFound(key.to_string()))?;

        let locked = wallet.locked.checked_sub(amount).ok_or_else(|| {
            LedgerError::InsufficientAvailable {
                wallet: key.to_string(),
                available: wallet.locked.value(),
                requested: amount.value(),
            }
        })?;

        wallet.locked = locked;
        wallet.available = wallet
            .available
            .checked_add(amount)
            .ok_or_else(|| LedgerError::NegativeBalance {
                wallet: key.to_string(),
            })?;
        wallet.version += 1;
        wallet.last_synced_at = now;
        wallet.last_sync_source = "release".to_string();
        Ok(wallet.clone())
    }

    /// Zero all balances on account closure. The record survives for
    /// audit; only its balances are cleared.
    pub fn archive(&self, key: &WalletKey, now: DateTime<Utc>) -> Result<Wallet, LedgerError> {
        let mut wallets = self.wallets.write();
        let wallet = wallets
            .get_mut(key)
            .ok_or_else(|| LedgerError::WalletNotFound(key.to_string()))?;

        wallet.available = Amount::ZERO;
        wallet.locked = Amount::ZERO;
        wallet.bonus = Amount::ZERO;
        wallet.version += 1;
        wallet.last_synced_at = now;
        wallet.last_sync_source = "archive".to_string();
        Ok(wallet.clone())
    }

    /// Insert a wallet rebuilt from journal replay
    pub fn load_replayed(&self, wallet: Wallet) {
        self.wallets.write().insert(wallet.key.clone(), wallet);
    }

    /// All wallet keys currently in the store
    pub fn keys(&self) -> Vec<WalletKey> {
        self.wallets.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amount(val: Decimal) -> Amount {
        Amount::new(val).unwrap()
    }

    #[test]
    fn test_key_normalization() {
        let key = WalletKey::new("p1", "acme");
        assert_eq!(key.account_id, "P1");
        assert_eq!(key.tenant_id, "ACME");
        assert_eq!(key.to_string(), "ACME:P1");
    }

    #[test]
    fn test_key_roundtrip() {
        let key: WalletKey = "ACME:P1".parse().unwrap();
        assert_eq!(key, WalletKey::new("P1", "ACME"));
        assert_eq!(key.to_string(), "ACME:P1");
    }

    #[test]
    fn test_key_invalid_format() {
        let result: Result<WalletKey, _> = "ACME".parse();
        assert!(matches!(result, Err(LedgerError::InvalidWalletRef(_))));
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = WalletStore::new();
        let key = WalletKey::new("P1", "ACME");

        let first = store.get_or_create(&key, &Currency::Usd, Utc::now());
        let second = store.get_or_create(&key, &Currency::Usd, Utc::now());

        assert_eq!(first.version, second.version);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_try_commit_bumps_version() {
        let store = WalletStore::new();
        let key = WalletKey::new("P1", "ACME");
        let mut snapshot = store.get_or_create(&key, &Currency::Usd, Utc::now());

        snapshot.available = amount(dec!(100));
        store.try_commit(snapshot, 0).unwrap();

        let stored = store.get(&key).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.available.value(), dec!(100));
    }

    #[test]
    fn test_try_commit_rejects_stale_snapshot() {
        let store = WalletStore::new();
        let key = WalletKey::new("P1", "ACME");
        let snapshot = store.get_or_create(&key, &Currency::Usd, Utc::now());

        // Another writer commits first
        store.try_commit(snapshot.clone(), 0).unwrap();

        let result = store.try_commit(snapshot, 0);
        assert!(matches!(result, Err(LedgerError::VersionConflict { .. })));
    }

    #[test]
    fn test_hold_and_release_conserve_total() {
        let store = WalletStore::new();
        let key = WalletKey::new("P1", "ACME");
        let mut snapshot = store.get_or_create(&key, &Currency::Usd, Utc::now());
        snapshot.available = amount(dec!(100));
        store.try_commit(snapshot, 0).unwrap();

        let held = store.hold(&key, amount(dec!(40)), Utc::now()).unwrap();
        assert_eq!(held.available.value(), dec!(60));
        assert_eq!(held.locked.value(), dec!(40));
        assert_eq!(held.total(), dec!(100));

        let released = store.release(&key, amount(dec!(40)), Utc::now()).unwrap();
        assert_eq!(released.available.value(), dec!(100));
        assert_eq!(released.locked.value(), dec!(0));
    }

    #[test]
    fn test_hold_rejects_overdraw() {
        let store = WalletStore::new();
        let key = WalletKey::new("P1", "ACME");
        store.get_or_create(&key, &Currency::Usd, Utc::now());

        let result = store.hold(&key, amount(dec!(1)), Utc::now());
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientAvailable { .. })
        ));
    }

    #[test]
    fn test_archive_zeroes_balances() {
        let store = WalletStore::new();
        let key = WalletKey::new("P1", "ACME");
        let mut snapshot = store.get_or_create(&key, &Currency::Usd, Utc::now());
        snapshot.available = amount(dec!(75));
        snapshot.bonus = amount(dec!(10));
        store.try_commit(snapshot, 0).unwrap();

        let archived = store.archive(&key, Utc::now()).unwrap();
        assert!(archived.available.is_zero());
        assert!(archived.bonus.is_zero());
        assert_eq!(archived.last_sync_source, "archive");

        // The record itself survives
        assert!(store.get(&key).is_some());
    }
}
