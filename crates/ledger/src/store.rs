//! Append-only transaction ledger
//!
//! Entries enter the ledger in two steps driven by the transaction
//! engine's commit section: `stamp` validates an entry against the
//! current tail (balance chaining, balance invariant) and assigns its
//! sequence and hashes without mutating the ledger; `append` then inserts
//! it. The split lets the engine place the wallet compare-and-swap and
//! the journal write between the two, with nothing to unwind in the
//! ledger if either fails.

use crate::chain::{entry_hash, verify_chain, ChainError, GENESIS_HASH};
use crate::entry::{EntryStatus, LedgerEntry};
use crate::error::LedgerError;
use crate::wallet::WalletKey;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<LedgerEntry>,
    /// Entry id -> position in `entries`
    index: HashMap<String, usize>,
    /// Last balance_after per wallet (the chaining expectation)
    tails: HashMap<WalletKey, Decimal>,
    last_sequence: u64,
    last_hash: Option<String>,
}

impl Inner {
    fn last_hash(&self) -> &str {
        self.last_hash.as_deref().unwrap_or(GENESIS_HASH)
    }
}

/// Append-only, hash-chained log of ledger entries.
///
/// Reads are lock-free in the RwLock sense; writes happen only inside
/// the engine's serialized commit section.
#[derive(Debug, Default)]
pub struct TransactionLedger {
    inner: RwLock<Inner>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate an entry against the current tail and assign its chain
    /// position (sequence, prev_hash, hash). Does not mutate the ledger.
    pub fn stamp(&self, entry: &mut LedgerEntry) -> Result<(), LedgerError> {
        let inner = self.inner.read();

        let expected_before = inner
            .tails
            .get(&entry.wallet)
            .copied()
            .unwrap_or(Decimal::ZERO);
        if entry.balance_before != expected_before {
            return Err(LedgerError::NonContiguousEntry {
                wallet: entry.wallet.to_string(),
                expected: expected_before,
                actual: entry.balance_before,
            });
        }

        entry.verify_balance()?;

        entry.sequence = inner.last_sequence + 1;
        entry.prev_hash = inner.last_hash().to_string();
        entry.hash = entry_hash(entry);
        Ok(())
    }

    /// Insert a stamped entry and advance the tail state
    pub fn append(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();

        if entry.sequence != inner.last_sequence + 1 {
            return Err(LedgerError::OutOfSequence {
                expected: inner.last_sequence + 1,
                actual: entry.sequence,
            });
        }

        inner.last_sequence = entry.sequence;
        inner.last_hash = Some(entry.hash.clone());
        inner.tails.insert(entry.wallet.clone(), entry.balance_after);
        let position = inner.entries.len();
        inner.index.insert(entry.id.clone(), position);
        inner.entries.push(entry);
        Ok(())
    }

    /// Balance the next entry for this wallet must start from
    pub fn tail_balance(&self, wallet: &WalletKey) -> Decimal {
        self.inner
            .read()
            .tails
            .get(wallet)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Look up an entry by id
    pub fn get(&self, id: &str) -> Option<LedgerEntry> {
        let inner = self.inner.read();
        inner.index.get(id).map(|&pos| inner.entries[pos].clone())
    }

    /// All entries for a wallet, in commit order
    pub fn entries_for_wallet(&self, wallet: &WalletKey) -> Vec<LedgerEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|e| &e.wallet == wallet)
            .cloned()
            .collect()
    }

    /// Snapshot of the whole ledger, in commit order
    pub fn all(&self) -> Vec<LedgerEntry> {
        self.inner.read().entries.clone()
    }

    /// Sum of signed amounts of applied entries for a wallet.
    ///
    /// Applied means `completed` or `reversed` (a reversed entry's effect
    /// stays on the wallet; the compensating entry backs it out).
    pub fn sum_applied(&self, wallet: &WalletKey) -> Decimal {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|e| &e.wallet == wallet && e.status.affects_balance())
            .map(|e| e.amount)
            .sum()
    }

    /// Flip a completed entry to `reversed`.
    ///
    /// The one permitted mutation of committed history; the hash chain
    /// excludes status so the chain stays valid.
    pub fn mark_reversed(&self, id: &str) -> Result<LedgerEntry, LedgerError> {
        let mut inner = self.inner.write();
        let position = *inner
            .index
            .get(id)
            .ok_or_else(|| LedgerError::EntryNotFound(id.to_string()))?;
        let entry = &mut inner.entries[position];

        if entry.status != EntryStatus::Completed {
            return Err(LedgerError::NotReversible {
                id: id.to_string(),
                status: entry.status.to_string(),
            });
        }

        entry.status = EntryStatus::Reversed;
        Ok(entry.clone())
    }

    /// Verify the full hash chain
    pub fn verify(&self) -> Result<(), ChainError> {
        verify_chain(&self.inner.read().entries)
    }

    /// Rebuild the ledger from journal replay.
    ///
    /// The history is chain-verified before anything is loaded.
    pub fn load_replayed(&self, entries: Vec<LedgerEntry>) -> Result<(), LedgerError> {
        verify_chain(&entries)?;

        let mut inner = self.inner.write();
        for entry in entries {
            inner.last_sequence = entry.sequence;
            inner.last_hash = Some(entry.hash.clone());
            inner.tails.insert(entry.wallet.clone(), entry.balance_after);
            let position = inner.entries.len();
            inner.index.insert(entry.id.clone(), position);
            inner.entries.push(entry);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.inner.read().last_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryType;
    use betledger_core::Currency;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn draft(wallet: &WalletKey, entry_type: EntryType, amount: Decimal, before: Decimal) -> LedgerEntry {
        LedgerEntry {
            id: format!("e-{}-{}", wallet.account_id, amount),
            sequence: 0,
            prev_hash: String::new(),
            hash: String::new(),
            wallet: wallet.clone(),
            entry_type,
            amount,
            currency: Currency::Usd,
            balance_before: before,
            balance_after: before + amount,
            status: EntryStatus::Completed,
            related_entity_id: None,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    fn commit(ledger: &TransactionLedger, mut entry: LedgerEntry) -> LedgerEntry {
        ledger.stamp(&mut entry).unwrap();
        ledger.append(entry.clone()).unwrap();
        entry
    }

    #[test]
    fn test_append_chains_sequence_and_hash() {
        let ledger = TransactionLedger::new();
        let wallet = WalletKey::new("P1", "ACME");

        let e1 = commit(&ledger, draft(&wallet, EntryType::Deposit, dec!(100), dec!(0)));
        let e2 = commit(&ledger, draft(&wallet, EntryType::BetPlaced, dec!(-40), dec!(100)));

        assert_eq!(e1.sequence, 1);
        assert_eq!(e2.sequence, 2);
        assert_eq!(e1.prev_hash, GENESIS_HASH);
        assert_eq!(e2.prev_hash, e1.hash);
        assert!(ledger.verify().is_ok());
    }

    #[test]
    fn test_stamp_rejects_non_contiguous_balance() {
        let ledger = TransactionLedger::new();
        let wallet = WalletKey::new("P1", "ACME");

        commit(&ledger, draft(&wallet, EntryType::Deposit, dec!(100), dec!(0)));

        // Claims to start from 90 while the tail says 100
        let mut stale = draft(&wallet, EntryType::BetPlaced, dec!(-40), dec!(90));
        let result = ledger.stamp(&mut stale);
        assert!(matches!(result, Err(LedgerError::NonContiguousEntry { .. })));
    }

    #[test]
    fn test_stamp_rejects_broken_balance_invariant() {
        let ledger = TransactionLedger::new();
        let wallet = WalletKey::new("P1", "ACME");

        let mut bad = draft(&wallet, EntryType::Deposit, dec!(100), dec!(0));
        bad.balance_after = dec!(99);
        let result = ledger.stamp(&mut bad);
        assert!(matches!(result, Err(LedgerError::BalanceInvariant { .. })));
    }

    #[test]
    fn test_wallets_chain_independently() {
        let ledger = TransactionLedger::new();
        let p1 = WalletKey::new("P1", "ACME");
        let p2 = WalletKey::new("P2", "ACME");

        commit(&ledger, draft(&p1, EntryType::Deposit, dec!(100), dec!(0)));
        commit(&ledger, draft(&p2, EntryType::Deposit, dec!(30), dec!(0)));
        commit(&ledger, draft(&p1, EntryType::BetPlaced, dec!(-50), dec!(100)));

        assert_eq!(ledger.tail_balance(&p1), dec!(50));
        assert_eq!(ledger.tail_balance(&p2), dec!(30));
        assert_eq!(ledger.entries_for_wallet(&p1).len(), 2);
        assert_eq!(ledger.entries_for_wallet(&p2).len(), 1);
    }

    #[test]
    fn test_sum_applied_includes_reversed() {
        let ledger = TransactionLedger::new();
        let wallet = WalletKey::new("P1", "ACME");

        let credit = commit(&ledger, draft(&wallet, EntryType::Deposit, dec!(100), dec!(0)));
        commit(&ledger, draft(&wallet, EntryType::Adjustment, dec!(-100), dec!(100)));
        ledger.mark_reversed(&credit.id).unwrap();

        // +100 (reversed, still applied) - 100 (compensating) = 0
        assert_eq!(ledger.sum_applied(&wallet), dec!(0));
    }

    #[test]
    fn test_mark_reversed_requires_completed() {
        let ledger = TransactionLedger::new();
        let wallet = WalletKey::new("P1", "ACME");

        let entry = commit(&ledger, draft(&wallet, EntryType::Deposit, dec!(100), dec!(0)));
        ledger.mark_reversed(&entry.id).unwrap();

        let again = ledger.mark_reversed(&entry.id);
        assert!(matches!(again, Err(LedgerError::NotReversible { .. })));

        let missing = ledger.mark_reversed("nope");
        assert!(matches!(missing, Err(LedgerError::EntryNotFound(_))));
    }

    #[test]
    fn test_load_replayed_rebuilds_tails() {
        let ledger = TransactionLedger::new();
        let wallet = WalletKey::new("P1", "ACME");

        commit(&ledger, draft(&wallet, EntryType::Deposit, dec!(100), dec!(0)));
        commit(&ledger, draft(&wallet, EntryType::BetPlaced, dec!(-25), dec!(100)));
        let history = ledger.all();

        let rebuilt = TransactionLedger::new();
        rebuilt.load_replayed(history).unwrap();

        assert_eq!(rebuilt.last_sequence(), 2);
        assert_eq!(rebuilt.tail_balance(&wallet), dec!(75));
        assert!(rebuilt.verify().is_ok());
    }

    #[test]
    fn test_load_replayed_rejects_tampered_history() {
        let ledger = TransactionLedger::new();
        let wallet = WalletKey::new("P1", "ACME");

        commit(&ledger, draft(&wallet, EntryType::Deposit, dec!(100), dec!(0)));
        let mut history = ledger.all();
        history[0].amount = dec!(1_000_000);

        let rebuilt = TransactionLedger::new();
        assert!(rebuilt.load_replayed(history).is_err());
    }
}
