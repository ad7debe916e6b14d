//! Ledger entries - immutable records of balance-affecting events

use crate::error::LedgerError;
use crate::wallet::WalletKey;
use betledger_core::Currency;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumString};

/// What kind of balance movement an entry records.
///
/// Debit-classified types carry a negative signed amount and are subject
/// to the available-balance check; everything except `adjustment` is
/// otherwise credit-classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Deposit,
    Withdrawal,
    BetPlaced,
    BetWon,
    BetVoid,
    VoucherRedemption,
    Commission,
    Bonus,
    Fee,
    Adjustment,
    TransferIn,
    TransferOut,
}

impl EntryType {
    /// Debit-classified types remove value from the wallet
    pub fn is_debit(&self) -> bool {
        matches!(
            self,
            EntryType::Withdrawal | EntryType::BetPlaced | EntryType::Fee | EntryType::TransferOut
        )
    }

    /// Whether `amount`'s sign is consistent with this type's class.
    ///
    /// `adjustment` may carry either sign; debits must be negative,
    /// credits positive.
    pub fn sign_matches(&self, amount: Decimal) -> bool {
        match self {
            EntryType::Adjustment => true,
            t if t.is_debit() => amount < Decimal::ZERO,
            _ => amount > Decimal::ZERO,
        }
    }
}

/// Entry lifecycle status.
///
/// `reversed` annotates an entry superseded by a compensating entry; its
/// balance effect remains applied (the compensating entry backs it out).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
}

impl EntryStatus {
    /// Whether the entry's amount reached the wallet.
    ///
    /// Reconciliation sums exactly these entries.
    pub fn affects_balance(&self) -> bool {
        matches!(self, EntryStatus::Completed | EntryStatus::Reversed)
    }
}

/// Immutable record of one balance-affecting event.
///
/// # Invariants
/// - `balance_after == balance_before + amount`
/// - within a wallet, `balance_before` equals the previous entry's
///   `balance_after` (balances snapshot the wallet's custodial total,
///   `available + locked`)
/// - `sequence` is globally strictly increasing and `prev_hash`/`hash`
///   form a SHA-256 chain over the whole ledger
///
/// Entries are never edited after commit; the single exception is the
/// `status` flip to `reversed`, which the hash deliberately excludes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Generated entry id
    pub id: String,

    /// Global position in the ledger, starting at 1
    pub sequence: u64,

    /// Hash of the previous entry (`GENESIS` for the first)
    pub prev_hash: String,

    /// SHA-256 over this entry's financial facts
    pub hash: String,

    pub wallet: WalletKey,

    pub entry_type: EntryType,

    /// Signed movement: positive credits, negative debits
    pub amount: Decimal,

    pub currency: Currency,

    pub balance_before: Decimal,

    pub balance_after: Decimal,

    pub status: EntryStatus,

    /// Bet / voucher / settlement id this entry belongs to
    pub related_entity_id: Option<String>,

    pub metadata: HashMap<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Check `balance_after == balance_before + amount`
    pub fn verify_balance(&self) -> Result<(), LedgerError> {
        if self.balance_before + self.amount != self.balance_after {
            return Err(LedgerError::BalanceInvariant {
                id: self.id.clone(),
                balance_before: self.balance_before,
                amount: self.amount,
                balance_after: self.balance_after,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(amount: Decimal, before: Decimal, after: Decimal) -> LedgerEntry {
        LedgerEntry {
            id: "e-1".to_string(),
            sequence: 1,
            prev_hash: "GENESIS".to_string(),
            hash: String::new(),
            wallet: WalletKey::new("P1", "ACME"),
            entry_type: EntryType::Deposit,
            amount,
            currency: Currency::Usd,
            balance_before: before,
            balance_after: after,
            status: EntryStatus::Completed,
            related_entity_id: None,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_entry_type_debit_classification() {
        assert!(EntryType::Withdrawal.is_debit());
        assert!(EntryType::BetPlaced.is_debit());
        assert!(EntryType::Fee.is_debit());
        assert!(EntryType::TransferOut.is_debit());
        assert!(!EntryType::Deposit.is_debit());
        assert!(!EntryType::BetWon.is_debit());
        assert!(!EntryType::VoucherRedemption.is_debit());
    }

    #[test]
    fn test_sign_matches() {
        assert!(EntryType::Deposit.sign_matches(dec!(10)));
        assert!(!EntryType::Deposit.sign_matches(dec!(-10)));
        assert!(EntryType::BetPlaced.sign_matches(dec!(-10)));
        assert!(!EntryType::BetPlaced.sign_matches(dec!(10)));
        assert!(EntryType::Adjustment.sign_matches(dec!(-10)));
        assert!(EntryType::Adjustment.sign_matches(dec!(10)));
    }

    #[test]
    fn test_entry_type_string_roundtrip() {
        assert_eq!(EntryType::BetPlaced.to_string(), "bet_placed");
        assert_eq!(
            "voucher_redemption".parse::<EntryType>().unwrap(),
            EntryType::VoucherRedemption
        );
    }

    #[test]
    fn test_status_affects_balance() {
        assert!(EntryStatus::Completed.affects_balance());
        assert!(EntryStatus::Reversed.affects_balance());
        assert!(!EntryStatus::Pending.affects_balance());
        assert!(!EntryStatus::Failed.affects_balance());
    }

    #[test]
    fn test_verify_balance() {
        assert!(entry(dec!(50), dec!(0), dec!(50)).verify_balance().is_ok());

        let bad = entry(dec!(50), dec!(0), dec!(49));
        assert!(matches!(
            bad.verify_balance(),
            Err(LedgerError::BalanceInvariant { .. })
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let e = entry(dec!(25.50), dec!(0), dec!(25.50));
        let json = serde_json::to_string(&e).unwrap();
        let parsed: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(e, parsed);
    }
}
