//! Entry requests - what callers hand the engine

use crate::error::EngineError;
use betledger_core::Currency;
use betledger_ledger::{EntryType, WalletKey};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A requested balance mutation.
///
/// `amount` is signed: credits positive, debits negative. The sign must
/// match the entry type's class (`adjustment` accepts either).
#[derive(Debug, Clone)]
pub struct EntryRequest {
    pub wallet: WalletKey,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub currency: Currency,
    pub related_entity_id: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EntryRequest {
    pub fn new(
        wallet: WalletKey,
        entry_type: EntryType,
        amount: Decimal,
        currency: Currency,
    ) -> Self {
        Self {
            wallet,
            entry_type,
            amount,
            currency,
            related_entity_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Attach the bet/voucher/settlement id this movement belongs to
    pub fn related(mut self, id: impl Into<String>) -> Self {
        self.related_entity_id = Some(id.into());
        self
    }

    /// Attach one metadata field
    pub fn meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Reject zero amounts and sign/class mismatches
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.amount.is_zero() || !self.entry_type.sign_matches(self.amount) {
            return Err(EngineError::InvalidAmount {
                entry_type: self.entry_type.to_string(),
                amount: self.amount,
            });
        }
        Ok(())
    }
}
