//! Hash chain utilities for ledger integrity

use crate::entry::LedgerEntry;
use sha2::{Digest, Sha256};

/// Sentinel `prev_hash` of the first entry
pub const GENESIS_HASH: &str = "GENESIS";

/// Calculate the SHA-256 hash of an entry's financial facts.
///
/// `status` is excluded: it is the one field a reversal may later flip,
/// and a reversal must not invalidate the chain. Everything that moves
/// money is covered.
pub fn entry_hash(entry: &LedgerEntry) -> String {
    let mut hasher = Sha256::new();

    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(entry.prev_hash.as_bytes());
    hasher.update(entry.id.as_bytes());
    hasher.update(entry.wallet.to_string().as_bytes());
    hasher.update(entry.entry_type.to_string().as_bytes());
    hasher.update(entry.amount.to_string().as_bytes());
    hasher.update(entry.currency.code().as_bytes());
    hasher.update(entry.balance_before.to_string().as_bytes());
    hasher.update(entry.balance_after.to_string().as_bytes());
    hasher.update(entry.created_at.to_rfc3339().as_bytes());

    if let Some(ref related) = entry.related_entity_id {
        hasher.update(related.as_bytes());
    }

    // Metadata keys sorted for determinism
    let mut keys: Vec<_> = entry.metadata.keys().collect();
    keys.sort();
    for key in keys {
        hasher.update(key.as_bytes());
        if let Some(value) = entry.metadata.get(key) {
            hasher.update(value.to_string().as_bytes());
        }
    }

    hex::encode(hasher.finalize())
}

/// Verify hash-chain integrity over a full ledger history
pub fn verify_chain(entries: &[LedgerEntry]) -> Result<(), ChainError> {
    let mut prev_hash = GENESIS_HASH.to_string();

    for (i, entry) in entries.iter().enumerate() {
        if entry.prev_hash != prev_hash {
            return Err(ChainError::BrokenLink {
                sequence: entry.sequence,
                expected: prev_hash,
                actual: entry.prev_hash.clone(),
            });
        }

        let calculated = entry_hash(entry);
        if entry.hash != calculated {
            return Err(ChainError::InvalidHash {
                sequence: entry.sequence,
                expected: calculated,
                actual: entry.hash.clone(),
            });
        }

        let expected_seq = if i == 0 { entry.sequence } else { entries[i - 1].sequence + 1 };
        if entry.sequence != expected_seq {
            return Err(ChainError::InvalidSequence {
                expected: expected_seq,
                actual: entry.sequence,
            });
        }

        prev_hash = entry.hash.clone();
    }

    Ok(())
}

/// Errors in hash chain verification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("Broken link at seq {sequence}: expected prev_hash '{expected}', got '{actual}'")]
    BrokenLink {
        sequence: u64,
        expected: String,
        actual: String,
    },

    #[error("Invalid hash at seq {sequence}: expected '{expected}', got '{actual}'")]
    InvalidHash {
        sequence: u64,
        expected: String,
        actual: String,
    },

    #[error("Invalid sequence: expected {expected}, got {actual}")]
    InvalidSequence { expected: u64, actual: u64 },
}
