//! Voucher store - per-code critical sections and batch issuance

use crate::error::VoucherError;
use crate::voucher::{normalize_code, Voucher, VoucherStatus};
use betledger_core::{Amount, Currency};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Parameters for one issuance batch
#[derive(Debug, Clone)]
pub struct BatchSpec {
    pub tenant_id: String,
    pub agent_id: String,
    pub amount: Amount,
    pub currency: Currency,
    pub count: usize,
    pub expires_at: DateTime<Utc>,
    pub commission_rate: Decimal,
}

/// Voucher map keyed by normalized code.
///
/// Each voucher sits behind its own mutex; the redemption protocol holds
/// that mutex across the status check, the wallet credit, and the status
/// transition, so two racing redemptions of one code serialize.
#[derive(Default)]
pub struct VoucherStore {
    vouchers: RwLock<HashMap<String, Arc<Mutex<Voucher>>>>,
}

impl VoucherStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one voucher; the code must be unique
    pub fn insert(&self, voucher: Voucher) -> Result<(), VoucherError> {
        let mut vouchers = self.vouchers.write();
        if vouchers.contains_key(&voucher.code) {
            return Err(VoucherError::DuplicateCode(voucher.code));
        }
        vouchers.insert(voucher.code.clone(), Arc::new(Mutex::new(voucher)));
        Ok(())
    }

    /// Issue a batch of vouchers with generated codes, returning them
    pub fn create_batch(&self, spec: &BatchSpec) -> Vec<String> {
        let mut codes = Vec::with_capacity(spec.count);
        while codes.len() < spec.count {
            let code = generate_code();
            let voucher = Voucher::new(
                &code,
                &spec.tenant_id,
                &spec.agent_id,
                spec.amount,
                spec.currency.clone(),
                spec.expires_at,
                spec.commission_rate,
            );
            // Collisions just roll a new code
            if self.insert(voucher).is_ok() {
                codes.push(code);
            }
        }
        tracing::info!(
            tenant = %spec.tenant_id,
            agent = %spec.agent_id,
            count = codes.len(),
            "voucher batch issued"
        );
        codes
    }

    /// Snapshot a voucher by code
    pub fn get(&self, code: &str) -> Option<Voucher> {
        let code = normalize_code(code);
        self.vouchers.read().get(&code).map(|v| v.lock().clone())
    }

    /// The lockable cell for a code (redemption critical section)
    pub(crate) fn cell(&self, code: &str) -> Option<Arc<Mutex<Voucher>>> {
        self.vouchers.read().get(code).cloned()
    }

    /// Cancel an unused voucher
    pub fn cancel(&self, code: &str) -> Result<Voucher, VoucherError> {
        let code = normalize_code(code);
        let cell = self
            .cell(&code)
            .ok_or_else(|| VoucherError::NotFound(code.clone()))?;
        let mut voucher = cell.lock();

        if voucher.status != VoucherStatus::Unused {
            return Err(VoucherError::NotCancellable {
                code,
                status: voucher.status.to_string(),
            });
        }

        voucher.status = VoucherStatus::Cancelled;
        Ok(voucher.clone())
    }

    /// All vouchers issued by an agent, optionally filtered by status
    pub fn by_agent(&self, agent_id: &str, status: Option<VoucherStatus>) -> Vec<Voucher> {
        let agent_id = agent_id.to_uppercase();
        self.vouchers
            .read()
            .values()
            .map(|v| v.lock().clone())
            .filter(|v| v.agent_id == agent_id && status.map_or(true, |s| v.status == s))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.vouchers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vouchers.read().is_empty()
    }
}

/// `VCH-` plus 8 random alphanumerics, uppercased
fn generate_code() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("VCH-{}", suffix.to_uppercase())
}
