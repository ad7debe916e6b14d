//! Integration tests for voucher redemption
//!
//! These verify the all-or-nothing redemption contract: exactly-once
//! transitions under concurrency, persistent expiry, and the commission
//! leg landing with the redemption or not at all.

use betledger_core::{Amount, Currency};
use betledger_engine::LedgerEngine;
use betledger_ledger::{EntryType, WalletKey};
use betledger_risk::{RiskConfig, RiskEngine};
use betledger_voucher::{
    BatchSpec, RedemptionProtocol, Voucher, VoucherError, VoucherStatus, VoucherStore,
};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn engine() -> Arc<LedgerEngine> {
    Arc::new(LedgerEngine::new(Arc::new(RiskEngine::new(
        RiskConfig::default(),
    ))))
}

fn protocol() -> (Arc<VoucherStore>, Arc<LedgerEngine>, RedemptionProtocol) {
    let store = Arc::new(VoucherStore::new());
    let engine = engine();
    let protocol = RedemptionProtocol::new(store.clone(), engine.clone());
    (store, engine, protocol)
}

fn voucher_50_usd_10pct() -> Voucher {
    Voucher::new(
        "VCH-AB12",
        "ACME",
        "AGENT7",
        Amount::new(dec!(50)).unwrap(),
        Currency::Usd,
        Utc::now() + Duration::days(30),
        dec!(10),
    )
}

/// 50 USD voucher at 10% commission: wallet 50.00, agent +5.00,
/// status redeemed, two ledger entries.
#[test]
fn test_redeem_with_commission() -> anyhow::Result<()> {
    let (store, engine, protocol) = protocol();
    store.insert(voucher_50_usd_10pct())?;

    let redemption = protocol.redeem("vch-ab12", "P1", "ACME")?;

    assert_eq!(redemption.amount, dec!(50));
    assert_eq!(redemption.currency, Currency::Usd);
    assert_eq!(redemption.new_balance, dec!(50.00));

    let player = engine.wallet(&WalletKey::new("P1", "ACME")).unwrap();
    let agent = engine.wallet(&WalletKey::new("AGENT7", "ACME")).unwrap();
    assert_eq!(player.available.value(), dec!(50.00));
    assert_eq!(agent.available.value(), dec!(5.00));

    let voucher = store.get("VCH-AB12").unwrap();
    assert_eq!(voucher.status, VoucherStatus::Redeemed);
    assert_eq!(voucher.redeemed_by.as_deref(), Some("P1"));
    assert!(voucher.redeemed_at.is_some());
    assert_eq!(voucher.commission_paid, Some(dec!(5.00)));

    let ledger = engine.ledger();
    assert_eq!(ledger.len(), 2);
    let entries = ledger.all();
    assert_eq!(entries[0].entry_type, EntryType::VoucherRedemption);
    assert_eq!(entries[0].amount, dec!(50));
    assert_eq!(entries[0].related_entity_id.as_deref(), Some("VCH-AB12"));
    assert_eq!(entries[1].entry_type, EntryType::Commission);
    assert_eq!(entries[1].amount, dec!(5.00));

    Ok(())
}

/// Zero commission rate pays nothing and writes a single entry.
#[test]
fn test_redeem_without_commission() -> anyhow::Result<()> {
    let (store, engine, protocol) = protocol();
    let mut voucher = voucher_50_usd_10pct();
    voucher.commission_rate = dec!(0);
    store.insert(voucher)?;

    protocol.redeem("VCH-AB12", "P1", "ACME")?;

    assert_eq!(engine.ledger().len(), 1);
    assert!(engine.wallet(&WalletKey::new("AGENT7", "ACME")).is_none());
    assert_eq!(store.get("VCH-AB12").unwrap().commission_paid, None);
    Ok(())
}

/// N concurrent redemptions of one code: exactly one succeeds, exactly
/// one credit lands, the rest see AlreadyRedeemed.
#[test]
fn test_concurrent_redemption_is_exactly_once() {
    let (store, engine, protocol) = protocol();
    store.insert(voucher_50_usd_10pct()).unwrap();
    let protocol = Arc::new(protocol);

    let outcomes: Vec<Result<(), bool>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let protocol = protocol.clone();
                s.spawn(move || {
                    let account = format!("P{}", i);
                    match protocol.redeem("VCH-AB12", &account, "ACME") {
                        Ok(_) => Ok(()),
                        Err(VoucherError::AlreadyRedeemed(_)) => Err(true),
                        Err(_) => Err(false),
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let successes = outcomes.iter().filter(|o| o.is_ok()).count();
    let already_redeemed = outcomes.iter().filter(|o| matches!(o, Err(true))).count();
    assert_eq!(successes, 1);
    assert_eq!(already_redeemed, 7);

    // Exactly one redemption credit and one commission in the ledger
    assert_eq!(engine.ledger().len(), 2);
    assert_eq!(store.get("VCH-AB12").unwrap().status, VoucherStatus::Redeemed);
}

/// Expiry is itself a side effect: the transition survives the failed
/// redemption.
#[test]
fn test_expiry_transition_persists() {
    let (store, engine, protocol) = protocol();
    let mut voucher = voucher_50_usd_10pct();
    voucher.expires_at = Utc::now() - Duration::hours(1);
    store.insert(voucher).unwrap();

    let result = protocol.redeem("VCH-AB12", "P1", "ACME");
    assert!(matches!(result, Err(VoucherError::Expired(_))));

    // The voucher is now terminally expired, and no wallet was touched
    assert_eq!(store.get("VCH-AB12").unwrap().status, VoucherStatus::Expired);
    assert!(engine.ledger().is_empty());
    assert!(engine.wallet(&WalletKey::new("P1", "ACME")).is_none());

    // A later attempt reports expired without re-transitioning
    let again = protocol.redeem("VCH-AB12", "P1", "ACME");
    assert!(matches!(again, Err(VoucherError::Expired(_))));
}

/// Cross-tenant redemption is refused before any state changes.
#[test]
fn test_tenant_mismatch_rejected() {
    let (store, engine, protocol) = protocol();
    store.insert(voucher_50_usd_10pct()).unwrap();

    let result = protocol.redeem("VCH-AB12", "P1", "RIVAL");
    assert!(matches!(result, Err(VoucherError::TenantMismatch { .. })));

    assert_eq!(store.get("VCH-AB12").unwrap().status, VoucherStatus::Unused);
    assert!(engine.ledger().is_empty());
}

#[test]
fn test_unknown_and_cancelled_codes() {
    let (store, _engine, protocol) = protocol();
    store.insert(voucher_50_usd_10pct()).unwrap();

    let missing = protocol.redeem("VCH-NOPE", "P1", "ACME");
    assert!(matches!(missing, Err(VoucherError::NotFound(_))));

    store.cancel("VCH-AB12").unwrap();
    let cancelled = protocol.redeem("VCH-AB12", "P1", "ACME");
    assert!(matches!(cancelled, Err(VoucherError::Cancelled(_))));
}

/// Batch-issued vouchers flow through the same protocol.
#[test]
fn test_batch_issue_and_redeem() -> anyhow::Result<()> {
    let (store, engine, protocol) = protocol();

    let codes = store.create_batch(&BatchSpec {
        tenant_id: "ACME".to_string(),
        agent_id: "AGENT7".to_string(),
        amount: Amount::new(dec!(20)).unwrap(),
        currency: Currency::Usd,
        count: 5,
        expires_at: Utc::now() + Duration::days(7),
        commission_rate: dec!(5),
    });

    for (i, code) in codes.iter().enumerate() {
        protocol.redeem(code, &format!("P{}", i), "ACME")?;
    }

    assert_eq!(
        store
            .by_agent("AGENT7", Some(VoucherStatus::Redeemed))
            .len(),
        5
    );
    // 5 redemptions of 20 plus 5 commissions of 1
    let agent = engine.wallet(&WalletKey::new("AGENT7", "ACME")).unwrap();
    assert_eq!(agent.available.value(), dec!(5.00));
    assert_eq!(engine.ledger().len(), 10);
    Ok(())
}
