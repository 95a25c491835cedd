//! Degraded modes entered on dependency failure and left on recovery

use chrono::Utc;
use rust_decimal_macros::dec;
use std::time::Duration;
use uuid::Uuid;
use wallet_ledger::adapters::ReadSource;
use wallet_ledger::requests::{CreateWalletRequest, DepositRequest};
use wallet_ledger::resilience::{CircuitState, DegradedMode, HealthLevel};
use wallet_ledger::testing::{FlakyCache, TestStack};
use wallet_ledger::{LedgerError, NullCache};

fn deposit(wallet_id: Uuid, reference_id: &str) -> DepositRequest {
    DepositRequest {
        wallet_id,
        amount: dec!(5),
        reference_id: reference_id.to_string(),
        description: None,
    }
}

#[tokio::test]
async fn test_primary_outage_enters_read_only_but_keeps_reads() {
    let stack = TestStack::with_cache(NullCache::new());
    let wallet = stack.funded_wallet("alice", "USD", dec!(40)).await;

    stack.fail_primary("primary offline");

    let err = stack.ledger.deposit(deposit(wallet.id, "d-outage")).await.unwrap_err();
    assert_eq!(err, LedgerError::ServiceDegraded(DegradedMode::ReadOnly));
    assert!(stack.coordinator.is_active(DegradedMode::ReadOnly));

    let balance = stack.ledger.get_balance(wallet.id).await.unwrap();
    assert_eq!(balance.balance, dec!(40));
    assert_eq!(balance.source, ReadSource::Replica);

    // Rejected before reaching the store while the mode stays active
    let err = stack.ledger.deposit(deposit(wallet.id, "d-outage-2")).await.unwrap_err();
    assert_eq!(err, LedgerError::ServiceDegraded(DegradedMode::ReadOnly));
    assert_eq!(stack.primary.entries().len(), 1);

    let status = stack.ledger.get_degradation_status();
    assert!(status.is_read_only());
    assert!(status.open_dependencies.contains(&"store_primary".to_string()));
    assert!(status.health_score < 100);
}

#[tokio::test]
async fn test_read_only_serves_every_read() {
    let stack = TestStack::with_cache(NullCache::new());
    let wallet = stack.funded_wallet("alice", "USD", dec!(40)).await;
    stack.fail_primary("primary offline");
    stack.coordinator.enter_read_only_mode("primary offline");

    let balance = stack.ledger.get_balance(wallet.id).await.unwrap();
    assert_eq!(balance.balance, dec!(40));

    let history = stack.ledger.get_historical_balance(wallet.id, Utc::now()).await.unwrap();
    assert_eq!(history.balance, dec!(40));
    assert_eq!(history.entries_applied, 1);

    let wallets = stack.ledger.list_wallets("alice").await.unwrap();
    assert_eq!(wallets.len(), 1);

    let rejected = LedgerError::ServiceDegraded(DegradedMode::ReadOnly);
    assert_eq!(stack.ledger.deposit(deposit(wallet.id, "d-ro")).await.unwrap_err(), rejected);
    assert_eq!(stack.ledger.freeze_wallet(wallet.id).await.unwrap_err(), rejected);
    assert_eq!(
        stack
            .ledger
            .create_wallet(CreateWalletRequest {
                user_id: "alice".to_string(),
                currency: "EUR".to_string(),
            })
            .await
            .unwrap_err(),
        rejected
    );
}

#[tokio::test]
async fn test_read_only_exits_once_primary_answers() {
    let stack = TestStack::with_cache(NullCache::new());
    let wallet = stack.funded_wallet("alice", "USD", dec!(40)).await;
    stack.fail_primary("primary offline");
    assert!(stack.ledger.deposit(deposit(wallet.id, "d-outage")).await.is_err());

    // Still down: the check keeps the service read-only
    assert!(stack.monitor.run_once().await.exited.is_empty());

    stack.primary.set_available(true);
    tokio::time::sleep(Duration::from_millis(60)).await;

    let report = stack.monitor.run_once().await;
    assert_eq!(report.exited, vec![DegradedMode::ReadOnly]);
    assert_eq!(stack.store.primary_breaker().state(), CircuitState::Closed);

    let receipt = stack.ledger.deposit(deposit(wallet.id, "d-recovered")).await.unwrap();
    assert_eq!(receipt.balance, dec!(45));
}

#[tokio::test]
async fn test_breaker_opens_at_failure_ratio() {
    let stack = TestStack::new();
    for _ in 0..5 {
        assert!(stack.store.check_primary().await);
    }

    stack.primary.set_available(false);
    for _ in 0..4 {
        assert!(!stack.store.check_primary().await);
    }
    assert_eq!(stack.store.primary_breaker().state(), CircuitState::Closed);

    assert!(!stack.store.check_primary().await);
    assert_eq!(stack.store.primary_breaker().state(), CircuitState::Open);
}

#[tokio::test]
async fn test_cache_outage_bypasses_cache() {
    let stack = TestStack::with_cache(FlakyCache::new());
    let wallet = stack.funded_wallet("alice", "USD", dec!(40)).await;

    stack.ledger.get_balance(wallet.id).await.unwrap();
    assert_eq!(stack.ledger.get_balance(wallet.id).await.unwrap().source, ReadSource::Cache);

    stack.cache.set_available(false);
    let balance = stack.ledger.get_balance(wallet.id).await.unwrap();
    assert_eq!(balance.source, ReadSource::Replica);
    assert_eq!(balance.balance, dec!(40));
    assert!(stack.coordinator.is_active(DegradedMode::CacheBypass));

    // Bypassed reads leave the cache alone
    let calls = stack.cache.calls();
    stack.ledger.get_balance(wallet.id).await.unwrap();
    assert_eq!(stack.cache.calls(), calls);

    let receipt = stack.ledger.deposit(deposit(wallet.id, "d-bypass")).await.unwrap();
    assert_eq!(receipt.balance, dec!(45));
    assert!(stack.coordinator.validate_write_operation().is_ok());

    stack.cache.set_available(true);
    let report = stack.monitor.run_once().await;
    assert_eq!(report.exited, vec![DegradedMode::CacheBypass]);
    assert!(stack.cache.is_empty());

    let balance = stack.ledger.get_balance(wallet.id).await.unwrap();
    assert_eq!(balance.balance, dec!(45));
    assert_ne!(balance.source, ReadSource::Cache);
    assert_eq!(stack.ledger.get_balance(wallet.id).await.unwrap().source, ReadSource::Cache);
}

#[tokio::test]
async fn test_lock_contention_clears_when_quiet() {
    let stack = TestStack::new();
    stack.coordinator.record_optimistic_lock_contention("hot wallet");

    let status = stack.ledger.get_degradation_status();
    assert_eq!(status.active_modes, vec![DegradedMode::LockContentionHigh]);
    assert!(stack.coordinator.validate_write_operation().is_ok());

    let report = stack.monitor.run_once().await;
    assert_eq!(report.exited, vec![DegradedMode::LockContentionHigh]);
    assert_eq!(stack.ledger.get_degradation_status().health_level, HealthLevel::Healthy);
}

#[tokio::test]
async fn test_healthy_stack_reports_full_score() {
    let stack = TestStack::new();
    stack.wallet("alice", "USD").await;

    let status = stack.ledger.get_degradation_status();
    assert_eq!(status.health_score, 100);
    assert!(status.active_modes.is_empty());
    assert!(status.open_dependencies.is_empty());
    assert_eq!(status.breakers.len(), 4);
    assert!(stack.monitor.run_once().await.exited.is_empty());
}
