//! Ledger operations through the façade, on healthy dependencies

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use uuid::Uuid;
use wallet_ledger::LedgerError;
use wallet_ledger::models::{EntryType, WalletStatus};
use wallet_ledger::requests::{CreateWalletRequest, DepositRequest, TransferRequest, WithdrawRequest};
use wallet_ledger::testing::TestStack;

fn deposit(wallet_id: Uuid, amount: Decimal, reference_id: &str) -> DepositRequest {
    DepositRequest {
        wallet_id,
        amount,
        reference_id: reference_id.to_string(),
        description: None,
    }
}

fn withdraw(wallet_id: Uuid, amount: Decimal, reference_id: &str) -> WithdrawRequest {
    WithdrawRequest {
        wallet_id,
        amount,
        reference_id: reference_id.to_string(),
        description: None,
    }
}

fn transfer(source: Uuid, destination: Uuid, amount: Decimal, reference_id: &str) -> TransferRequest {
    TransferRequest {
        source_wallet_id: source,
        destination_wallet_id: destination,
        amount,
        reference_id: reference_id.to_string(),
        description: Some("rent".to_string()),
    }
}

#[tokio::test]
async fn test_deposit_withdraw_transfer_balances() {
    let stack = TestStack::new();
    let alice = stack.wallet("alice", "USD").await;
    let bob = stack.wallet("bob", "USD").await;

    let d1 = stack.ledger.deposit(deposit(alice.id, dec!(100.00), "d1")).await.unwrap();
    assert_eq!(d1.balance, dec!(100.00));
    assert!(!d1.replayed);

    let w1 = stack.ledger.withdraw(withdraw(alice.id, dec!(40.00), "w1")).await.unwrap();
    assert_eq!(w1.balance, dec!(60.00));

    let t1 = stack
        .ledger
        .transfer(transfer(alice.id, bob.id, dec!(20.00), "t1"))
        .await
        .unwrap();
    assert_eq!(t1.balance, dec!(40.00));
    assert_eq!(t1.destination_balance, Some(dec!(20.00)));
    assert_eq!(t1.entry.entry_type, EntryType::Transfer);
    assert_eq!(t1.entry.counterparty_wallet_id, Some(bob.id));

    assert_eq!(stack.ledger.get_balance(alice.id).await.unwrap().balance, dec!(40.00));
    assert_eq!(stack.ledger.get_balance(bob.id).await.unwrap().balance, dec!(20.00));

    // One entry per money movement, one outbox record per mutation
    assert_eq!(stack.primary.entries().len(), 3);
    assert_eq!(stack.primary.outbox_records().len(), 5);
}

#[tokio::test]
async fn test_replayed_reference_applies_once() {
    let stack = TestStack::new();
    let wallet = stack.wallet("alice", "USD").await;

    let first = stack.ledger.deposit(deposit(wallet.id, dec!(100), "d1")).await.unwrap();
    let again = stack.ledger.deposit(deposit(wallet.id, dec!(100.00), "d1")).await.unwrap();

    assert!(again.replayed);
    assert_eq!(again.entry.id, first.entry.id);
    assert_eq!(again.balance, dec!(100));
    assert_eq!(stack.primary.entries().len(), 1);
    // Wallet creation plus the single deposit
    assert_eq!(stack.primary.outbox_records().len(), 2);
}

#[tokio::test]
async fn test_reference_reused_for_other_operation_is_rejected() {
    let stack = TestStack::new();
    let wallet = stack.wallet("alice", "USD").await;
    stack.ledger.deposit(deposit(wallet.id, dec!(100), "d1")).await.unwrap();

    let err = stack.ledger.deposit(deposit(wallet.id, dec!(5), "d1")).await.unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateReference(ref reference) if reference == "d1"));

    let err = stack.ledger.withdraw(withdraw(wallet.id, dec!(100), "d1")).await.unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateReference(_)));

    assert_eq!(stack.ledger.get_balance(wallet.id).await.unwrap().balance, dec!(100));
}

#[tokio::test]
async fn test_withdrawal_never_overdraws() {
    let stack = TestStack::new();
    let wallet = stack.funded_wallet("alice", "USD", dec!(10)).await;

    let err = stack.ledger.withdraw(withdraw(wallet.id, dec!(10.01), "w1")).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

    let exact = stack.ledger.withdraw(withdraw(wallet.id, dec!(10), "w2")).await.unwrap();
    assert_eq!(exact.balance, Decimal::ZERO);
    assert_eq!(stack.primary.entries().len(), 2);
}

#[tokio::test]
async fn test_concurrent_withdrawals_keep_balance_non_negative() {
    let stack = TestStack::new();
    let wallet = stack.funded_wallet("alice", "USD", dec!(100)).await;

    let (a, b, c) = tokio::join!(
        stack.ledger.withdraw(withdraw(wallet.id, dec!(40), "w-a")),
        stack.ledger.withdraw(withdraw(wallet.id, dec!(40), "w-b")),
        stack.ledger.withdraw(withdraw(wallet.id, dec!(40), "w-c")),
    );
    let succeeded = [a, b, c].into_iter().filter(Result::is_ok).count();
    assert!(succeeded <= 2);

    let balance = stack.ledger.get_balance(wallet.id).await.unwrap().balance;
    assert!(balance >= Decimal::ZERO);
    assert_eq!(balance, dec!(100) - dec!(40) * Decimal::from(succeeded));
}

#[tokio::test]
async fn test_credit_past_max_balance_is_rejected() {
    let stack = TestStack::new();
    let full = stack.funded_wallet("alice", "USD", Decimal::MAX).await;
    let donor = stack.funded_wallet("bob", "USD", dec!(1)).await;

    let err = stack.ledger.deposit(deposit(full.id, dec!(1), "d-over")).await.unwrap_err();
    assert!(matches!(err, LedgerError::BalanceOverflow { wallet_id, .. } if wallet_id == full.id));

    let err = stack
        .ledger
        .transfer(transfer(donor.id, full.id, dec!(1), "t-over"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::BalanceOverflow { .. }));

    assert_eq!(stack.ledger.get_balance(full.id).await.unwrap().balance, Decimal::MAX);
    assert_eq!(stack.ledger.get_balance(donor.id).await.unwrap().balance, dec!(1));
    assert_eq!(stack.primary.entries().len(), 2);

    let history = stack.ledger.get_historical_balance(full.id, Utc::now()).await.unwrap();
    assert_eq!(history.balance, Decimal::MAX);
}

#[tokio::test]
async fn test_non_positive_amounts_are_rejected() {
    let stack = TestStack::new();
    let wallet = stack.wallet("alice", "USD").await;

    for amount in [Decimal::ZERO, dec!(-1)] {
        let err = stack.ledger.deposit(deposit(wallet.id, amount, "bad")).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }
    assert!(stack.primary.entries().is_empty());
}

#[tokio::test]
async fn test_invalid_transfers_are_rejected() {
    let stack = TestStack::new();
    let usd = stack.funded_wallet("alice", "USD", dec!(50)).await;
    let eur = stack.wallet("bob", "EUR").await;

    let same = stack.ledger.transfer(transfer(usd.id, usd.id, dec!(1), "t-same")).await;
    assert!(matches!(same, Err(LedgerError::InvalidTransfer(_))));

    let cross = stack.ledger.transfer(transfer(usd.id, eur.id, dec!(1), "t-cross")).await;
    assert!(matches!(cross, Err(LedgerError::InvalidTransfer(_))));

    let missing = stack
        .ledger
        .transfer(transfer(usd.id, Uuid::new_v4(), dec!(1), "t-missing"))
        .await;
    assert!(matches!(missing, Err(LedgerError::WalletNotFound(_))));

    assert_eq!(stack.ledger.get_balance(usd.id).await.unwrap().balance, dec!(50));
}

#[tokio::test]
async fn test_one_wallet_per_user_and_currency() {
    let stack = TestStack::new();
    stack.wallet("alice", "usd").await;

    let err = stack
        .ledger
        .create_wallet(CreateWalletRequest {
            user_id: "alice".to_string(),
            currency: "USD".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::WalletAlreadyExists { .. }));

    let invalid = stack
        .ledger
        .create_wallet(CreateWalletRequest {
            user_id: "alice".to_string(),
            currency: "DOLLARS".to_string(),
        })
        .await;
    assert!(matches!(invalid, Err(LedgerError::InvalidCurrency(_))));

    stack.wallet("alice", "EUR").await;
    assert_eq!(stack.ledger.list_wallets("alice").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_frozen_wallet_rejects_money_movement() {
    let stack = TestStack::new();
    let wallet = stack.funded_wallet("alice", "USD", dec!(10)).await;

    let frozen = stack.ledger.freeze_wallet(wallet.id).await.unwrap();
    assert_eq!(frozen.status, WalletStatus::Frozen);

    let err = stack.ledger.deposit(deposit(wallet.id, dec!(1), "d-frozen")).await.unwrap_err();
    assert!(matches!(err, LedgerError::WalletInactive { .. }));

    stack.ledger.unfreeze_wallet(wallet.id).await.unwrap();
    stack.ledger.deposit(deposit(wallet.id, dec!(1), "d-active")).await.unwrap();

    let err = stack.ledger.close_wallet(wallet.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidStatusTransition { .. }));
}

#[tokio::test]
async fn test_historical_balance_replays_entries() {
    let stack = TestStack::new();
    let wallet = stack.wallet("alice", "USD").await;

    stack.ledger.deposit(deposit(wallet.id, dec!(100), "d1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let between = Utc::now();
    tokio::time::sleep(Duration::from_millis(5)).await;
    stack.ledger.withdraw(withdraw(wallet.id, dec!(30), "w1")).await.unwrap();

    let then = stack.ledger.get_historical_balance(wallet.id, between).await.unwrap();
    assert_eq!(then.balance, dec!(100));
    assert_eq!(then.entries_applied, 1);

    let now = stack.ledger.get_historical_balance(wallet.id, Utc::now()).await.unwrap();
    assert_eq!(now.balance, dec!(70));
    assert_eq!(now.balance, stack.ledger.get_balance(wallet.id).await.unwrap().balance);
}

#[tokio::test]
async fn test_unknown_wallet_is_not_found() {
    let stack = TestStack::new();
    let id = Uuid::new_v4();

    assert!(matches!(stack.ledger.get_balance(id).await, Err(LedgerError::WalletNotFound(_))));
    assert!(matches!(
        stack.ledger.deposit(deposit(id, dec!(1), "d1")).await,
        Err(LedgerError::WalletNotFound(_))
    ));
}
