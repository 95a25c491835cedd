//! Outbox relay delivery through the event channel

use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;
use wallet_ledger::requests::{DepositRequest, WithdrawRequest};
use wallet_ledger::resilience::DegradedMode;
use wallet_ledger::testing::TestStack;

fn deposit(wallet_id: Uuid, reference_id: &str) -> DepositRequest {
    DepositRequest {
        wallet_id,
        amount: dec!(10),
        reference_id: reference_id.to_string(),
        description: None,
    }
}

fn event_types(stack: &TestStack) -> Vec<String> {
    stack
        .channel
        .published()
        .into_iter()
        .map(|published| published.message.event_type)
        .collect()
}

#[tokio::test]
async fn test_every_mutation_stages_one_event() {
    let stack = TestStack::new();
    let wallet = stack.wallet("alice", "USD").await;
    stack.ledger.deposit(deposit(wallet.id, "d1")).await.unwrap();
    stack
        .ledger
        .withdraw(WithdrawRequest {
            wallet_id: wallet.id,
            amount: dec!(3),
            reference_id: "w1".to_string(),
            description: None,
        })
        .await
        .unwrap();
    stack.ledger.freeze_wallet(wallet.id).await.unwrap();

    // Nothing is published on the request path
    assert!(stack.channel.published().is_empty());
    assert_eq!(stack.ledger.pending_events(10).await.unwrap().len(), 4);

    let cycle = stack.relay.run_once().await.unwrap();
    assert_eq!(cycle.published, 4);
    assert_eq!(cycle.deferred, 0);
    assert_eq!(
        event_types(&stack),
        vec!["WALLET_CREATED", "FUNDS_DEPOSITED", "FUNDS_WITHDRAWN", "WALLET_STATUS_CHANGED"]
    );
    assert!(stack.channel.published().iter().all(|p| p.topic == "wallet.events"));
    assert!(stack.ledger.pending_events(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_channel_outage_keeps_events_pending_in_order() {
    let stack = TestStack::new();
    stack.channel.set_available(false);

    let wallet = stack.wallet("alice", "USD").await;
    for n in 0..4 {
        let receipt = stack.ledger.deposit(deposit(wallet.id, &format!("d{n}"))).await;
        assert!(receipt.is_ok());
    }

    let cycle = stack.relay.run_once().await.unwrap();
    assert_eq!(cycle.published, 0);
    assert_eq!(cycle.deferred, 1);
    assert_eq!(cycle.skipped, 4);
    assert!(stack.coordinator.is_active(DegradedMode::EventDegraded));
    assert!(stack.coordinator.validate_write_operation().is_ok());

    // The check fails, so the next pass does not touch the batch
    let attempts = stack.channel.attempts();
    let cycle = stack.relay.run_once().await.unwrap();
    assert!(cycle.channel_unavailable);
    assert_eq!(stack.channel.attempts(), attempts);

    stack.channel.set_available(true);
    let cycle = stack.relay.run_once().await.unwrap();
    assert_eq!(cycle.published, 5);
    assert!(!stack.coordinator.is_active(DegradedMode::EventDegraded));

    let staged: Vec<Uuid> = stack.primary.outbox_records().iter().map(|record| record.id).collect();
    assert_eq!(stack.channel.delivered_ids(), staged);
}

#[tokio::test]
async fn test_repeated_failures_raise_alert() {
    let stack = TestStack::new();
    stack.wallet("alice", "USD").await;
    stack.channel.fail_next(3);

    for _ in 0..2 {
        let cycle = stack.relay.run_once().await.unwrap();
        assert_eq!(cycle.deferred, 1);
        assert_eq!(cycle.alerts, 0);
    }
    let cycle = stack.relay.run_once().await.unwrap();
    assert_eq!(cycle.alerts, 1);

    let alerts = stack.ledger.outbox_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].attempt_count, 3);
    assert!(alerts[0].last_error.is_some());

    let cycle = stack.relay.run_once().await.unwrap();
    assert_eq!(cycle.published, 1);
    assert!(stack.ledger.outbox_alerts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_aggregate_does_not_block_others() {
    let stack = TestStack::new();
    let alice = stack.wallet("alice", "USD").await;
    let bob = stack.wallet("bob", "USD").await;
    stack.ledger.deposit(deposit(alice.id, "d-alice")).await.unwrap();
    stack.ledger.deposit(deposit(bob.id, "d-bob")).await.unwrap();

    stack.channel.fail_next(1);
    let cycle = stack.relay.run_once().await.unwrap();
    assert_eq!(cycle.published, 2);
    assert_eq!(cycle.deferred, 1);
    assert_eq!(cycle.skipped, 1);

    stack.relay.run_once().await.unwrap();
    assert!(stack.ledger.pending_events(10).await.unwrap().is_empty());

    let published = stack.channel.published();
    for aggregate in [alice.id, bob.id] {
        let types: Vec<_> = published
            .iter()
            .filter(|p| p.message.key == aggregate)
            .map(|p| p.message.event_type.as_str())
            .collect();
        assert_eq!(types, vec!["WALLET_CREATED", "FUNDS_DEPOSITED"]);
    }
}

#[tokio::test]
async fn test_spawned_relay_publishes_and_stops() {
    let stack = TestStack::new();
    let (shutdown, rx) = watch::channel(false);
    let handle = stack.relay.clone().spawn(rx);

    stack.wallet("alice", "USD").await;

    let delivered = tokio::time::timeout(Duration::from_secs(2), async {
        while stack.channel.published().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(delivered.is_ok());

    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("relay did not stop")
        .unwrap();
}
