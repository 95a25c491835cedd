//! SeaORM store against an in-memory SQLite database

use chrono::Utc;
use rust_decimal_macros::dec;
use wallet_ledger::config::DatabaseConfig;
use wallet_ledger::database::{self, SeaOrmLedgerStore};
use wallet_ledger::models::{EntryType, LedgerEntry, LedgerEvent, OutboxRecord, Wallet};
use wallet_ledger::store::{LedgerStore, StoreError, UnitOfWork};

async fn store() -> SeaOrmLedgerStore {
    let db = database::connect("sqlite::memory:", &DatabaseConfig::default(), true)
        .await
        .expect("sqlite connection");
    SeaOrmLedgerStore::new(db)
}

fn created(wallet: &Wallet) -> UnitOfWork {
    let event = LedgerEvent::WalletCreated {
        wallet_id: wallet.id,
        user_id: wallet.user_id.clone(),
        currency: wallet.currency.clone(),
        occurred_at: wallet.created_at,
    };
    UnitOfWork::new(OutboxRecord::stage(&event).unwrap()).insert_wallet(wallet.clone())
}

fn deposited(wallet: &Wallet, reference_id: &str) -> (Wallet, UnitOfWork) {
    let now = Utc::now();
    let next = wallet.credited(dec!(25.50), now).unwrap();
    let entry = LedgerEntry::new(EntryType::Deposit, wallet.id, None, dec!(25.50), reference_id.to_string(), None, now);
    let event = LedgerEvent::FundsDeposited {
        wallet_id: wallet.id,
        entry_id: entry.id,
        amount: entry.amount,
        balance: next.balance,
        reference_id: entry.reference_id.clone(),
        occurred_at: now,
    };
    let unit = UnitOfWork::new(OutboxRecord::stage(&event).unwrap())
        .update_wallet(next.clone())
        .with_entry(entry);
    (next, unit)
}

#[tokio::test]
async fn test_commit_round_trips_wallet_entry_and_outbox() {
    let store = store().await;
    let wallet = Wallet::open("alice", "USD".parse().unwrap(), Utc::now());
    store.commit(&created(&wallet)).await.unwrap();

    let (next, unit) = deposited(&wallet, "d1");
    store.commit(&unit).await.unwrap();

    let read = store.read_wallet(wallet.id).await.unwrap().unwrap();
    assert_eq!(read.balance, dec!(25.50));
    assert_eq!(read.version, next.version);
    assert_eq!(
        store.find_wallet("alice", &wallet.currency).await.unwrap().map(|w| w.id),
        Some(wallet.id)
    );

    let entry = store.find_entry_by_reference("d1").await.unwrap().unwrap();
    assert_eq!(entry.entry_type, EntryType::Deposit);
    assert_eq!(store.entries_for_wallet(wallet.id, Utc::now()).await.unwrap().len(), 1);

    let pending = store.pending_outbox(10).await.unwrap();
    assert_eq!(
        pending.iter().map(|r| r.event_type.as_str()).collect::<Vec<_>>(),
        vec!["WALLET_CREATED", "FUNDS_DEPOSITED"]
    );
    assert_eq!(store.count_pending_outbox().await.unwrap(), 2);
}

#[tokio::test]
async fn test_stale_version_rolls_back_whole_unit() {
    let store = store().await;
    let wallet = Wallet::open("alice", "USD".parse().unwrap(), Utc::now());
    store.commit(&created(&wallet)).await.unwrap();

    let (_, first) = deposited(&wallet, "d1");
    let (_, stale) = deposited(&wallet, "d2");
    store.commit(&first).await.unwrap();

    let err = store.commit(&stale).await.unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { .. }));
    assert!(!err.is_technical());

    assert!(store.find_entry_by_reference("d2").await.unwrap().is_none());
    assert_eq!(store.count_pending_outbox().await.unwrap(), 2);
}

#[tokio::test]
async fn test_unique_constraints_map_to_domain_errors() {
    let store = store().await;
    let wallet = Wallet::open("alice", "USD".parse().unwrap(), Utc::now());
    store.commit(&created(&wallet)).await.unwrap();

    let twin = Wallet::open("alice", "USD".parse().unwrap(), Utc::now());
    assert!(matches!(
        store.commit(&created(&twin)).await,
        Err(StoreError::WalletExists { .. })
    ));

    let (next, unit) = deposited(&wallet, "d1");
    store.commit(&unit).await.unwrap();
    let (_, reused) = deposited(&next, "d1");
    assert!(matches!(
        store.commit(&reused).await,
        Err(StoreError::DuplicateReference(ref reference)) if reference == "d1"
    ));
}

#[tokio::test]
async fn test_publish_bookkeeping() {
    let store = store().await;
    let wallet = Wallet::open("alice", "USD".parse().unwrap(), Utc::now());
    let unit = created(&wallet);
    let id = unit.outbox.id;
    store.commit(&unit).await.unwrap();

    assert_eq!(store.record_publish_failure(id, "broker offline").await.unwrap(), 1);
    assert_eq!(store.record_publish_failure(id, "broker offline").await.unwrap(), 2);

    let stalled = store.stalled_outbox(2, 10).await.unwrap();
    assert_eq!(stalled.len(), 1);
    assert_eq!(stalled[0].last_error.as_deref(), Some("broker offline"));

    store.mark_published(id, Utc::now()).await.unwrap();
    assert!(store.pending_outbox(10).await.unwrap().is_empty());
    assert!(store.stalled_outbox(1, 10).await.unwrap().is_empty());
    assert_eq!(store.record_publish_failure(id, "late").await.unwrap(), 0);
    store.ping().await.unwrap();
}
