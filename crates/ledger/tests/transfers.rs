use std::sync::Arc;

use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use ledger::{CardView, Ledger, LedgerError, Money};

mod common;

use common::{
    file_database, fund, insert_user, ledger_on, ledger_with_db, money, number_of,
};

/// Two cards for one owner, the first one funded with `balance`.
async fn funded_pair(
    ledger: &Ledger,
    db: &DatabaseConnection,
    balance: &str,
) -> (CardView, CardView) {
    let alice = insert_user(db, "alice", "USER").await;
    let source = ledger.issue_card(alice).await.unwrap();
    let destination = ledger.issue_card(alice).await.unwrap();
    let source = fund(ledger, &source, &number_of(0), balance).await;
    (source, destination)
}

async fn balances(ledger: &Ledger, a: Uuid, b: Uuid) -> (Money, Money) {
    (
        ledger.card_balance(a).await.unwrap(),
        ledger.card_balance(b).await.unwrap(),
    )
}

#[tokio::test]
async fn transfer_moves_exact_amount() {
    let (ledger, db) = ledger_with_db().await;
    let (source, destination) = funded_pair(&ledger, &db, "1000.00").await;

    ledger
        .transfer(source.id, destination.id, money("400.89"))
        .await
        .unwrap();

    assert_eq!(
        balances(&ledger, source.id, destination.id).await,
        (money("599.11"), money("400.89"))
    );
}

#[tokio::test]
async fn overdraft_is_rejected_without_writes() {
    let (ledger, db) = ledger_with_db().await;
    let (source, destination) = funded_pair(&ledger, &db, "1000.00").await;

    let err = ledger
        .transfer(source.id, destination.id, money("1400"))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientFunds(_)));
    assert_eq!(
        balances(&ledger, source.id, destination.id).await,
        (money("1000"), Money::ZERO)
    );
}

#[tokio::test]
async fn whole_balance_can_be_spent() {
    let (ledger, db) = ledger_with_db().await;
    let (source, destination) = funded_pair(&ledger, &db, "10.50").await;

    ledger
        .transfer(source.id, destination.id, money("10.50"))
        .await
        .unwrap();

    assert_eq!(
        balances(&ledger, source.id, destination.id).await,
        (Money::ZERO, money("10.50"))
    );
}

#[tokio::test]
async fn non_positive_amounts_are_invalid() {
    let (ledger, db) = ledger_with_db().await;
    let (source, destination) = funded_pair(&ledger, &db, "100").await;

    for amount in ["0", "0.00", "-5"] {
        let err = ledger
            .transfer(source.id, destination.id, money(amount))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)), "{amount}: {err:?}");
    }
    // Checked before the cards are even looked up.
    let err = ledger
        .transfer(Uuid::now_v7(), Uuid::now_v7(), Money::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));

    assert_eq!(
        balances(&ledger, source.id, destination.id).await,
        (money("100"), Money::ZERO)
    );
}

#[tokio::test]
async fn missing_cards_are_reported_source_first() {
    let (ledger, db) = ledger_with_db().await;
    let (source, _destination) = funded_pair(&ledger, &db, "100").await;
    let ghost = Uuid::now_v7();

    match ledger.transfer(ghost, Uuid::now_v7(), money("1")).await {
        Err(LedgerError::CardNotFound(msg)) => assert!(msg.starts_with("source"), "{msg}"),
        other => panic!("unexpected result: {other:?}"),
    }
    match ledger.transfer(source.id, ghost, money("1")).await {
        Err(LedgerError::CardNotFound(msg)) => assert!(msg.starts_with("destination"), "{msg}"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(ledger.card_balance(source.id).await.unwrap(), money("100"));
}

#[tokio::test]
async fn self_transfer_is_rejected() {
    let (ledger, db) = ledger_with_db().await;
    let (source, _destination) = funded_pair(&ledger, &db, "100").await;

    let err = ledger
        .transfer(source.id, source.id, money("1"))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InvalidAmount(_)));
    assert_eq!(ledger.card_balance(source.id).await.unwrap(), money("100"));
}

#[tokio::test]
async fn transfers_conserve_the_total() {
    let (ledger, db) = ledger_with_db().await;
    let (source, destination) = funded_pair(&ledger, &db, "300").await;

    for (from, to, amount) in [
        (source.id, destination.id, "120.25"),
        (destination.id, source.id, "20.05"),
        (source.id, destination.id, "0.01"),
        (destination.id, source.id, "500"),
    ] {
        let _ = ledger.transfer(from, to, money(amount)).await;
        let (a, b) = balances(&ledger, source.id, destination.id).await;
        assert_eq!(a + b, money("300"));
        assert!(!a.is_negative() && !b.is_negative());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_never_overdraw() {
    let (ledger, db) = ledger_with_db().await;
    let (source, destination) = funded_pair(&ledger, &db, "1000").await;
    let ledger = Arc::new(ledger);

    let (from, to) = (source.id, destination.id);

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..15 {
        let ledger = Arc::clone(&ledger);
        tasks.spawn(async move { ledger.transfer(from, to, "100".parse().unwrap()).await });
    }

    let mut committed = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(()) => committed += 1,
            Err(LedgerError::InsufficientFunds(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(committed, 10);
    assert_eq!(
        balances(&ledger, source.id, destination.id).await,
        (Money::ZERO, money("1000"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_transfers_do_not_deadlock() {
    let (ledger, db) = ledger_with_db().await;
    let (a, b) = funded_pair(&ledger, &db, "500").await;
    let b = fund(&ledger, &b, &number_of(1), "500").await;
    let ledger = Arc::new(ledger);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..20 {
        let ledger = Arc::clone(&ledger);
        let (from, to) = if i % 2 == 0 { (a.id, b.id) } else { (b.id, a.id) };
        tasks.spawn(async move { ledger.transfer(from, to, "10".parse().unwrap()).await });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    assert_eq!(
        balances(&ledger, a.id, b.id).await,
        (money("500"), money("500"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rival_ledgers_on_one_file_keep_the_total() {
    let (db, url, path) = file_database().await;
    let first = ledger_on(&db).await;
    let (source, destination) = funded_pair(&first, &db, "500").await;

    // A second process would hold its own connection pool and its own locks.
    let rival_db = Database::connect(&url).await.unwrap();
    let rival = ledger_on(&rival_db).await;
    let ledgers = [Arc::new(first), Arc::new(rival)];
    let (from, to) = (source.id, destination.id);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..20 {
        let ledger = Arc::clone(&ledgers[i % 2]);
        tasks.spawn(async move { ledger.transfer(from, to, "100".parse().unwrap()).await });
    }

    let mut committed: i64 = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(()) => committed += 1,
            Err(LedgerError::InsufficientFunds(_) | LedgerError::ConcurrentModification(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    let (a, b) = balances(&ledgers[0], from, to).await;
    assert_eq!(a + b, money("500"));
    assert!(!a.is_negative());
    assert_eq!(b, Money::from(100 * committed));
    assert_eq!(balances(&ledgers[1], from, to).await, (a, b));

    drop(ledgers);
    drop(rival_db);
    drop(db);
    let _ = std::fs::remove_file(path);
}
