#![allow(dead_code)]

use std::sync::{
    OnceLock,
    atomic::{AtomicU64, Ordering},
};

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use ledger::{CardCodec, CardNumberSource, CardUpdate, CardView, Ledger, Money};
use migration::MigratorTrait;

/// First number handed out by [`SequentialNumbers`].
pub const FIRST_NUMBER: u64 = 4_000_000_000_000_001;

/// Hands out `FIRST_NUMBER`, `FIRST_NUMBER + 1`, ...
#[derive(Debug)]
pub struct SequentialNumbers(AtomicU64);

impl Default for SequentialNumbers {
    fn default() -> Self {
        Self(AtomicU64::new(FIRST_NUMBER))
    }
}

impl CardNumberSource for SequentialNumbers {
    fn next_number(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Always the same number.
#[derive(Debug)]
pub struct FixedNumber(pub u64);

impl CardNumberSource for FixedNumber {
    fn next_number(&self) -> u64 {
        self.0
    }
}

/// Clear number of the `n`-th card issued by a fresh ledger (0-based).
pub fn number_of(n: u64) -> String {
    (FIRST_NUMBER + n).to_string()
}

pub fn codec() -> CardCodec {
    static CODEC: OnceLock<CardCodec> = OnceLock::new();
    CODEC
        .get_or_init(|| CardCodec::from_secret("integration-secret", "integration-salt").unwrap())
        .clone()
}

pub async fn database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

/// A migrated SQLite file under `target/test_dbs`, for tests that need more
/// than one connection to the same store. Returns the URL and the file path.
pub async fn file_database() -> (DatabaseConnection, String, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("ledger_{}.db", uuid::Uuid::now_v7()));
    let url = format!("sqlite:{}?mode=rwc", path.display());
    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    (db, url, path)
}

/// A ledger over `db` with sequential card numbers.
pub async fn ledger_on(db: &DatabaseConnection) -> Ledger {
    Ledger::builder()
        .database(db.clone())
        .codec(codec())
        .card_numbers(SequentialNumbers::default())
        .build()
        .await
        .unwrap()
}

pub async fn ledger_with_numbers(source: impl CardNumberSource + 'static) -> (Ledger, DatabaseConnection) {
    let db = database().await;
    let ledger = Ledger::builder()
        .database(db.clone())
        .codec(codec())
        .card_numbers(source)
        .build()
        .await
        .unwrap();
    (ledger, db)
}

pub async fn ledger_with_db() -> (Ledger, DatabaseConnection) {
    ledger_with_numbers(SequentialNumbers::default()).await
}

/// Inserts a user row directly, skipping password hashing.
pub async fn insert_user(db: &DatabaseConnection, username: &str, role: &str) -> i64 {
    let backend = db.get_database_backend();
    let result = db
        .execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, password, role, enabled) VALUES (?, ?, ?, ?)",
            vec![
                username.into(),
                "not-a-hash".into(),
                role.into(),
                true.into(),
            ],
        ))
        .await
        .unwrap();
    result.last_insert_id() as i64
}

/// Sets a card balance through the administrative update.
pub async fn fund(ledger: &Ledger, card: &CardView, number: &str, balance: &str) -> CardView {
    ledger
        .update_card(
            card.id,
            CardUpdate {
                number: number.to_string(),
                expiry_date: card.expiry_date,
                status: card.status,
                balance: balance.parse::<Money>().unwrap(),
            },
        )
        .await
        .unwrap()
}

pub fn money(raw: &str) -> Money {
    raw.parse().unwrap()
}
