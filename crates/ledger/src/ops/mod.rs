use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    CardCodec, CardNumberSource, CardView, LedgerError, RandomCardNumbers, ResultLedger,
    cards::Card, locks::CardLocks, repository::CardRow,
};

mod auth;
mod cards;
mod client;
mod transfer;
mod users;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// Losing the store lock to another connection surfaces as
/// `ConcurrentModification`.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let outcome: $crate::ResultLedger<_> = async {
            let $tx = $self.database.begin().await?;
            let result = $body;
            match result {
                Ok(value) => {
                    $tx.commit().await?;
                    Ok::<_, $crate::LedgerError>(value)
                }
                Err(err) => Err(err),
            }
        }
        .await;
        outcome.map_err($crate::util::map_contention)
    }};
}

pub(crate) use with_tx;

/// The card ledger.
///
/// Holds the database handle, the card number codec and the per-card write
/// locks. Share it behind an `Arc`; every operation takes `&self`.
#[derive(Debug)]
pub struct Ledger {
    database: DatabaseConnection,
    codec: Arc<CardCodec>,
    numbers: Arc<dyn CardNumberSource>,
    locks: CardLocks,
}

impl Ledger {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    /// Decodes a stored card and pairs it with its explicitly loaded owner.
    fn card_view(&self, (model, owner): CardRow) -> ResultLedger<CardView> {
        let owner = owner.ok_or_else(|| {
            LedgerError::UserNotFound(format!("owner {} of card {} not exists", model.owner_id, model.id))
        })?;
        let card = Card::from_model(model, &self.codec)?;
        Ok(CardView::new(&card, &owner.username))
    }

    fn card_views(&self, rows: Vec<CardRow>) -> ResultLedger<Vec<CardView>> {
        rows.into_iter().map(|row| self.card_view(row)).collect()
    }
}

/// The builder for `Ledger`
#[derive(Default)]
pub struct LedgerBuilder {
    database: DatabaseConnection,
    codec: Option<CardCodec>,
    numbers: Option<Arc<dyn CardNumberSource>>,
}

impl LedgerBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> LedgerBuilder {
        self.database = db;
        self
    }

    /// Pass the required card number codec
    pub fn codec(mut self, codec: CardCodec) -> LedgerBuilder {
        self.codec = Some(codec);
        self
    }

    /// Override where new card numbers come from (defaults to a uniform draw).
    pub fn card_numbers(mut self, source: impl CardNumberSource + 'static) -> LedgerBuilder {
        self.numbers = Some(Arc::new(source));
        self
    }

    /// Construct `Ledger`
    pub async fn build(self) -> ResultLedger<Ledger> {
        let codec = self
            .codec
            .ok_or_else(|| LedgerError::Encryption("card codec not configured".to_string()))?;
        Ok(Ledger {
            database: self.database,
            codec: Arc::new(codec),
            numbers: self
                .numbers
                .unwrap_or_else(|| Arc::new(RandomCardNumbers)),
            locks: CardLocks::default(),
        })
    }
}
