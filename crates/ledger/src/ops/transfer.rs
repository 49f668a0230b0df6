use uuid::Uuid;

use sea_orm::{TransactionTrait, sea_query::Expr};

use crate::{LedgerError, Money, ResultLedger, cards, repository::CardRepository};

use super::{Ledger, with_tx};

impl Ledger {
    /// Moves `amount` from one card to another, atomically.
    ///
    /// Checks run in this order: positive amount, source exists, destination
    /// exists, distinct cards, enough funds on the source. Card status is not
    /// consulted. On any error neither balance changes.
    pub async fn transfer(
        &self,
        source_id: Uuid,
        destination_id: Uuid,
        amount: Money,
    ) -> ResultLedger<()> {
        if !amount.is_positive() {
            tracing::warn!(%source_id, %destination_id, %amount, "transfer rejected: amount not positive");
            return Err(LedgerError::InvalidAmount(format!(
                "amount must be positive, got {amount}"
            )));
        }

        let _guard = self.locks.acquire(&[source_id, destination_id]).await;
        with_tx!(self, |db_tx| {
            let source = CardRepository::require(&db_tx, source_id, "source").await?;
            let destination =
                CardRepository::require(&db_tx, destination_id, "destination").await?;

            if source.id == destination.id {
                tracing::warn!(card_id = %source_id, "transfer rejected: same card on both sides");
                return Err(LedgerError::InvalidAmount(
                    "source and destination cards must differ".to_string(),
                ));
            }

            let source_balance = Money::from_storage(&source.balance)?;
            let destination_balance = Money::from_storage(&destination.balance)?;
            if source_balance < amount {
                tracing::warn!(%source_id, %amount, "transfer rejected: insufficient funds");
                return Err(LedgerError::InsufficientFunds(format!(
                    "card {source_id} holds {source_balance}, needs {amount}"
                )));
            }

            let debited = source_balance
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::InvalidAmount("balance underflow".to_string()))?;
            let credited = destination_balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))?;

            CardRepository::update_guarded(
                &db_tx,
                source_id,
                source.version,
                vec![(cards::Column::Balance, Expr::value(debited.to_storage()))],
            )
            .await?;
            CardRepository::update_guarded(
                &db_tx,
                destination_id,
                destination.version,
                vec![(cards::Column::Balance, Expr::value(credited.to_storage()))],
            )
            .await?;

            tracing::info!(%source_id, %destination_id, %amount, "transfer committed");
            Ok(())
        })
    }
}
