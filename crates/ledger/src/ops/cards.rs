use chrono::Utc;
use uuid::Uuid;

use sea_orm::{DatabaseTransaction, TransactionTrait, sea_query::Expr};

use crate::{
    CardNumber, CardStatus, CardUpdate, CardView, LedgerError, Money, ResultLedger,
    cards::{self, Card},
    codec,
    repository::{CardRepository, UserRepository},
    util::Page,
};

use super::{Ledger, with_tx};

/// Draws before giving up on finding an unused card number.
const MAX_NUMBER_ATTEMPTS: usize = 8;

impl Ledger {
    /// Issues a new card to an existing user.
    ///
    /// The card starts `ACTIVE` with a zero balance and expires five years
    /// after today. Returns the masked view.
    pub async fn issue_card(&self, owner_id: i64) -> ResultLedger<CardView> {
        let issued_on = Utc::now().date_naive();
        with_tx!(self, |db_tx| {
            let owner = UserRepository::require(&db_tx, owner_id).await?;
            let number = self.fresh_card_number(&db_tx).await?;
            let card = Card::issue(number, owner.id, issued_on);

            CardRepository::insert(&db_tx, card.to_active_model(&self.codec)?).await?;
            tracing::info!(card_id = %card.id, owner_id, number = %card.number, "card issued");
            Ok(CardView::new(&card, &owner.username))
        })
    }

    /// Generate-then-check with a bounded number of draws.
    async fn fresh_card_number(&self, db: &DatabaseTransaction) -> ResultLedger<CardNumber> {
        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let Some(number) = CardNumber::from_u64(self.numbers.next_number()) else {
                continue;
            };
            let digest = self.codec.digest(number.expose());
            if CardRepository::digest_holder(db, &digest).await?.is_none() {
                return Ok(number);
            }
            tracing::debug!(attempt, "card number already issued, drawing again");
        }
        Err(LedgerError::DuplicateCardNumber(format!(
            "no unused card number after {MAX_NUMBER_ATTEMPTS} attempts"
        )))
    }

    /// Returns a card snapshot.
    pub async fn card(&self, card_id: Uuid) -> ResultLedger<CardView> {
        let row = CardRepository::find_with_owner(&self.database, card_id)
            .await?
            .ok_or_else(|| LedgerError::CardNotFound(format!("card {card_id} not exists")))?;
        self.card_view(row)
    }

    /// Lists every card in issue order. `page` starts at 1.
    pub async fn cards(&self, page: u64, page_size: u64) -> ResultLedger<Vec<CardView>> {
        let page = Page::new(page, page_size)?;
        let rows = CardRepository::page_all(&self.database, page).await?;
        self.card_views(rows)
    }

    /// Lists the cards of one owner in issue order. `page` starts at 1.
    pub async fn cards_by_owner(
        &self,
        owner_id: i64,
        page: u64,
        page_size: u64,
    ) -> ResultLedger<Vec<CardView>> {
        let page = Page::new(page, page_size)?;
        let rows = CardRepository::page_by_owner(&self.database, owner_id, None, page).await?;
        self.card_views(rows)
    }

    /// Lists the cards of one owner matching a number (at most one card).
    ///
    /// A malformed number matches nothing.
    pub async fn cards_by_owner_and_number(
        &self,
        owner_id: i64,
        number: &str,
        page: u64,
        page_size: u64,
    ) -> ResultLedger<Vec<CardView>> {
        let page = Page::new(page, page_size)?;
        let Some(canonical) = codec::canonical_number(number) else {
            return Ok(Vec::new());
        };
        let digest = self.codec.digest(&canonical);
        let rows =
            CardRepository::page_by_owner(&self.database, owner_id, Some(&digest), page).await?;
        self.card_views(rows)
    }

    /// Looks a card up by its clear number (whitespace ignored).
    pub async fn card_by_number(&self, number: &str) -> ResultLedger<CardView> {
        let not_found = || LedgerError::CardNotFound("no card with that number".to_string());
        let canonical = codec::canonical_number(number).ok_or_else(not_found)?;
        let digest = self.codec.digest(&canonical);
        let row = CardRepository::find_by_digest(&self.database, &digest)
            .await?
            .ok_or_else(not_found)?;
        self.card_view(row)
    }

    /// Sets a card status. Any status may replace any other.
    ///
    /// The status text is checked before the card is looked up.
    pub async fn set_card_status(&self, card_id: Uuid, status: &str) -> ResultLedger<CardView> {
        let status: CardStatus = status.parse()?;
        let _guard = self.locks.acquire(&[card_id]).await;
        with_tx!(self, |db_tx| {
            let (mut model, owner) = CardRepository::find_with_owner(&db_tx, card_id)
                .await?
                .ok_or_else(|| LedgerError::CardNotFound(format!("card {card_id} not exists")))?;
            let version = model.version;
            let previous = model.status.clone();

            CardRepository::update_guarded(
                &db_tx,
                card_id,
                version,
                vec![(cards::Column::Status, Expr::value(status.as_str()))],
            )
            .await?;

            model.status = status.as_str().to_string();
            model.version = version + 1;
            let view = self.card_view((model, owner))?;
            tracing::info!(%card_id, from = %previous, to = %status, "card status changed");
            Ok(view)
        })
    }

    /// Administrative replacement of number, expiry, status and balance.
    pub async fn update_card(&self, card_id: Uuid, update: CardUpdate) -> ResultLedger<CardView> {
        if update.balance.is_negative() {
            return Err(LedgerError::InvalidAmount(format!(
                "balance must not be negative, got {}",
                update.balance
            )));
        }
        let number = update.validate().map_err(LedgerError::Validation)?;

        let _guard = self.locks.acquire(&[card_id]).await;
        with_tx!(self, |db_tx| {
            let (model, owner) = CardRepository::find_with_owner(&db_tx, card_id)
                .await?
                .ok_or_else(|| LedgerError::CardNotFound(format!("card {card_id} not exists")))?;
            let mut card = Card::from_model(model, &self.codec)?;

            let digest = self.codec.digest(number.expose());
            if let Some(holder) = CardRepository::digest_holder(&db_tx, &digest).await?
                && holder != card_id
            {
                return Err(LedgerError::DuplicateCardNumber(
                    "number already belongs to another card".to_string(),
                ));
            }

            CardRepository::update_guarded(
                &db_tx,
                card_id,
                card.version,
                vec![
                    (
                        cards::Column::NumberCipher,
                        Expr::value(self.codec.encrypt(number.expose())?),
                    ),
                    (cards::Column::NumberDigest, Expr::value(digest)),
                    (cards::Column::ExpiryDate, Expr::value(update.expiry_date)),
                    (cards::Column::Status, Expr::value(update.status.as_str())),
                    (cards::Column::Balance, Expr::value(update.balance.to_storage())),
                ],
            )
            .await?;

            card.number = number;
            card.expiry_date = update.expiry_date;
            card.status = update.status;
            card.balance = update.balance;
            card.version += 1;

            let owner = owner.ok_or_else(|| {
                LedgerError::UserNotFound(format!("owner {} of card {card_id} not exists", card.owner_id))
            })?;
            tracing::info!(%card_id, "card record replaced");
            Ok(CardView::new(&card, &owner.username))
        })
    }

    /// Deletes a card.
    pub async fn delete_card(&self, card_id: Uuid) -> ResultLedger<()> {
        let _guard = self.locks.acquire(&[card_id]).await;
        with_tx!(self, |db_tx| {
            if CardRepository::delete(&db_tx, card_id).await? == 0 {
                return Err(LedgerError::CardNotFound(format!("card {card_id} not exists")));
            }
            tracing::info!(%card_id, "card deleted");
            Ok(())
        })
    }

    /// Returns the current balance of a card.
    pub async fn card_balance(&self, card_id: Uuid) -> ResultLedger<Money> {
        let model = CardRepository::require(&self.database, card_id, "requested").await?;
        Money::from_storage(&model.balance)
    }
}
