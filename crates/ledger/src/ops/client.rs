//! Card operations on behalf of an authenticated holder.
//!
//! A card the caller may not reach is reported exactly like a missing one, so
//! a holder cannot discover other people's card ids.

use uuid::Uuid;

use crate::{
    CardView, LedgerError, Money, Principal, ResultLedger, cards,
    repository::{CardRepository, UserRepository},
};

use super::Ledger;

impl Ledger {
    async fn accessible_card(
        &self,
        principal: &Principal,
        card_id: Uuid,
    ) -> ResultLedger<cards::Model> {
        match CardRepository::find_by_id(&self.database, card_id).await? {
            Some(model) if principal.can_access(model.owner_id) => Ok(model),
            _ => Err(LedgerError::CardNotFound(format!("card {card_id} not exists"))),
        }
    }

    /// The caller's own cards, optionally narrowed to one number.
    pub async fn owned_cards(
        &self,
        principal: &Principal,
        page: u64,
        page_size: u64,
        number: Option<&str>,
    ) -> ResultLedger<Vec<CardView>> {
        match number {
            Some(number) => {
                self.cards_by_owner_and_number(principal.user_id, number, page, page_size)
                    .await
            }
            None => self.cards_by_owner(principal.user_id, page, page_size).await,
        }
    }

    pub async fn owned_balance(&self, principal: &Principal, card_id: Uuid) -> ResultLedger<Money> {
        let model = self.accessible_card(principal, card_id).await?;
        Money::from_storage(&model.balance)
    }

    /// Transfer between two cards the caller can reach.
    pub async fn transfer_owned(
        &self,
        principal: &Principal,
        source_id: Uuid,
        destination_id: Uuid,
        amount: Money,
    ) -> ResultLedger<()> {
        self.accessible_card(principal, source_id).await?;
        self.accessible_card(principal, destination_id).await?;
        self.transfer(source_id, destination_id, amount).await
    }

    pub async fn request_owned_card_block(
        &self,
        principal: &Principal,
        card_id: Uuid,
    ) -> ResultLedger<String> {
        self.accessible_card(principal, card_id).await?;
        let caller = UserRepository::require(&self.database, principal.user_id).await?;
        Ok(self.request_card_block(card_id, &caller.username))
    }
}
