use uuid::Uuid;

use sea_orm::{ActiveValue, IntoActiveModel, TransactionTrait};

use crate::{
    LedgerError, ResultLedger, UserUpdate, UserView,
    repository::{CardRepository, UserRepository},
    util::Page,
};

use super::{Ledger, with_tx};

impl Ledger {
    pub async fn user(&self, user_id: i64) -> ResultLedger<UserView> {
        UserRepository::require(&self.database, user_id)
            .await?
            .try_into()
    }

    pub async fn user_by_username(&self, username: &str) -> ResultLedger<UserView> {
        UserRepository::require_by_username(&self.database, username.trim())
            .await?
            .try_into()
    }

    /// Lists users in id order. `page` starts at 1.
    pub async fn users(&self, page: u64, page_size: u64) -> ResultLedger<Vec<UserView>> {
        let page = Page::new(page, page_size)?;
        UserRepository::page_all(&self.database, page)
            .await?
            .into_iter()
            .map(UserView::try_from)
            .collect()
    }

    /// Disables a user. A blocked user can no longer authenticate.
    pub async fn block_user(&self, user_id: i64) -> ResultLedger<()> {
        with_tx!(self, |db_tx| {
            let model = UserRepository::require(&db_tx, user_id).await?;
            let username = model.username.clone();
            let mut active = model.into_active_model();
            active.enabled = ActiveValue::Set(false);
            UserRepository::update(&db_tx, active, &username).await?;
            tracing::info!(user_id, "user blocked");
            Ok(())
        })
    }

    /// Replaces username, role and enabled flag of an existing user.
    pub async fn update_user(&self, update: UserUpdate) -> ResultLedger<UserView> {
        update.validate().map_err(LedgerError::Validation)?;
        let username = update.username.trim().to_string();

        with_tx!(self, |db_tx| {
            let model = UserRepository::require(&db_tx, update.id).await?;
            if let Some(holder) = UserRepository::find_by_username(&db_tx, &username).await?
                && holder.id != update.id
            {
                return Err(LedgerError::UsernameTaken(username));
            }

            let mut active = model.into_active_model();
            active.username = ActiveValue::Set(username.clone());
            active.role = ActiveValue::Set(update.role.as_str().to_string());
            active.enabled = ActiveValue::Set(update.enabled);
            let saved = UserRepository::update(&db_tx, active, &username).await?;
            tracing::info!(user_id = update.id, "user updated");
            UserView::try_from(saved)
        })
    }

    /// Removes a user together with every card it owns.
    pub async fn delete_user(&self, user_id: i64) -> ResultLedger<()> {
        let card_ids = CardRepository::ids_by_owner(&self.database, user_id).await?;
        let _guard = self.locks.acquire(&card_ids).await;
        with_tx!(self, |db_tx| {
            UserRepository::require(&db_tx, user_id).await?;
            let removed = CardRepository::delete_by_owner(&db_tx, user_id).await?;
            UserRepository::delete(&db_tx, user_id).await?;
            tracing::info!(user_id, cards = removed, "user deleted");
            Ok(())
        })
    }

    /// Records a holder's request to block a card and acknowledges it.
    ///
    /// The card status is left untouched; an administrator acts on the request.
    pub fn request_card_block(&self, card_id: Uuid, username: &str) -> String {
        tracing::info!(%card_id, username, "card block requested");
        format!("block request for card {card_id} from user {username} accepted")
    }
}
