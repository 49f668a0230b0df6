use sea_orm::TransactionTrait;

use crate::{
    LedgerError, Principal, Registration, ResultLedger, Role, UserView,
    repository::UserRepository,
    users::verify_password,
};

use super::{Ledger, with_tx};

impl Ledger {
    /// Creates an enabled account with an argon2-hashed password.
    pub async fn register(&self, registration: Registration) -> ResultLedger<UserView> {
        registration.validate().map_err(LedgerError::Validation)?;
        let username = registration.username.trim().to_string();

        with_tx!(self, |db_tx| {
            if UserRepository::find_by_username(&db_tx, &username).await?.is_some() {
                return Err(LedgerError::UsernameTaken(username));
            }
            let role = registration.role;
            let model =
                UserRepository::insert(&db_tx, registration.into_active_model()?, &username)
                    .await?;
            tracing::info!(user_id = model.id, %role, "user registered");
            UserView::try_from(model)
        })
    }

    /// Checks credentials and hands back the caller's principal.
    pub async fn authenticate(&self, username: &str, password: &str) -> ResultLedger<Principal> {
        let username = username.trim();
        let model = UserRepository::require_by_username(&self.database, username).await?;

        if !verify_password(password, &model.password)? {
            tracing::info!(username, "authentication rejected: wrong password");
            return Err(LedgerError::WrongPassword);
        }
        if !model.enabled {
            tracing::info!(username, "authentication rejected: user disabled");
            return Err(LedgerError::UserDisabled(username.to_string()));
        }

        Ok(Principal::new(model.id, Role::from_storage(&model.role, model.id)?))
    }
}
