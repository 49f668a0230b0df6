//! Card and user stores.
//!
//! Every function takes any [`ConnectionTrait`], so the ledger can call them on
//! the plain connection for reads or inside an open transaction for writes.
//! Owners are fetched explicitly next to their cards; a card whose owner row
//! is missing surfaces as [`LedgerError::UserNotFound`] in the ledger.

use sea_orm::{
    ActiveModelTrait, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, prelude::*,
    sea_query::{Expr, SimpleExpr},
};
use uuid::Uuid;

use crate::{LedgerError, ResultLedger, cards, users, util::Page, util::map_unique_violation};

pub(crate) type CardRow = (cards::Model, Option<users::Model>);

pub(crate) struct CardRepository;

impl CardRepository {
    pub(crate) async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> ResultLedger<Option<cards::Model>> {
        cards::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Loads a card or fails with `CardNotFound`, labelled with its role.
    pub(crate) async fn require<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        label: &str,
    ) -> ResultLedger<cards::Model> {
        Self::find_by_id(db, id)
            .await?
            .ok_or_else(|| LedgerError::CardNotFound(format!("{label} card {id} not exists")))
    }

    pub(crate) async fn find_with_owner<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> ResultLedger<Option<CardRow>> {
        cards::Entity::find_by_id(id)
            .find_also_related(users::Entity)
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(crate) async fn find_by_digest<C: ConnectionTrait>(
        db: &C,
        digest: &str,
    ) -> ResultLedger<Option<CardRow>> {
        cards::Entity::find()
            .filter(cards::Column::NumberDigest.eq(digest))
            .find_also_related(users::Entity)
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Id of the card currently holding `digest`, if any.
    pub(crate) async fn digest_holder<C: ConnectionTrait>(
        db: &C,
        digest: &str,
    ) -> ResultLedger<Option<Uuid>> {
        let holder = cards::Entity::find()
            .filter(cards::Column::NumberDigest.eq(digest))
            .one(db)
            .await?;
        Ok(holder.map(|model| model.id))
    }

    pub(crate) async fn page_all<C: ConnectionTrait>(
        db: &C,
        page: Page,
    ) -> ResultLedger<Vec<CardRow>> {
        cards::Entity::find()
            .find_also_related(users::Entity)
            .order_by_asc(cards::Column::Id)
            .offset(page.offset)
            .limit(page.limit)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub(crate) async fn page_by_owner<C: ConnectionTrait>(
        db: &C,
        owner_id: i64,
        digest: Option<&str>,
        page: Page,
    ) -> ResultLedger<Vec<CardRow>> {
        let mut query = cards::Entity::find().filter(cards::Column::OwnerId.eq(owner_id));
        if let Some(digest) = digest {
            query = query.filter(cards::Column::NumberDigest.eq(digest));
        }
        query
            .find_also_related(users::Entity)
            .order_by_asc(cards::Column::Id)
            .offset(page.offset)
            .limit(page.limit)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub(crate) async fn ids_by_owner<C: ConnectionTrait>(
        db: &C,
        owner_id: i64,
    ) -> ResultLedger<Vec<Uuid>> {
        let models = cards::Entity::find()
            .filter(cards::Column::OwnerId.eq(owner_id))
            .all(db)
            .await?;
        Ok(models.into_iter().map(|model| model.id).collect())
    }

    pub(crate) async fn insert<C: ConnectionTrait>(
        db: &C,
        model: cards::ActiveModel,
    ) -> ResultLedger<()> {
        cards::Entity::insert(model)
            .exec_without_returning(db)
            .await
            .map_err(|err| {
                map_unique_violation(err, || {
                    LedgerError::DuplicateCardNumber("card number already issued".to_string())
                })
            })?;
        Ok(())
    }

    /// Writes `changes` only if the row still carries `version`, bumping it.
    ///
    /// A row changed (or deleted) since it was read yields
    /// `ConcurrentModification`.
    pub(crate) async fn update_guarded<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        version: i64,
        changes: Vec<(cards::Column, SimpleExpr)>,
    ) -> ResultLedger<()> {
        let mut update = cards::Entity::update_many()
            .col_expr(cards::Column::Version, Expr::value(version + 1))
            .filter(cards::Column::Id.eq(id))
            .filter(cards::Column::Version.eq(version));
        for (column, value) in changes {
            update = update.col_expr(column, value);
        }

        let result = update.exec(db).await.map_err(|err| {
            map_unique_violation(err, || {
                LedgerError::DuplicateCardNumber("card number already issued".to_string())
            })
        })?;
        if result.rows_affected == 0 {
            return Err(LedgerError::ConcurrentModification(format!(
                "card {id} changed since it was read"
            )));
        }
        Ok(())
    }

    pub(crate) async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> ResultLedger<u64> {
        let result = cards::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }

    pub(crate) async fn delete_by_owner<C: ConnectionTrait>(
        db: &C,
        owner_id: i64,
    ) -> ResultLedger<u64> {
        let result = cards::Entity::delete_many()
            .filter(cards::Column::OwnerId.eq(owner_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

pub(crate) struct UserRepository;

impl UserRepository {
    pub(crate) async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i64,
    ) -> ResultLedger<Option<users::Model>> {
        users::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(crate) async fn require<C: ConnectionTrait>(db: &C, id: i64) -> ResultLedger<users::Model> {
        Self::find_by_id(db, id)
            .await?
            .ok_or_else(|| LedgerError::UserNotFound(format!("user {id} not exists")))
    }

    pub(crate) async fn find_by_username<C: ConnectionTrait>(
        db: &C,
        username: &str,
    ) -> ResultLedger<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(crate) async fn require_by_username<C: ConnectionTrait>(
        db: &C,
        username: &str,
    ) -> ResultLedger<users::Model> {
        Self::find_by_username(db, username)
            .await?
            .ok_or_else(|| LedgerError::UserNotFound(format!("user '{username}' not exists")))
    }

    pub(crate) async fn page_all<C: ConnectionTrait>(
        db: &C,
        page: Page,
    ) -> ResultLedger<Vec<users::Model>> {
        users::Entity::find()
            .order_by_asc(users::Column::Id)
            .offset(page.offset)
            .limit(page.limit)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub(crate) async fn insert<C: ConnectionTrait>(
        db: &C,
        model: users::ActiveModel,
        username: &str,
    ) -> ResultLedger<users::Model> {
        model
            .insert(db)
            .await
            .map_err(|err| map_unique_violation(err, || LedgerError::UsernameTaken(username.to_string())))
    }

    pub(crate) async fn update<C: ConnectionTrait>(
        db: &C,
        model: users::ActiveModel,
        username: &str,
    ) -> ResultLedger<users::Model> {
        model
            .update(db)
            .await
            .map_err(|err| map_unique_violation(err, || LedgerError::UsernameTaken(username.to_string())))
    }

    pub(crate) async fn delete<C: ConnectionTrait>(db: &C, id: i64) -> ResultLedger<u64> {
        let result = users::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}
