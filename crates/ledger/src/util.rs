//! Internal helpers for paging and storage error mapping.
//!
//! These utilities are **not** part of the public API.

use sea_orm::{DbErr, RuntimeErr, SqlErr, sqlx};

use crate::{LedgerError, ValidationErrors};

/// A 1-indexed page request translated to storage offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    pub(crate) fn new(page: u64, page_size: u64) -> Result<Self, LedgerError> {
        let mut errors = ValidationErrors::new();
        if page < 1 {
            errors.push("page", "must be at least 1");
        }
        if page_size < 1 {
            errors.push("page_size", "must be at least 1");
        }
        errors.into_result()?;

        Ok(Self {
            offset: (page - 1).saturating_mul(page_size),
            limit: page_size,
        })
    }
}

/// Maps a unique-index violation on insert/update to a domain error.
pub(crate) fn map_unique_violation(err: DbErr, on_conflict: impl FnOnce() -> LedgerError) -> LedgerError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => on_conflict(),
        _ => LedgerError::Database(err),
    }
}

/// SQLite primary result codes for a lock held by another connection.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// `true` when SQLite refused the statement because another writer holds the
/// lock (`SQLITE_BUSY`, `SQLITE_LOCKED` and their extended codes).
pub(crate) fn is_contention(err: &DbErr) -> bool {
    let (DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))
    | DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))
    | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))) = err
    else {
        return false;
    };
    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
}

/// Reports a write that lost the store lock to another connection as
/// [`LedgerError::ConcurrentModification`]. Other errors pass through.
pub(crate) fn map_contention(err: LedgerError) -> LedgerError {
    match err {
        LedgerError::Database(db_err) if is_contention(&db_err) => {
            tracing::warn!(error = %db_err, "write lost the store lock to another writer");
            LedgerError::ConcurrentModification(
                "card rows are being written by another connection".to_string(),
            )
        }
        other => other,
    }
}
