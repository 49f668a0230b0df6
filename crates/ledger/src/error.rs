//! The module contains the errors the ledger can return.
//!
//! Every variant is a recoverable condition reported to the caller. None of
//! them is retried inside the ledger.
//!
//! - [`UserNotFound`] / [`CardNotFound`] when a record is missing (or is not
//!   visible to the calling principal).
//! - [`InvalidAmount`] for non-positive transfer amounts and negative balances.
//! - [`InsufficientFunds`] when a transfer exceeds the source balance.
//! - [`Validation`] when an input breaks one or more field constraints.
//! - [`CorruptedRecord`] when a stored row no longer decodes (balance, role
//!   or status column).
//!
//!  [`UserNotFound`]: LedgerError::UserNotFound
//!  [`CardNotFound`]: LedgerError::CardNotFound
//!  [`InvalidAmount`]: LedgerError::InvalidAmount
//!  [`InsufficientFunds`]: LedgerError::InsufficientFunds
//!  [`Validation`]: LedgerError::Validation
//!  [`CorruptedRecord`]: LedgerError::CorruptedRecord
use std::fmt;

use sea_orm::DbErr;
use thiserror::Error;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Card not found: {0}")]
    CardNotFound(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error("Encryption failure: {0}")]
    Encryption(String),
    #[error("Duplicate card number: {0}")]
    DuplicateCardNumber(String),
    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),
    #[error("\"{0}\" already present!")]
    UsernameTaken(String),
    #[error("Wrong password")]
    WrongPassword,
    #[error("User disabled: {0}")]
    UserDisabled(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),
    #[error("Corrupted record: {0}")]
    CorruptedRecord(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::UserNotFound(a), Self::UserNotFound(b)) => a == b,
            (Self::CardNotFound(a), Self::CardNotFound(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::InvalidStatus(a), Self::InvalidStatus(b)) => a == b,
            (Self::Encryption(a), Self::Encryption(b)) => a == b,
            (Self::DuplicateCardNumber(a), Self::DuplicateCardNumber(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::UsernameTaken(a), Self::UsernameTaken(b)) => a == b,
            (Self::WrongPassword, Self::WrongPassword) => true,
            (Self::UserDisabled(a), Self::UserDisabled(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::ConcurrentModification(a), Self::ConcurrentModification(b)) => a == b,
            (Self::CorruptedRecord(a), Self::CorruptedRecord(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

/// A single broken constraint on an input field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

/// Every constraint an input broke, collected before any write happens.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field,
            message: message.into(),
        });
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns `true` if at least one violation concerns `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// `Ok(())` when nothing was collected, otherwise the collection itself.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// `Ok(())` when nothing was collected, otherwise [`LedgerError::Validation`].
    pub fn into_result(self) -> Result<(), LedgerError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", violation.field, violation.message)?;
        }
        Ok(())
    }
}
