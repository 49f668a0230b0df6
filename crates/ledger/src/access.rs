//! Authenticated caller identity, as handed over by the auth gateway.

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::{LedgerError, ResultLedger, ValidationErrors};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }

    /// Reads the `role` column of user `user_id`.
    pub(crate) fn from_storage(value: &str, user_id: i64) -> ResultLedger<Self> {
        value.parse().map_err(|_| {
            LedgerError::CorruptedRecord(format!("user {user_id} has unknown role {value:?}"))
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            other => {
                let mut errors = ValidationErrors::new();
                errors.push("role", format!("unknown role: {other}"));
                Err(LedgerError::Validation(errors))
            }
        }
    }
}

/// The caller on whose behalf an operation runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> ResultLedger<()> {
        if !self.is_admin() {
            return Err(LedgerError::Forbidden(format!(
                "user {} is not an administrator",
                self.user_id
            )));
        }
        Ok(())
    }

    /// Admins see every card; users only their own.
    pub fn can_access(&self, owner_id: i64) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}
