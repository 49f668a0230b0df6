//! Users table and the user-facing inputs/views.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;

use crate::{LedgerError, ResultLedger, Role, ValidationErrors};

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 4..=32;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 8..=16;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub username: String,
    pub password: String,
    pub role: String,
    pub enabled: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cards::Entity")]
    Cards,
}

impl Related<super::cards::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cards.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Public view of a user. Never carries the password hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub enabled: bool,
}

impl TryFrom<Model> for UserView {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            role: Role::from_storage(&model.role, model.id)?,
            username: model.username,
            enabled: model.enabled,
        })
    }
}

/// Sign-up input.
#[derive(Clone, Debug)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl Registration {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_username(&mut errors, &self.username);
        if self.password.trim().is_empty() {
            errors.push("password", "must not be blank");
        }
        if !PASSWORD_LEN.contains(&self.password.chars().count()) {
            errors.push("password", "must be between 8 and 16 characters");
        }
        errors.finish()
    }

    pub(crate) fn into_active_model(self) -> ResultLedger<ActiveModel> {
        Ok(ActiveModel {
            id: ActiveValue::NotSet,
            username: ActiveValue::Set(self.username.trim().to_string()),
            password: ActiveValue::Set(hash_password(&self.password)?),
            role: ActiveValue::Set(self.role.as_str().to_string()),
            enabled: ActiveValue::Set(true),
        })
    }
}

/// Update-only profile change.
#[derive(Clone, Debug)]
pub struct UserUpdate {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub enabled: bool,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.id < 1 {
            errors.push("id", "must be at least 1");
        }
        check_username(&mut errors, &self.username);
        errors.finish()
    }
}

fn check_username(errors: &mut ValidationErrors, username: &str) {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        errors.push("username", "must not be blank");
    }
    if !USERNAME_LEN.contains(&trimmed.chars().count()) {
        errors.push("username", "must be between 4 and 32 characters");
    }
}

pub(crate) fn hash_password(plain: &str) -> ResultLedger<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!(error = %e, "argon2 hash_password error");
            LedgerError::Encryption(format!("password hashing failed: {e}"))
        })
}

pub(crate) fn verify_password(plain: &str, hash: &str) -> ResultLedger<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = %e, "argon2 parse hash error");
        LedgerError::Encryption(format!("stored password hash is malformed: {e}"))
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("Secur3P@ss").unwrap();
        assert_ne!(hash, "Secur3P@ss");
        assert!(verify_password("Secur3P@ss", &hash).unwrap());
        assert!(!verify_password("wrong-pass", &hash).unwrap());
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }

    #[test]
    fn registration_reports_every_violation() {
        let registration = Registration {
            username: "abc".to_string(),
            password: "short".to_string(),
            role: Role::User,
        };
        let errors = registration.validate().unwrap_err();

        assert!(errors.has_field("username"));
        assert!(errors.has_field("password"));
        assert_eq!(errors.violations().len(), 2);
    }

    #[test]
    fn registration_accepts_bounds() {
        let registration = Registration {
            username: "abcd".to_string(),
            password: "12345678".to_string(),
            role: Role::Admin,
        };
        assert!(registration.validate().is_ok());

        let registration = Registration {
            username: "a".repeat(32),
            password: "p".repeat(16),
            role: Role::User,
        };
        assert!(registration.validate().is_ok());
    }

    #[test]
    fn update_rejects_bad_id_and_name() {
        let update = UserUpdate {
            id: 0,
            username: "a".repeat(33),
            role: Role::User,
            enabled: true,
        };
        let errors = update.validate().unwrap_err();

        assert!(errors.has_field("id"));
        assert!(errors.has_field("username"));
    }
}
