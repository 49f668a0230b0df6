//! The module contains the `Card` record, its lifecycle status and the views
//! handed out at the ledger boundary.

use std::{fmt, str::FromStr};

use chrono::{Months, NaiveDate};
use rand::Rng;
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    LedgerError, Money, ResultLedger, ValidationErrors,
    codec::{self, CardCodec},
};

/// Years a freshly issued card stays valid.
pub const VALIDITY_YEARS: u32 = 5;

/// Card lifecycle status.
///
/// Any status may follow any other: changes are administrative overrides, not
/// a state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    Active,
    Blocked,
    Expired,
}

impl CardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Blocked => "BLOCKED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ACTIVE" => Ok(Self::Active),
            "BLOCKED" => Ok(Self::Blocked),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(LedgerError::InvalidStatus(other.to_string())),
        }
    }
}

/// A plain 16-digit card number.
///
/// `Debug` and `Display` only ever print the masked form, so the clear number
/// cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct CardNumber(String);

impl CardNumber {
    /// Builds a card number from user input, ignoring whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        codec::canonical_number(raw).map(Self)
    }

    /// Builds a card number from a value in `[10^15, 10^16)`.
    pub fn from_u64(value: u64) -> Option<Self> {
        Self::parse(&value.to_string())
    }

    /// The clear digits. Only the ledger should call this.
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        codec::mask(&self.0)
    }
}

impl fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CardNumber").field(&self.masked()).finish()
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// A bank card.
#[derive(Clone, Debug)]
pub struct Card {
    pub id: Uuid,
    pub number: CardNumber,
    pub expiry_date: NaiveDate,
    pub status: CardStatus,
    pub balance: Money,
    pub owner_id: i64,
    pub(crate) version: i64,
}

impl Card {
    /// A new active card with a zero balance.
    pub fn issue(number: CardNumber, owner_id: i64, issued_on: NaiveDate) -> Self {
        Self {
            id: Uuid::now_v7(),
            number,
            expiry_date: expiry_for(issued_on),
            status: CardStatus::Active,
            balance: Money::ZERO,
            owner_id,
            version: 0,
        }
    }

    pub(crate) fn from_model(model: Model, codec: &CardCodec) -> ResultLedger<Self> {
        let plain = codec.decrypt(&model.number_cipher)?;
        let number = CardNumber::parse(&plain).ok_or_else(|| {
            LedgerError::Encryption(format!("card {} holds a malformed number", model.id))
        })?;
        Ok(Self {
            id: model.id,
            number,
            expiry_date: model.expiry_date,
            status: model.status.parse().map_err(|_| {
                LedgerError::CorruptedRecord(format!(
                    "card {} has unknown status {:?}",
                    model.id, model.status
                ))
            })?,
            balance: Money::from_storage(&model.balance)?,
            owner_id: model.owner_id,
            version: model.version,
        })
    }

    pub(crate) fn to_active_model(&self, codec: &CardCodec) -> ResultLedger<ActiveModel> {
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id),
            number_cipher: ActiveValue::Set(codec.encrypt(self.number.expose())?),
            number_digest: ActiveValue::Set(codec.digest(self.number.expose())),
            expiry_date: ActiveValue::Set(self.expiry_date),
            status: ActiveValue::Set(self.status.as_str().to_string()),
            balance: ActiveValue::Set(self.balance.to_storage()),
            version: ActiveValue::Set(self.version),
            owner_id: ActiveValue::Set(self.owner_id),
        })
    }
}

/// Issue date plus five years. February 29th clamps to February 28th.
pub fn expiry_for(issued_on: NaiveDate) -> NaiveDate {
    issued_on
        .checked_add_months(Months::new(VALIDITY_YEARS * 12))
        .unwrap_or(NaiveDate::MAX)
}

/// Output-facing view of a card. The number is always masked.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CardView {
    pub id: Uuid,
    pub number: String,
    pub expiry_date: NaiveDate,
    pub status: CardStatus,
    pub balance: Money,
    pub owner_id: i64,
    pub owner_name: String,
}

impl CardView {
    pub(crate) fn new(card: &Card, owner_name: &str) -> Self {
        Self {
            id: card.id,
            number: card.number.masked(),
            expiry_date: card.expiry_date,
            status: card.status,
            balance: card.balance,
            owner_id: card.owner_id,
            owner_name: owner_name.to_string(),
        }
    }
}

/// Administrative full replacement of a card's mutable fields.
#[derive(Clone, Debug)]
pub struct CardUpdate {
    /// Card number as typed, spaces allowed (`1111 2222 3333 4444`).
    pub number: String,
    pub expiry_date: NaiveDate,
    pub status: CardStatus,
    pub balance: Money,
}

impl CardUpdate {
    /// Checks the number field, reporting every broken rule.
    ///
    /// A negative balance is reported separately as
    /// [`LedgerError::InvalidAmount`] by the ledger.
    pub fn validate(&self) -> Result<CardNumber, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let digits: String = self.number.chars().filter(|c| !c.is_whitespace()).collect();

        if digits.is_empty() {
            errors.push("number", "must not be blank");
        } else {
            if !digits.chars().all(|c| c.is_ascii_digit()) {
                errors.push("number", "must contain digits only");
            }
            if digits.chars().count() != codec::CARD_NUMBER_LEN {
                errors.push("number", "must be exactly 16 digits");
            }
        }

        match CardNumber::parse(&digits) {
            Some(number) if errors.is_empty() => Ok(number),
            _ => Err(errors),
        }
    }
}

/// Smallest and largest 16-digit numbers.
pub const FIRST_CARD_NUMBER: u64 = 1_000_000_000_000_000;
pub const LAST_CARD_NUMBER: u64 = 9_999_999_999_999_999;

/// Where freshly issued card numbers come from.
pub trait CardNumberSource: Send + Sync + fmt::Debug {
    /// A candidate number. Values outside the 16-digit range are discarded.
    fn next_number(&self) -> u64;
}

/// Uniform draw over the full 16-digit range.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomCardNumbers;

impl CardNumberSource for RandomCardNumbers {
    fn next_number(&self) -> u64 {
        rand::thread_rng().gen_range(FIRST_CARD_NUMBER..=LAST_CARD_NUMBER)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cards")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub number_cipher: String,
    #[sea_orm(unique)]
    pub number_digest: String,
    pub expiry_date: Date,
    pub status: String,
    pub balance: String,
    pub version: i64,
    pub owner_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Owner,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
