use std::{
    fmt,
    ops::{Add, Neg, Sub},
    str::FromStr,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// Signed money amount backed by an arbitrary-precision decimal.
///
/// Use this type for **all** monetary values in the ledger (balances and
/// transfer amounts) to avoid floating-point drift. Card balances are never
/// negative; the sign only shows up on rejected inputs.
///
/// # Examples
///
/// ```rust
/// use ledger::Money;
///
/// let amount: Money = "400.89".parse().unwrap();
/// assert!(amount.is_positive());
/// assert_eq!(amount.to_string(), "400.89");
/// ```
///
/// Parsing accepts `.` or `,` as decimal separator:
///
/// ```rust
/// use ledger::Money;
///
/// assert_eq!("10,5".parse::<Money>().unwrap(), "10.50".parse::<Money>().unwrap());
/// assert!("ten".parse::<Money>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    #[must_use]
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying decimal.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Text form used by the `balance` column.
    pub(crate) fn to_storage(self) -> String {
        self.0.to_string()
    }

    /// Reads the `balance` column back. Anything unreadable is a damaged row.
    pub(crate) fn from_storage(value: &str) -> Result<Self, LedgerError> {
        Decimal::from_str(value)
            .map(Money)
            .map_err(|_| {
                LedgerError::CorruptedRecord(format!("stored balance {value:?} is not a number"))
            })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl FromStr for Money {
    type Err = LedgerError;

    /// Parses a decimal string.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    /// Exponents, grouping separators and empty strings are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::InvalidAmount("empty amount".to_string()));
        }

        let normalized = trimmed.replace(',', ".");
        let digits = normalized
            .strip_prefix(['-', '+'])
            .unwrap_or(normalized.as_str());
        let valid = !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
            && digits.chars().filter(|c| *c == '.').count() <= 1
            && digits.chars().any(|c| c.is_ascii_digit());
        if !valid {
            return Err(LedgerError::InvalidAmount(format!("invalid amount: {trimmed}")));
        }

        Decimal::from_str(&normalized)
            .map(Money)
            .map_err(|_| LedgerError::InvalidAmount(format!("amount out of range: {trimmed}")))
    }
}
