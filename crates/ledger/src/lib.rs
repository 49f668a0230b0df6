//! Bank card ledger: encrypted card records, their owners and balance
//! transfers between cards, persisted through `sea-orm`.

pub use access::{Principal, Role};
pub use cards::{
    Card, CardNumber, CardNumberSource, CardStatus, CardUpdate, CardView, RandomCardNumbers,
};
pub use codec::{CardCodec, canonical_number, mask};
pub use error::{FieldViolation, LedgerError, ValidationErrors};
pub use money::Money;
pub use ops::{Ledger, LedgerBuilder};
pub use users::{Registration, UserUpdate, UserView};

mod access;
pub mod cards;
mod codec;
mod error;
mod locks;
mod money;
mod ops;
mod repository;
pub mod users;
mod util;

pub type ResultLedger<T> = Result<T, LedgerError>;
