//! Helper types shared across the tollgate crates.

pub mod b64;
pub mod money;

pub use b64::Base64Bytes;
pub use money::{MoneyAmount, MoneyAmountParseError};
