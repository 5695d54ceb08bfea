//! Error types shared across the service.

use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown member: {0}")]
    UnknownMember(String),

    #[error("splits sum to {splits}, expense total is {total}")]
    SplitMismatch { total: Decimal, splits: Decimal },

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("split amount may not be negative, got {0}")]
    NegativeSplit(Decimal),

    #[error("expense has no splits")]
    EmptySplits,

    #[error("member already exists: {0}")]
    DuplicateMember(String),

    #[error("balances do not sum to zero, residual {0}")]
    UnbalancedLedger(Decimal),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Validation failures are the caller's fault and map to 4xx responses;
    /// everything else is a server-side failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::UnknownMember(_)
                | Error::SplitMismatch { .. }
                | Error::NonPositiveAmount(_)
                | Error::NegativeSplit(_)
                | Error::EmptySplits
                | Error::DuplicateMember(_)
        )
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<bson::ser::Error> for Error {
    fn from(err: bson::ser::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
