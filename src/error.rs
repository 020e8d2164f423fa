use crate::domain::money::Money;
use thiserror::Error;

/// Coarse classification used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected input; never reaches the ledger.
    Validation,
    /// Retried on the next reconciliation tick, never shown to a user.
    Transient,
    /// Reported synchronously to the caller.
    Conflict,
    /// The ledger cannot be trusted; the process should stop.
    Fatal,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid order number: {0:?}")]
    InvalidOrderNumber(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("order {0} is already registered by another user")]
    OrderOwnedByAnotherUser(String),
    #[error("a withdrawal against order {0} is already recorded")]
    DuplicateWithdrawal(String),
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Money, available: Money },
    #[error("order {0} not found")]
    OrderNotFound(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl LedgerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::InvalidOrderNumber(_)
            | LedgerError::ValidationError(_)
            | LedgerError::CsvError(_) => ErrorClass::Validation,
            LedgerError::OrderOwnedByAnotherUser(_)
            | LedgerError::DuplicateWithdrawal(_)
            | LedgerError::InsufficientBalance { .. } => ErrorClass::Conflict,
            LedgerError::OrderNotFound(_) => ErrorClass::Transient,
            LedgerError::IoError(_) | LedgerError::InternalError(_) => ErrorClass::Fatal,
            #[cfg(feature = "storage-rocksdb")]
            LedgerError::StorageError(_) => ErrorClass::Fatal,
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        LedgerError::InternalError(Box::new(std::io::Error::other(message.into())))
    }
}

/// Failure of a single accrual lookup. Always retried on the next tick.
#[derive(Error, Debug)]
pub enum AccrualError {
    #[error("accrual service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed accrual response: {0}")]
    Payload(String),
    #[error("unexpected accrual status {0}")]
    UnexpectedStatus(u16),
}

impl AccrualError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Transient
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
