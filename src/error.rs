use crate::domain::ids::AccountId;
use thiserror::Error;

/// Failures raised by a storage backend.
///
/// This is also the cause carried by every `UnexpectedError` outcome, except
/// for [`StoreError::ParentMissing`] which the ledger maps to a domain outcome.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An insert referenced a parent row that does not exist.
    #[error("referenced {entity} {id} does not exist")]
    ParentMissing { entity: &'static str, id: u64 },
    #[error("{entity} {id} does not exist")]
    RowMissing { entity: &'static str, id: u64 },
    #[error("timed out waiting for the lock on account {account}")]
    LockTimeout { account: AccountId },
    #[error("corrupted row: {0}")]
    Corrupted(String),
    /// The task was dropped by the dispatch layer before it produced an outcome.
    #[error("task aborted before producing an outcome")]
    TaskAborted,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl StoreError {
    pub fn is_parent_missing(&self) -> bool {
        matches!(self, StoreError::ParentMissing { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Validation failures of the monetary value objects.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("balance must not be negative")]
    NegativeBalance,
}

/// Synchronous rejection of a ledger call. No outcome is ever produced for a
/// rejected call.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// The queue is full and every worker is busy. Retry later.
    #[error("dispatch queue is saturated")]
    Saturated,
    #[error("ledger is shut down")]
    ShutDown,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl From<DomainError> for SubmitError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NonPositiveAmount => SubmitError::InvalidArgument("amount must be positive"),
            DomainError::NegativeBalance => {
                SubmitError::InvalidArgument("initial balance must not be negative")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Command error: {0}")]
    CommandError(String),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
