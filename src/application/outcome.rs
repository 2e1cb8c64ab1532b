//! Terminal outcomes of the ledger operations.
//!
//! Each operation reports exactly one variant of its outcome enum. Domain
//! conditions (missing rows, wrong owner, insufficient funds) are regular
//! variants; only storage failures end up in `UnexpectedError`.

use crate::domain::account::Account;
use crate::domain::ids::{AccountId, TransferId, UserId};
use crate::domain::transfer::Transfer;
use crate::error::StoreError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Common behaviour of the outcome enums.
pub trait Outcome: Send + 'static {
    /// Wraps a storage failure.
    fn unexpected(cause: StoreError) -> Self;

    /// Short snake_case name of the variant.
    fn label(&self) -> &'static str;
}

#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(UserId),
    UnexpectedError(StoreError),
}

#[derive(Debug)]
pub enum CreateAccountOutcome {
    Created(AccountId),
    UserNotFound,
    UnexpectedError(StoreError),
}

/// `NotFound` also covers accounts owned by someone else.
#[derive(Debug)]
pub enum GetAccountOutcome {
    Found(Account),
    NotFound,
    UnexpectedError(StoreError),
}

/// `NotFound` also covers transfers made by someone else.
#[derive(Debug)]
pub enum GetTransferOutcome {
    Found(Transfer),
    NotFound,
    UnexpectedError(StoreError),
}

#[derive(Debug)]
pub enum TransferOutcome {
    Completed(TransferId),
    AccountNotFound(AccountId),
    NotOwner,
    InsufficientFunds,
    UnexpectedError(StoreError),
}

impl Outcome for CreateUserOutcome {
    fn unexpected(cause: StoreError) -> Self {
        Self::UnexpectedError(cause)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::UnexpectedError(_) => "unexpected_error",
        }
    }
}

impl Outcome for CreateAccountOutcome {
    fn unexpected(cause: StoreError) -> Self {
        Self::UnexpectedError(cause)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::UserNotFound => "user_not_found",
            Self::UnexpectedError(_) => "unexpected_error",
        }
    }
}

impl Outcome for GetAccountOutcome {
    fn unexpected(cause: StoreError) -> Self {
        Self::UnexpectedError(cause)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::NotFound => "not_found",
            Self::UnexpectedError(_) => "unexpected_error",
        }
    }
}

impl Outcome for GetTransferOutcome {
    fn unexpected(cause: StoreError) -> Self {
        Self::UnexpectedError(cause)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::NotFound => "not_found",
            Self::UnexpectedError(_) => "unexpected_error",
        }
    }
}

impl Outcome for TransferOutcome {
    fn unexpected(cause: StoreError) -> Self {
        Self::UnexpectedError(cause)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::AccountNotFound(_) => "account_not_found",
            Self::NotOwner => "not_owner",
            Self::InsufficientFunds => "insufficient_funds",
            Self::UnexpectedError(_) => "unexpected_error",
        }
    }
}

/// The single outcome of an accepted ledger call, produced on a worker thread.
///
/// Await it from async code or call [`Pending::wait`] from a plain thread.
/// If the task is dropped before it reports (a panicking task, a task dropped
/// at shutdown), the outcome resolves to `UnexpectedError(StoreError::TaskAborted)`,
/// so a caller always receives exactly one outcome.
#[must_use = "the outcome is the only report of what the ledger did"]
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
}

impl<T: Outcome> Pending<T> {
    pub(crate) fn channel() -> (Reporter<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (Reporter { tx }, Self { rx })
    }

    /// Blocks the current thread until the outcome arrives.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn wait(self) -> T {
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| T::unexpected(StoreError::TaskAborted))
    }
}

impl<T: Outcome> Future for Pending<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| T::unexpected(StoreError::TaskAborted)))
    }
}

/// Sending half of a [`Pending`]. Consumed by the one report it makes.
pub(crate) struct Reporter<T> {
    tx: oneshot::Sender<T>,
}

impl<T: Outcome> Reporter<T> {
    pub(crate) fn report(self, outcome: T) {
        if let Err(outcome) = self.tx.send(outcome) {
            tracing::debug!(outcome = outcome.label(), "caller dropped the outcome receiver");
        }
    }
}
