//! The ledger facade: argument checks, then dispatch to the worker pool.

use super::dispatch::WorkerPool;
use super::operations;
use super::outcome::{
    CreateAccountOutcome, CreateUserOutcome, GetAccountOutcome, GetTransferOutcome, Outcome,
    Pending, TransferOutcome,
};
use crate::config::DispatchConfig;
use crate::domain::account::Balance;
use crate::domain::ids::{AccountId, TransferId, UserId};
use crate::domain::ports::{LedgerStore, LedgerStoreRef};
use crate::domain::transfer::TransferRequest;
use crate::error::{Result, SubmitError};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Entry point of the ledger.
///
/// Every call validates its arguments, then hands the operation to the worker
/// pool and returns at once. The returned [`Pending`] resolves to the single
/// outcome of the operation. A call that cannot be queued fails synchronously
/// with a [`SubmitError`] and has no side effects.
pub struct LedgerEngine {
    store: LedgerStoreRef,
    pool: WorkerPool,
}

impl LedgerEngine {
    /// Creates an engine over `store` and starts its workers.
    pub fn new(store: LedgerStoreRef, config: &DispatchConfig) -> Result<Self> {
        Ok(Self {
            store,
            pool: WorkerPool::new(config)?,
        })
    }

    pub fn create_user(
        &self,
        name: impl Into<String>,
    ) -> Result<Pending<CreateUserOutcome>, SubmitError> {
        let name = name.into();
        self.dispatch(move |store| operations::create_user(store, &name))
    }

    pub fn create_account(
        &self,
        user_id: UserId,
        initial_balance: Decimal,
    ) -> Result<Pending<CreateAccountOutcome>, SubmitError> {
        if !user_id.is_valid() {
            return Err(SubmitError::InvalidArgument("user id must be greater than zero"));
        }
        let balance = Balance::new(initial_balance)?;
        self.dispatch(move |store| operations::create_account(store, user_id, balance))
    }

    /// Looks up an account owned by `user_id`.
    pub fn get_account(
        &self,
        user_id: UserId,
        account_id: AccountId,
    ) -> Result<Pending<GetAccountOutcome>, SubmitError> {
        if !user_id.is_valid() {
            return Err(SubmitError::InvalidArgument("user id must be greater than zero"));
        }
        if !account_id.is_valid() {
            return Err(SubmitError::InvalidArgument(
                "account id must be greater than zero",
            ));
        }
        self.dispatch(move |store| operations::get_account(store, user_id, account_id))
    }

    /// Looks up a transfer made from an account of `user_id`.
    pub fn get_transfer(
        &self,
        user_id: UserId,
        transfer_id: TransferId,
    ) -> Result<Pending<GetTransferOutcome>, SubmitError> {
        if !user_id.is_valid() {
            return Err(SubmitError::InvalidArgument("user id must be greater than zero"));
        }
        if !transfer_id.is_valid() {
            return Err(SubmitError::InvalidArgument(
                "transfer id must be greater than zero",
            ));
        }
        self.dispatch(move |store| operations::get_transfer(store, user_id, transfer_id))
    }

    pub fn transfer(
        &self,
        request: TransferRequest,
    ) -> Result<Pending<TransferOutcome>, SubmitError> {
        self.dispatch(move |store| operations::transfer(store, &request))
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.pool.queued()
    }

    /// Stops accepting calls and waits for every accepted call to finish.
    pub fn shutdown(mut self) {
        self.pool.shutdown();
    }

    fn dispatch<T, F>(&self, operation: F) -> Result<Pending<T>, SubmitError>
    where
        T: Outcome,
        F: FnOnce(&dyn LedgerStore) -> T + Send + 'static,
    {
        let (reporter, pending) = Pending::channel();
        let store = Arc::clone(&self.store);
        self.pool
            .submit(move || reporter.report(operation(store.as_ref())))?;
        Ok(pending)
    }
}
