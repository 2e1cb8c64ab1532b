//! The ledger operations as storage transactions.
//!
//! These functions run synchronously on the calling thread; the engine calls
//! them from its worker threads. Each one opens its own transaction and turns
//! every storage failure into the `UnexpectedError` variant of its outcome.

use super::locking::{LockedPair, lock_pair};
use super::outcome::{
    CreateAccountOutcome, CreateUserOutcome, GetAccountOutcome, GetTransferOutcome, Outcome,
    TransferOutcome,
};
use crate::domain::account::Balance;
use crate::domain::ids::{AccountId, TransferId, UserId};
use crate::domain::ports::{LedgerStore, StoreTransaction};
use crate::domain::transfer::{NewTransfer, TransferRequest};
use crate::error::StoreResult;
use chrono::Utc;
use tracing::{debug, error, info, warn};

enum Decision<T> {
    Commit(T),
    Rollback(T),
}

fn run_in_transaction<T, F>(store: &dyn LedgerStore, operation: &'static str, body: F) -> T
where
    T: Outcome,
    F: FnOnce(&mut dyn StoreTransaction) -> StoreResult<Decision<T>>,
{
    let mut tx = match store.begin() {
        Ok(tx) => tx,
        Err(e) => {
            error!(operation, error = %e, "failed to open transaction");
            return T::unexpected(e);
        }
    };

    match body(tx.as_mut()) {
        Ok(Decision::Commit(outcome)) => match tx.commit() {
            Ok(()) => outcome,
            Err(e) => {
                error!(operation, error = %e, "commit failed");
                T::unexpected(e)
            }
        },
        Ok(Decision::Rollback(outcome)) => {
            if let Err(e) = tx.rollback() {
                warn!(operation, error = %e, "rollback failed");
            }
            outcome
        }
        Err(e) => {
            error!(operation, error = %e, "storage failure, rolling back");
            if let Err(rollback_err) = tx.rollback() {
                warn!(operation, error = %rollback_err, "rollback failed");
            }
            T::unexpected(e)
        }
    }
}

pub fn create_user(store: &dyn LedgerStore, name: &str) -> CreateUserOutcome {
    run_in_transaction(store, "create_user", |tx| {
        let id = tx.insert_user(name)?;
        debug!(user = %id, "user created");
        Ok(Decision::Commit(CreateUserOutcome::Created(id)))
    })
}

pub fn create_account(
    store: &dyn LedgerStore,
    owner: UserId,
    balance: Balance,
) -> CreateAccountOutcome {
    run_in_transaction(store, "create_account", |tx| {
        match tx.insert_account(owner, balance) {
            Ok(id) => {
                debug!(account = %id, owner = %owner, %balance, "account created");
                Ok(Decision::Commit(CreateAccountOutcome::Created(id)))
            }
            Err(e) if e.is_parent_missing() => {
                Ok(Decision::Rollback(CreateAccountOutcome::UserNotFound))
            }
            Err(e) => Err(e),
        }
    })
}

/// Reads without taking the row lock, so a transfer in flight is not waited for.
pub fn get_account(
    store: &dyn LedgerStore,
    user_id: UserId,
    account_id: AccountId,
) -> GetAccountOutcome {
    run_in_transaction(store, "get_account", |tx| {
        let outcome = match tx.find_account(account_id)? {
            Some(account) if account.is_owned_by(user_id) => GetAccountOutcome::Found(account),
            _ => GetAccountOutcome::NotFound,
        };
        Ok(Decision::Rollback(outcome))
    })
}

pub fn get_transfer(
    store: &dyn LedgerStore,
    user_id: UserId,
    transfer_id: TransferId,
) -> GetTransferOutcome {
    run_in_transaction(store, "get_transfer", |tx| {
        let outcome = match tx.find_transfer(transfer_id)? {
            Some(transfer) if transfer.user_id == user_id => GetTransferOutcome::Found(transfer),
            _ => GetTransferOutcome::NotFound,
        };
        Ok(Decision::Rollback(outcome))
    })
}

/// Moves `amount` from the source to the destination account and records the audit row.
///
/// Checks run in a fixed order: source exists, requester owns the source,
/// destination exists, source covers the amount. Ownership is checked before
/// the destination so a stranger cannot probe which accounts exist.
pub fn transfer(store: &dyn LedgerStore, request: &TransferRequest) -> TransferOutcome {
    let outcome = run_in_transaction(store, "transfer", |tx| execute_transfer(tx, request));
    if let TransferOutcome::Completed(id) = outcome {
        info!(
            transfer = %id,
            request_id = request.request_id(),
            src = %request.src_account_id(),
            dst = %request.dst_account_id(),
            amount = %request.amount(),
            "transfer committed"
        );
    }
    outcome
}

fn execute_transfer(
    tx: &mut dyn StoreTransaction,
    request: &TransferRequest,
) -> StoreResult<Decision<TransferOutcome>> {
    let LockedPair { src, dst } =
        lock_pair(tx, request.src_account_id(), request.dst_account_id())?;

    let Some(src) = src else {
        return Ok(Decision::Rollback(TransferOutcome::AccountNotFound(
            request.src_account_id(),
        )));
    };
    if !src.is_owned_by(request.user_id()) {
        return Ok(Decision::Rollback(TransferOutcome::NotOwner));
    }
    let Some(dst) = dst else {
        return Ok(Decision::Rollback(TransferOutcome::AccountNotFound(
            request.dst_account_id(),
        )));
    };

    let Some(entry) =
        NewTransfer::between(request.request_id(), &src, &dst, request.amount(), Utc::now())
    else {
        debug!(account = %src.id, balance = %src.balance, amount = %request.amount(), "insufficient funds");
        return Ok(Decision::Rollback(TransferOutcome::InsufficientFunds));
    };

    debug!(account = %src.id, balance = %entry.src_after, "set balance");
    tx.update_balance(src.id, entry.src_after)?;
    debug!(account = %dst.id, balance = %entry.dst_after, "set balance");
    tx.update_balance(dst.id, entry.dst_after)?;

    let id = tx.insert_transfer(entry)?;
    Ok(Decision::Commit(TransferOutcome::Completed(id)))
}
