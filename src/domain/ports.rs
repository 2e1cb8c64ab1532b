//! Storage ports implemented by the infrastructure layer.

use super::account::{Account, Balance};
use super::ids::{AccountId, TransferId, UserId};
use super::transfer::{NewTransfer, Transfer};
use crate::error::StoreResult;
use std::sync::Arc;

/// A transactional store of users, accounts and transfers.
///
/// Every ledger operation runs in its own transaction opened with
/// [`LedgerStore::begin`]. Implementations must be safe to share between the
/// worker threads.
pub trait LedgerStore: Send + Sync {
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;

/// An open storage transaction.
///
/// Writes become visible to other transactions only on [`commit`]. Row locks
/// taken with [`lock_account`] are exclusive and held until the transaction
/// commits, rolls back or is dropped; dropping without committing rolls back.
///
/// [`commit`]: StoreTransaction::commit
/// [`lock_account`]: StoreTransaction::lock_account
pub trait StoreTransaction {
    fn insert_user(&mut self, name: &str) -> StoreResult<UserId>;

    /// Fails with `StoreError::ParentMissing` when `owner` does not exist.
    fn insert_account(&mut self, owner: UserId, balance: Balance) -> StoreResult<AccountId>;

    /// Reads the latest committed row (or this transaction's own write) without locking.
    fn find_account(&mut self, id: AccountId) -> StoreResult<Option<Account>>;

    /// Acquires the exclusive row lock on `id`, then reads the row.
    ///
    /// Blocks while another transaction holds the lock. Locking the same id
    /// twice within one transaction does not block.
    fn lock_account(&mut self, id: AccountId) -> StoreResult<Option<Account>>;

    fn update_balance(&mut self, id: AccountId, balance: Balance) -> StoreResult<()>;

    /// Fails with `StoreError::ParentMissing` when either account or the user
    /// does not exist.
    fn insert_transfer(&mut self, transfer: NewTransfer) -> StoreResult<TransferId>;

    fn find_transfer(&mut self, id: TransferId) -> StoreResult<Option<Transfer>>;

    fn commit(self: Box<Self>) -> StoreResult<()>;

    fn rollback(self: Box<Self>) -> StoreResult<()>;
}
