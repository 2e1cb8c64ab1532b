//! Volatile store used by default and in tests.

use crate::config::DEFAULT_LOCK_TIMEOUT_MS;
use crate::domain::account::{Account, Balance};
use crate::domain::ids::{AccountId, TransferId, UserId};
use crate::domain::ports::{LedgerStore, StoreTransaction};
use crate::domain::transfer::{NewTransfer, Transfer};
use crate::domain::user::User;
use crate::error::{StoreError, StoreResult};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    accounts: HashMap<AccountId, Account>,
    transfers: HashMap<TransferId, Transfer>,
}

/// Identity column. Values handed out to rolled-back inserts are not reused.
#[derive(Default)]
struct Sequence(AtomicU64);

impl Sequence {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

struct Shared {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashSet<AccountId>>,
    released: Condvar,
    users: Sequence,
    accounts: Sequence,
    transfers: Sequence,
    lock_timeout: Duration,
}

/// A thread-safe in-memory transactional store.
///
/// Committed rows live in shared tables; each transaction buffers its writes
/// and applies them in one step on commit, so readers see either all of a
/// transaction's writes or none of them. Account rows can be locked
/// exclusively; a waiter gives up with [`StoreError::LockTimeout`] after the
/// configured timeout.
///
/// `Clone` shares the underlying tables.
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::with_lock_timeout(Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS))
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                row_locks: Mutex::new(HashSet::new()),
                released: Condvar::new(),
                users: Sequence::default(),
                accounts: Sequence::default(),
                transfers: Sequence::default(),
                lock_timeout,
            }),
        }
    }

    pub fn user_count(&self) -> usize {
        self.shared.tables.read().users.len()
    }

    pub fn account_count(&self) -> usize {
        self.shared.tables.read().accounts.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.shared.tables.read().transfers.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for InMemoryStore {
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        Ok(Box::new(InMemoryTransaction {
            shared: &self.shared,
            held: Vec::new(),
            pending: Tables::default(),
        }))
    }
}

pub struct InMemoryTransaction<'a> {
    shared: &'a Shared,
    held: Vec<AccountId>,
    pending: Tables,
}

impl InMemoryTransaction<'_> {
    fn user_exists(&self, id: UserId) -> bool {
        self.pending.users.contains_key(&id) || self.shared.tables.read().users.contains_key(&id)
    }

    fn account(&self, id: AccountId) -> Option<Account> {
        if let Some(account) = self.pending.accounts.get(&id) {
            return Some(account.clone());
        }
        self.shared.tables.read().accounts.get(&id).cloned()
    }

    fn acquire(&mut self, id: AccountId) -> StoreResult<()> {
        if self.held.contains(&id) {
            return Ok(());
        }

        let shared = self.shared;
        let deadline = Instant::now() + shared.lock_timeout;
        let mut locked = shared.row_locks.lock();
        while locked.contains(&id) {
            if shared.released.wait_until(&mut locked, deadline).timed_out()
                && locked.contains(&id)
            {
                return Err(StoreError::LockTimeout { account: id });
            }
        }
        locked.insert(id);
        drop(locked);

        self.held.push(id);
        Ok(())
    }

    fn release(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let mut locked = self.shared.row_locks.lock();
        for id in self.held.drain(..) {
            locked.remove(&id);
        }
        drop(locked);
        self.shared.released.notify_all();
    }
}

impl StoreTransaction for InMemoryTransaction<'_> {
    fn insert_user(&mut self, name: &str) -> StoreResult<UserId> {
        let id = UserId(self.shared.users.next());
        self.pending.users.insert(
            id,
            User {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    fn insert_account(&mut self, owner: UserId, balance: Balance) -> StoreResult<AccountId> {
        if !self.user_exists(owner) {
            return Err(StoreError::ParentMissing {
                entity: "user",
                id: owner.get(),
            });
        }
        let id = AccountId(self.shared.accounts.next());
        self.pending.accounts.insert(
            id,
            Account {
                id,
                owner_id: owner,
                balance,
            },
        );
        Ok(id)
    }

    fn find_account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.account(id))
    }

    fn lock_account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        self.acquire(id)?;
        debug!(account = %id, "row lock acquired");
        Ok(self.account(id))
    }

    fn update_balance(&mut self, id: AccountId, balance: Balance) -> StoreResult<()> {
        let mut account = self.account(id).ok_or(StoreError::RowMissing {
            entity: "account",
            id: id.get(),
        })?;
        account.balance = balance;
        self.pending.accounts.insert(id, account);
        Ok(())
    }

    fn insert_transfer(&mut self, transfer: NewTransfer) -> StoreResult<TransferId> {
        for account in [transfer.src_account_id, transfer.dst_account_id] {
            if self.account(account).is_none() {
                return Err(StoreError::ParentMissing {
                    entity: "account",
                    id: account.get(),
                });
            }
        }
        if !self.user_exists(transfer.user_id) {
            return Err(StoreError::ParentMissing {
                entity: "user",
                id: transfer.user_id.get(),
            });
        }

        let id = TransferId(self.shared.transfers.next());
        self.pending
            .transfers
            .insert(id, transfer.into_transfer(id));
        Ok(id)
    }

    fn find_transfer(&mut self, id: TransferId) -> StoreResult<Option<Transfer>> {
        if let Some(transfer) = self.pending.transfers.get(&id) {
            return Ok(Some(transfer.clone()));
        }
        Ok(self.shared.tables.read().transfers.get(&id).cloned())
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        let pending = std::mem::take(&mut self.pending);
        {
            let mut tables = self.shared.tables.write();
            tables.users.extend(pending.users);
            tables.accounts.extend(pending.accounts);
            tables.transfers.extend(pending.transfers);
        }
        self.release();
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StoreResult<()> {
        // Dropping discards the buffered writes and releases the row locks.
        drop(self);
        Ok(())
    }
}

impl Drop for InMemoryTransaction<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
