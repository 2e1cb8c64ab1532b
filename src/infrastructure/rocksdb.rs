//! Durable store on a RocksDB `TransactionDB`.

use crate::domain::account::{Account, Balance};
use crate::domain::ids::{AccountId, TransferId, UserId};
use crate::domain::ports::{LedgerStore, StoreTransaction};
use crate::domain::transfer::{NewTransfer, Transfer};
use crate::domain::user::User;
use crate::error::{StoreError, StoreResult};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, ErrorKind, IteratorMode, Options, Transaction,
    TransactionDB, TransactionDBOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Column Family for user rows.
pub const CF_USERS: &str = "users";
/// Column Family for account rows.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for transfer audit rows.
pub const CF_TRANSFERS: &str = "transfers";

struct Sequences {
    users: AtomicU64,
    accounts: AtomicU64,
    transfers: AtomicU64,
}

fn next_id(sequence: &AtomicU64) -> u64 {
    sequence.fetch_add(1, Ordering::Relaxed) + 1
}

/// A persistent store implementation using a RocksDB `TransactionDB`.
///
/// Users, accounts and transfers live in separate Column Families, keyed by
/// their big-endian id and encoded as JSON. Row locks are RocksDB's pessimistic
/// key locks (`get_for_update`), bounded by the TransactionDB lock timeout.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<TransactionDB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<TransactionDB>,
    sequences: Arc<Sequences>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist and resumes the id
    /// sequences after the highest stored id of each table.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    /// * `lock_timeout` - How long a transaction waits for a row lock.
    pub fn open<P: AsRef<Path>>(path: P, lock_timeout: Duration) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_db_opts = TransactionDBOptions::default();
        let timeout_ms = i64::try_from(lock_timeout.as_millis()).unwrap_or(i64::MAX);
        txn_db_opts.set_txn_lock_timeout(timeout_ms);

        let cfs = [CF_USERS, CF_ACCOUNTS, CF_TRANSFERS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db: TransactionDB =
            TransactionDB::open_cf_descriptors(&opts, &txn_db_opts, path, cfs)?;

        let sequences = Sequences {
            users: AtomicU64::new(last_id(&db, CF_USERS)?),
            accounts: AtomicU64::new(last_id(&db, CF_ACCOUNTS)?),
            transfers: AtomicU64::new(last_id(&db, CF_TRANSFERS)?),
        };
        info!(
            users = sequences.users.load(Ordering::Relaxed),
            accounts = sequences.accounts.load(Ordering::Relaxed),
            transfers = sequences.transfers.load(Ordering::Relaxed),
            "RocksDB store opened"
        );

        Ok(Self {
            db: Arc::new(db),
            sequences: Arc::new(sequences),
        })
    }
}

fn cf<'a>(db: &'a TransactionDB, name: &str) -> StoreResult<&'a ColumnFamily> {
    db.cf_handle(name).ok_or_else(|| {
        StoreError::Io(std::io::Error::other(format!(
            "{} column family not found",
            name
        )))
    })
}

fn last_id(db: &TransactionDB, name: &str) -> StoreResult<u64> {
    let handle = cf(db, name)?;
    match db.iterator_cf(handle, IteratorMode::End).next() {
        Some(item) => {
            let (key, _value) = item?;
            decode_key(&key)
        }
        None => Ok(0),
    }
}

fn decode_key(key: &[u8]) -> StoreResult<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StoreError::Corrupted(format!("invalid key length {}", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn encode<T: Serialize>(row: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(row)
        .map_err(|e| StoreError::Corrupted(format!("Serialization error: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: Option<Vec<u8>>) -> StoreResult<Option<T>> {
    bytes
        .map(|bytes| {
            serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupted(format!("Deserialization error: {}", e)))
        })
        .transpose()
}

impl LedgerStore for RocksDBStore {
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        Ok(Box::new(RocksDBTransaction {
            db: self.db.as_ref(),
            txn: self.db.transaction(),
            sequences: self.sequences.as_ref(),
        }))
    }
}

pub struct RocksDBTransaction<'a> {
    db: &'a TransactionDB,
    txn: Transaction<'a, TransactionDB>,
    sequences: &'a Sequences,
}

impl RocksDBTransaction<'_> {
    fn get<T: DeserializeOwned>(&self, table: &str, key: [u8; 8]) -> StoreResult<Option<T>> {
        let handle = cf(self.db, table)?;
        decode(self.txn.get_cf(handle, key)?)
    }

    fn exists(&self, table: &str, key: [u8; 8]) -> StoreResult<bool> {
        let handle = cf(self.db, table)?;
        Ok(self.txn.get_pinned_cf(handle, key)?.is_some())
    }

    fn put<T: Serialize>(&self, table: &str, key: [u8; 8], row: &T) -> StoreResult<()> {
        let handle = cf(self.db, table)?;
        self.txn.put_cf(handle, key, encode(row)?)?;
        Ok(())
    }
}

impl StoreTransaction for RocksDBTransaction<'_> {
    fn insert_user(&mut self, name: &str) -> StoreResult<UserId> {
        let id = UserId(next_id(&self.sequences.users));
        self.put(
            CF_USERS,
            id.to_key(),
            &User {
                id,
                name: name.to_string(),
            },
        )?;
        Ok(id)
    }

    fn insert_account(&mut self, owner: UserId, balance: Balance) -> StoreResult<AccountId> {
        if !self.exists(CF_USERS, owner.to_key())? {
            return Err(StoreError::ParentMissing {
                entity: "user",
                id: owner.get(),
            });
        }
        let id = AccountId(next_id(&self.sequences.accounts));
        self.put(
            CF_ACCOUNTS,
            id.to_key(),
            &Account {
                id,
                owner_id: owner,
                balance,
            },
        )?;
        Ok(id)
    }

    fn find_account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        self.get(CF_ACCOUNTS, id.to_key())
    }

    fn lock_account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        let handle = cf(self.db, CF_ACCOUNTS)?;
        let bytes = self
            .txn
            .get_for_update_cf(handle, id.to_key(), true)
            .map_err(|e| match e.kind() {
                ErrorKind::TimedOut | ErrorKind::Busy => StoreError::LockTimeout { account: id },
                _ => StoreError::from(e),
            })?;
        debug!(account = %id, "row lock acquired");
        decode(bytes)
    }

    fn update_balance(&mut self, id: AccountId, balance: Balance) -> StoreResult<()> {
        let mut account: Account = self
            .get(CF_ACCOUNTS, id.to_key())?
            .ok_or(StoreError::RowMissing {
                entity: "account",
                id: id.get(),
            })?;
        account.balance = balance;
        self.put(CF_ACCOUNTS, id.to_key(), &account)
    }

    fn insert_transfer(&mut self, transfer: NewTransfer) -> StoreResult<TransferId> {
        for account in [transfer.src_account_id, transfer.dst_account_id] {
            if !self.exists(CF_ACCOUNTS, account.to_key())? {
                return Err(StoreError::ParentMissing {
                    entity: "account",
                    id: account.get(),
                });
            }
        }
        if !self.exists(CF_USERS, transfer.user_id.to_key())? {
            return Err(StoreError::ParentMissing {
                entity: "user",
                id: transfer.user_id.get(),
            });
        }

        let id = TransferId(next_id(&self.sequences.transfers));
        let row: Transfer = transfer.into_transfer(id);
        self.put(CF_TRANSFERS, id.to_key(), &row)?;
        Ok(id)
    }

    fn find_transfer(&mut self, id: TransferId) -> StoreResult<Option<Transfer>> {
        self.get(CF_TRANSFERS, id.to_key())
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        self.txn.commit()?;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.txn.rollback()?;
        Ok(())
    }
}
