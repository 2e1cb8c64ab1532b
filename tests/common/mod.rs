#![allow(dead_code)]

use ledger_engine::application::engine::LedgerEngine;
use ledger_engine::application::outcome::{
    CreateAccountOutcome, CreateUserOutcome, GetAccountOutcome, Outcome, Pending,
};
use ledger_engine::config::DispatchConfig;
use ledger_engine::domain::account::{Account, Balance};
use ledger_engine::domain::ids::{AccountId, TransferId, UserId};
use ledger_engine::domain::ports::{LedgerStore, LedgerStoreRef, StoreTransaction};
use ledger_engine::domain::transfer::{NewTransfer, Transfer};
use ledger_engine::error::{StoreError, StoreResult, SubmitError};
use ledger_engine::infrastructure::in_memory::InMemoryStore;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub fn engine_with(store: LedgerStoreRef, workers: usize, queue_capacity: usize) -> LedgerEngine {
    LedgerEngine::new(
        store,
        &DispatchConfig {
            workers,
            queue_capacity,
        },
    )
    .unwrap()
}

/// Submits until the engine accepts the call.
pub async fn submit<T, F>(mut call: F) -> Pending<T>
where
    T: Outcome,
    F: FnMut() -> Result<Pending<T>, SubmitError>,
{
    loop {
        match call() {
            Ok(pending) => return pending,
            Err(SubmitError::Saturated) => tokio::time::sleep(Duration::from_millis(1)).await,
            Err(e) => panic!("call rejected: {e}"),
        }
    }
}

pub async fn new_user(engine: &LedgerEngine, name: &str) -> UserId {
    match submit(|| engine.create_user(name)).await.await {
        CreateUserOutcome::Created(id) => id,
        other => panic!("user not created: {:?}", other),
    }
}

pub async fn new_account(engine: &LedgerEngine, owner: UserId, balance: Decimal) -> AccountId {
    match submit(|| engine.create_account(owner, balance)).await.await {
        CreateAccountOutcome::Created(id) => id,
        other => panic!("account not created: {:?}", other),
    }
}

pub async fn read_account(engine: &LedgerEngine, owner: UserId, id: AccountId) -> Account {
    match submit(|| engine.get_account(owner, id)).await.await {
        GetAccountOutcome::Found(account) => account,
        other => panic!("account not found: {:?}", other),
    }
}

fn injected() -> StoreError {
    StoreError::Io(std::io::Error::other("injected storage failure"))
}

/// A store whose every call fails with an IO error.
pub struct FailingStore {
    fail_on_begin: bool,
}

impl FailingStore {
    /// `begin` itself fails.
    pub fn unavailable() -> Self {
        Self {
            fail_on_begin: true,
        }
    }

    /// `begin` succeeds; every statement in the transaction fails.
    pub fn broken() -> Self {
        Self {
            fail_on_begin: false,
        }
    }
}

impl LedgerStore for FailingStore {
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        if self.fail_on_begin {
            return Err(injected());
        }
        Ok(Box::new(FailingTransaction))
    }
}

struct FailingTransaction;

impl StoreTransaction for FailingTransaction {
    fn insert_user(&mut self, _name: &str) -> StoreResult<UserId> {
        Err(injected())
    }

    fn insert_account(&mut self, _owner: UserId, _balance: Balance) -> StoreResult<AccountId> {
        Err(injected())
    }

    fn find_account(&mut self, _id: AccountId) -> StoreResult<Option<Account>> {
        Err(injected())
    }

    fn lock_account(&mut self, _id: AccountId) -> StoreResult<Option<Account>> {
        Err(injected())
    }

    fn update_balance(&mut self, _id: AccountId, _balance: Balance) -> StoreResult<()> {
        Err(injected())
    }

    fn insert_transfer(&mut self, _transfer: NewTransfer) -> StoreResult<TransferId> {
        Err(injected())
    }

    fn find_transfer(&mut self, _id: TransferId) -> StoreResult<Option<Transfer>> {
        Err(injected())
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        Err(injected())
    }

    fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

/// An in-memory store whose `begin` blocks while the gate is closed.
///
/// Lets a test pin every worker inside a transaction.
pub struct GatedStore {
    pub inner: InMemoryStore,
    pub gate: RwLock<()>,
    entered: AtomicUsize,
}

impl GatedStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            gate: RwLock::new(()),
            entered: AtomicUsize::new(0),
        }
    }

    /// Blocks until `count` transactions have reached the gate.
    pub fn wait_entered(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.entered.load(Ordering::SeqCst) < count {
            assert!(Instant::now() < deadline, "workers never reached the gate");
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl LedgerStore for GatedStore {
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let _open = self.gate.read();
        self.inner.begin()
    }
}

pub fn shared<S: LedgerStore + 'static>(store: S) -> (Arc<S>, LedgerStoreRef) {
    let store = Arc::new(store);
    let handle: LedgerStoreRef = store.clone();
    (store, handle)
}

/// Writes a command script: one user, two accounts of 1000, then `transfers`
/// transfers of 0.01 alternating between them.
pub fn generate_script(path: &std::path::Path, transfers: usize) -> Result<(), std::io::Error> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(["command", "user", "id", "to", "amount", "text"])?;
    wtr.write_record(["create_user", "", "", "", "", "bulk"])?;
    wtr.write_record(["create_account", "1", "", "", "1000", ""])?;
    wtr.write_record(["create_account", "1", "", "", "1000", ""])?;

    for i in 0..transfers {
        let (src, dst) = if i % 2 == 0 { ("1", "2") } else { ("2", "1") };
        let request_id = format!("bulk-{i}");
        wtr.write_record(["transfer", "1", src, dst, "0.01", request_id.as_str()])?;
    }
    wtr.write_record(["get_account", "1", "1", "", "", ""])?;
    wtr.write_record(["get_account", "1", "2", "", "", ""])?;
    wtr.flush()?;
    Ok(())
}
