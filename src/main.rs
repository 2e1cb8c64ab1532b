use clap::Parser;
use ledger_engine::application::engine::LedgerEngine;
use ledger_engine::application::outcome::{Outcome, Pending, TransferOutcome};
use ledger_engine::config::LedgerConfig;
use ledger_engine::domain::ports::LedgerStoreRef;
use ledger_engine::domain::transfer::TransferRequest;
use ledger_engine::error::SubmitError;
use ledger_engine::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use ledger_engine::infrastructure::rocksdb::RocksDBStore;
use ledger_engine::interfaces::csv::command_reader::{Command, CommandReader};
use ledger_engine::interfaces::csv::outcome_writer::{OutcomeRecord, OutcomeWriter};
use ledger_engine::logging::init_logging;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Pause before resubmitting a call rejected because the workers are saturated.
const SATURATED_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// JSON configuration file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Calls that may wait for a worker before new ones are rejected
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// How long a transfer waits for an account lock, in milliseconds
    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn ledger_config(&self) -> Result<LedgerConfig> {
        let mut config = match &self.config {
            Some(path) => LedgerConfig::from_file(path).into_diagnostic()?,
            None => LedgerConfig::default(),
        };
        if let Some(workers) = self.workers {
            config.dispatch.workers = workers;
        }
        if let Some(queue_capacity) = self.queue_capacity {
            config.dispatch.queue_capacity = queue_capacity;
        }
        if let Some(lock_timeout_ms) = self.lock_timeout_ms {
            config.lock_timeout_ms = lock_timeout_ms;
        }
        config.validate().into_diagnostic()?;
        Ok(config)
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&PathBuf>, config: &LedgerConfig) -> Result<LedgerStoreRef> {
    let store: LedgerStoreRef = match db_path {
        Some(path) => Arc::new(RocksDBStore::open(path, config.lock_timeout()).into_diagnostic()?),
        None => Arc::new(InMemoryStore::with_lock_timeout(config.lock_timeout())),
    };
    Ok(store)
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&PathBuf>, config: &LedgerConfig) -> Result<LedgerStoreRef> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    let store: LedgerStoreRef = Arc::new(InMemoryStore::with_lock_timeout(config.lock_timeout()));
    Ok(store)
}

/// Submits a call, retrying while the engine is saturated, and awaits its outcome.
async fn call<T, F>(mut submit: F) -> Result<T, SubmitError>
where
    T: Outcome,
    F: FnMut() -> Result<Pending<T>, SubmitError>,
{
    loop {
        match submit() {
            Ok(pending) => return Ok(pending.await),
            Err(SubmitError::Saturated) => tokio::time::sleep(SATURATED_BACKOFF).await,
            Err(e) => return Err(e),
        }
    }
}

fn record<T>(result: Result<T, SubmitError>, command: &'static str) -> OutcomeRecord
where
    for<'a> OutcomeRecord: From<&'a T>,
{
    match result {
        Ok(outcome) => OutcomeRecord::from(&outcome),
        Err(e) => {
            eprintln!("Error processing command: {}", e);
            OutcomeRecord::rejected(command)
        }
    }
}

async fn execute(engine: &LedgerEngine, command: Command) -> OutcomeRecord {
    let name = command.name();
    match command {
        Command::CreateUser { name: user_name } => {
            record(call(|| engine.create_user(user_name.as_str())).await, name)
        }
        Command::CreateAccount {
            user,
            initial_balance,
        } => record(
            call(|| engine.create_account(user, initial_balance)).await,
            name,
        ),
        Command::Transfer {
            user,
            src,
            dst,
            amount,
            request_id,
        } => match TransferRequest::new(request_id, user, src, dst, amount) {
            Ok(request) => record(call(|| engine.transfer(request.clone())).await, name),
            Err(e) => record::<TransferOutcome>(Err(e), name),
        },
        Command::GetAccount { user, account } => {
            record(call(|| engine.get_account(user, account)).await, name)
        }
        Command::GetTransfer { user, transfer } => {
            record(call(|| engine.get_transfer(user, transfer)).await, name)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = cli.ledger_config()?;
    let store = open_store(cli.db_path.as_ref(), &config)?;
    let engine = LedgerEngine::new(store, &config.dispatch).into_diagnostic()?;

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    let stdout = io::stdout();
    let mut writer = OutcomeWriter::new(stdout.lock());

    for command in reader.commands() {
        match command {
            Ok(command) => {
                let row = execute(&engine, command).await;
                writer.write(&row).into_diagnostic()?;
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }
    writer.flush().into_diagnostic()?;

    // Joining the workers blocks, so keep it off the runtime threads.
    tokio::task::spawn_blocking(move || engine.shutdown())
        .await
        .into_diagnostic()?;

    Ok(())
}
