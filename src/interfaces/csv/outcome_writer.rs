use crate::application::outcome::{
    CreateAccountOutcome, CreateUserOutcome, GetAccountOutcome, GetTransferOutcome, Outcome,
    TransferOutcome,
};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One output row: `command,outcome,id,balance`.
///
/// `id` is the row the outcome refers to (the created or found row, or the
/// missing account of a failed transfer). `balance` is the account balance for
/// `get_account` and the source balance after the move for `get_transfer`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub command: &'static str,
    pub outcome: &'static str,
    pub id: Option<u64>,
    pub balance: Option<Decimal>,
}

impl OutcomeRecord {
    fn new<T: Outcome>(command: &'static str, outcome: &T) -> Self {
        Self {
            command,
            outcome: outcome.label(),
            id: None,
            balance: None,
        }
    }

    /// Row for a call the engine refused to queue.
    pub fn rejected(command: &'static str) -> Self {
        Self {
            command,
            outcome: "rejected",
            id: None,
            balance: None,
        }
    }

    fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    fn balance(mut self, balance: Decimal) -> Self {
        self.balance = Some(balance);
        self
    }
}

impl From<&CreateUserOutcome> for OutcomeRecord {
    fn from(outcome: &CreateUserOutcome) -> Self {
        let record = Self::new("create_user", outcome);
        match outcome {
            CreateUserOutcome::Created(id) => record.id(id.get()),
            CreateUserOutcome::UnexpectedError(_) => record,
        }
    }
}

impl From<&CreateAccountOutcome> for OutcomeRecord {
    fn from(outcome: &CreateAccountOutcome) -> Self {
        let record = Self::new("create_account", outcome);
        match outcome {
            CreateAccountOutcome::Created(id) => record.id(id.get()),
            _ => record,
        }
    }
}

impl From<&GetAccountOutcome> for OutcomeRecord {
    fn from(outcome: &GetAccountOutcome) -> Self {
        let record = Self::new("get_account", outcome);
        match outcome {
            GetAccountOutcome::Found(account) => {
                record.id(account.id.get()).balance(account.balance.value())
            }
            _ => record,
        }
    }
}

impl From<&GetTransferOutcome> for OutcomeRecord {
    fn from(outcome: &GetTransferOutcome) -> Self {
        let record = Self::new("get_transfer", outcome);
        match outcome {
            GetTransferOutcome::Found(transfer) => record
                .id(transfer.id.get())
                .balance(transfer.src_after.value()),
            _ => record,
        }
    }
}

impl From<&TransferOutcome> for OutcomeRecord {
    fn from(outcome: &TransferOutcome) -> Self {
        let record = Self::new("transfer", outcome);
        match outcome {
            TransferOutcome::Completed(id) => record.id(id.get()),
            TransferOutcome::AccountNotFound(id) => record.id(id.get()),
            _ => record,
        }
    }
}

/// Writes outcome rows as CSV, header first.
pub struct OutcomeWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OutcomeWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write(&mut self, record: &OutcomeRecord) -> Result<()> {
        self.writer.serialize(record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
