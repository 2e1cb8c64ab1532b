use crate::domain::ids::{AccountId, TransferId, UserId};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use uuid::Uuid;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum CommandKind {
    CreateUser,
    CreateAccount,
    Transfer,
    GetAccount,
    GetTransfer,
}

/// One raw row of a command script: `command, user, id, to, amount, text`.
#[derive(Debug, Deserialize)]
struct CommandRecord {
    command: CommandKind,
    user: Option<u64>,
    id: Option<u64>,
    to: Option<u64>,
    amount: Option<Decimal>,
    text: Option<String>,
}

/// A ledger call read from a command script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "CommandRecord")]
pub enum Command {
    CreateUser {
        name: String,
    },
    CreateAccount {
        user: UserId,
        initial_balance: Decimal,
    },
    Transfer {
        user: UserId,
        src: AccountId,
        dst: AccountId,
        amount: Decimal,
        request_id: String,
    },
    GetAccount {
        user: UserId,
        account: AccountId,
    },
    GetTransfer {
        user: UserId,
        transfer: TransferId,
    },
}

impl Command {
    /// The `command` column value this command was read from.
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateUser { .. } => "create_user",
            Command::CreateAccount { .. } => "create_account",
            Command::Transfer { .. } => "transfer",
            Command::GetAccount { .. } => "get_account",
            Command::GetTransfer { .. } => "get_transfer",
        }
    }
}

fn required<T>(value: Option<T>, command: &str, column: &str) -> Result<T> {
    value.ok_or_else(|| LedgerError::CommandError(format!("{command} requires `{column}`")))
}

impl TryFrom<CommandRecord> for Command {
    type Error = LedgerError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let command = match record.command {
            CommandKind::CreateUser => Command::CreateUser {
                name: required(record.text, "create_user", "text")?,
            },
            CommandKind::CreateAccount => Command::CreateAccount {
                user: required(record.user, "create_account", "user")?.into(),
                initial_balance: record.amount.unwrap_or(Decimal::ZERO),
            },
            CommandKind::Transfer => Command::Transfer {
                user: required(record.user, "transfer", "user")?.into(),
                src: required(record.id, "transfer", "id")?.into(),
                dst: required(record.to, "transfer", "to")?.into(),
                amount: required(record.amount, "transfer", "amount")?,
                request_id: record
                    .text
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
            },
            CommandKind::GetAccount => Command::GetAccount {
                user: required(record.user, "get_account", "user")?.into(),
                account: required(record.id, "get_account", "id")?.into(),
            },
            CommandKind::GetTransfer => Command::GetTransfer {
                user: required(record.user, "get_transfer", "user")?.into(),
                transfer: required(record.id, "get_transfer", "id")?.into(),
            },
        };
        Ok(command)
    }
}

/// Reads ledger commands from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and accepting short rows, and
/// yields one `Result<Command>` per row so a bad row does not end the script.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes the remaining rows.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
