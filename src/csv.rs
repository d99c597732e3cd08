use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

use crate::Amount;
use crate::engine::{Journal, JournalError};
use crate::model::{Command, PayoutId, UserId, WalletTransaction};

/// Errors that can occur when reading or writing csv
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{command}'")]
    UnrecognizedType { line: usize, command: String },

    #[error("line {line}: {command} missing {field}")]
    MissingField {
        line: usize,
        command: &'static str,
        field: &'static str,
    },

    #[error("line {line}: invalid {field}: {message}")]
    InvalidValue {
        line: usize,
        field: &'static str,
        message: String,
    },

    #[error("failed to write csv: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush csv: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    user: Option<UserId>,
    payout: Option<PayoutId>,
    amount: Option<String>,
    status: Option<String>,
    method: Option<String>,
    destination: Option<String>,
    actor: Option<UserId>,
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct WalletRow {
    user: UserId,
    balance: String,
    pending: String,
    available: String,
}

#[derive(Debug, Serialize)]
struct JournalRow<'a> {
    id: u64,
    user: UserId,
    amount: String,
    kind: &'static str,
    payout: Option<PayoutId>,
    description: &'a str,
    created_at: String,
}

/// Read replay commands from a csv file
pub fn read_commands(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Command, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_row(line, row)
        }))
}

fn parse_row(line: usize, row: InputRow) -> Result<Command, CsvError> {
    let command = match row.r#type.as_str() {
        "open" => "open",
        "credit" => "credit",
        "request" => "request",
        "transition" => "transition",
        other => {
            return Err(CsvError::UnrecognizedType {
                line,
                command: other.to_string(),
            });
        }
    };
    let missing = |field| CsvError::MissingField {
        line,
        command,
        field,
    };

    match command {
        "open" => {
            let user = row.user.ok_or_else(|| missing("user"))?;
            Ok(Command::Open {
                user,
                name: row.notes.unwrap_or_else(|| format!("Affiliate #{user}")),
            })
        }
        "credit" => Ok(Command::Credit {
            user: row.user.ok_or_else(|| missing("user"))?,
            amount: parse_amount(line, row.amount.ok_or_else(|| missing("amount"))?)?,
            description: row.notes.unwrap_or_else(|| "order commission".to_string()),
        }),
        "request" => {
            let method = row.method.ok_or_else(|| missing("method"))?;
            Ok(Command::Request {
                user: row.user.ok_or_else(|| missing("user"))?,
                amount: parse_amount(line, row.amount.ok_or_else(|| missing("amount"))?)?,
                method: method.parse().map_err(|message| CsvError::InvalidValue {
                    line,
                    field: "method",
                    message,
                })?,
                destination: row.destination.ok_or_else(|| missing("destination"))?,
            })
        }
        _ => {
            let status = row.status.ok_or_else(|| missing("status"))?;
            Ok(Command::Transition {
                payout: row.payout.ok_or_else(|| missing("payout"))?,
                status: status.parse().map_err(|message| CsvError::InvalidValue {
                    line,
                    field: "status",
                    message,
                })?,
                actor: row.actor.ok_or_else(|| missing("actor"))?,
                notes: row.notes,
            })
        }
    }
}

fn parse_amount(line: usize, raw: String) -> Result<Amount, CsvError> {
    raw.parse().map_err(|e: rust_decimal::Error| CsvError::InvalidValue {
        line,
        field: "amount",
        message: e.to_string(),
    })
}

/// Write wallet snapshots `(user, balance, pending, available)` in csv format
pub fn write_wallets(
    out: impl io::Write,
    wallets: impl IntoIterator<Item = (UserId, Amount, Amount, Amount)>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(out);

    for (user, balance, pending, available) in wallets {
        let row = WalletRow {
            user,
            balance: balance.to_string(),
            pending: pending.to_string(),
            available: available.to_string(),
        };
        writer.serialize(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Appends every wallet transaction to a csv file, flushing each row.
pub struct CsvJournal {
    writer: Mutex<csv::Writer<File>>,
}

impl CsvJournal {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(csv::Writer::from_writer(file)),
        })
    }
}

impl Journal for CsvJournal {
    fn record(&self, tx: &WalletTransaction) -> Result<(), JournalError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::other("journal lock poisoned"))?;
        writer.serialize(JournalRow {
            id: tx.id,
            user: tx.user_id,
            amount: tx.amount.to_string(),
            kind: tx.kind.as_str(),
            payout: tx.payout_id,
            description: &tx.description,
            created_at: tx.created_at.to_rfc3339(),
        })?;
        writer.flush()?;
        Ok(())
    }
}
