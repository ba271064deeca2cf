use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::model::{Account, TransactionRequest, TransactionType};
use crate::replay::Command;
use crate::{Amount, AmountError};

/// Errors that can occur when reading or writing csv files
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation '{op}'")]
    UnrecognizedOp { line: usize, op: String },

    #[error("line {line}: unrecognized direction '{direction}'")]
    UnrecognizedDirection { line: usize, direction: String },

    #[error("line {line}: {op} missing {field}")]
    MissingField {
        line: usize,
        op: String,
        field: &'static str,
    },

    #[error("line {line}: {source}")]
    Amount { line: usize, source: AmountError },

    #[error("failed to write accounts: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush accounts: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    op: String,
    user: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    user: &'a str,
    balance: String,
}

/// Read replay commands from a csv file
pub fn read_commands(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Command, CsvError>>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path.as_ref())
        .map_err(|source| CsvError::Open {
            path: path.as_ref().display().to_string(),
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
    let op = row.op.to_ascii_lowercase();
    let amount = |mandatory: bool| -> Result<Amount, CsvError> {
        match row.amount.as_deref() {
            Some(raw) => raw
                .parse()
                .map_err(|source| CsvError::Amount { line, source }),
            None if mandatory => Err(CsvError::MissingField {
                line,
                op: op.clone(),
                field: "amount",
            }),
            None => Ok(Amount::ZERO),
        }
    };
    let required = |value: &Option<String>, field: &'static str| {
        value.clone().ok_or_else(|| CsvError::MissingField {
            line,
            op: op.clone(),
            field,
        })
    };

    let natural = match op.as_str() {
        "open" => {
            let balance = amount(false)?;
            let currency = if balance > Amount::ZERO {
                required(&row.currency, "currency")?
            } else {
                row.currency.clone().unwrap_or_default()
            };
            return Ok(Command::Open {
                user_id: row.user.clone(),
                balance,
                currency,
            });
        }
        "load" => TransactionType::Credit,
        "authorize" => TransactionType::Debit,
        _ => {
            return Err(CsvError::UnrecognizedOp {
                line,
                op: row.op.clone(),
            });
        }
    };

    let kind = match row.direction.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => natural,
        Some("credit") => TransactionType::Credit,
        Some("debit") => TransactionType::Debit,
        Some(other) => {
            return Err(CsvError::UnrecognizedDirection {
                line,
                direction: other.to_string(),
            });
        }
    };

    let message_id = required(&row.message, "message")?;
    let request = TransactionRequest {
        user_id: row.user.clone(),
        message_id: message_id.clone(),
        amount: amount(true)?,
        currency: required(&row.currency, "currency")?,
        kind,
    };
    let path_message_id = row.path.clone().unwrap_or(message_id);

    Ok(match natural {
        TransactionType::Credit => Command::Load {
            path_message_id,
            request,
        },
        TransactionType::Debit => Command::Authorize {
            path_message_id,
            request,
        },
    })
}

/// Write account balances in csv format
pub fn write_accounts<'a>(
    accounts: impl IntoIterator<Item = &'a Account>,
    out: impl io::Write,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(out);

    for account in accounts {
        writer.serialize(OutputRow {
            user: &account.user_id,
            balance: account.balance.to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}
