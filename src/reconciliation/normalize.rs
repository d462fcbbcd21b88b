//! Normalization of raw CSV records into canonical transactions
//!
//! Two record shapes are understood. System ledger rows carry an explicit
//! transaction type and a full RFC 3339 timestamp:
//!
//! ```text
//! id,amount,DEBIT|CREDIT,2024-01-01T10:00:00Z
//! ```
//!
//! Bank export rows carry a signed amount and a calendar date only:
//!
//! ```text
//! id,-950,2024-01-01
//! ```
//!
//! Both parsers fail fast on the first malformed field.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use csv::StringRecord;
use std::str::FromStr;

use crate::types::*;
use crate::utils::time::start_of_day;

const SYSTEM_RECORD_FIELDS: usize = 4;
const BANK_RECORD_FIELDS: usize = 3;

fn expect_fields(record: &StringRecord, expected: usize, line: usize) -> ReconResult<()> {
    if record.len() != expected {
        return Err(ReconError::MalformedRecord {
            line,
            reason: format!("expected {} fields, got {}", expected, record.len()),
        });
    }
    Ok(())
}

fn parse_amount(raw: &str, line: usize) -> ReconResult<BigDecimal> {
    BigDecimal::from_str(raw).map_err(|_| ReconError::MalformedRecord {
        line,
        reason: format!("invalid amount '{}'", raw),
    })
}

/// Parse a system ledger record: `[id, amount, type, rfc3339-timestamp]`
///
/// The type field must equal `DEBIT` or `CREDIT` exactly; anything else
/// fails with [`ReconError::InvalidTransactionType`].
pub fn parse_system_record(record: &StringRecord, line: usize) -> ReconResult<Transaction> {
    expect_fields(record, SYSTEM_RECORD_FIELDS, line)?;

    let id = record[0].to_string();
    let amount = parse_amount(&record[1], line)?;

    let tx_type = match &record[2] {
        "DEBIT" => TransactionType::Debit,
        "CREDIT" => TransactionType::Credit,
        other => {
            return Err(ReconError::InvalidTransactionType {
                tx_type: other.to_string(),
                id,
            })
        }
    };

    let raw_time = &record[3];
    let occurred_at = DateTime::parse_from_rfc3339(raw_time)
        .map_err(|_| ReconError::MalformedRecord {
            line,
            reason: format!("invalid timestamp '{}'", raw_time),
        })?
        .with_timezone(&Utc);

    Ok(Transaction {
        id,
        amount,
        tx_type,
        occurred_at,
    })
}

/// Parse a bank export record: `[id, signed-amount, yyyy-mm-dd]`
///
/// A negative amount becomes a debit with the absolute value; anything
/// else is a credit. The date has no time-of-day component and is pinned
/// to midnight UTC, since bank rows are only ever compared by calendar
/// date.
pub fn parse_bank_record(record: &StringRecord, line: usize) -> ReconResult<Transaction> {
    expect_fields(record, BANK_RECORD_FIELDS, line)?;

    let id = record[0].to_string();
    let signed_amount = parse_amount(&record[1], line)?;

    let (amount, tx_type) = if signed_amount < BigDecimal::from(0) {
        (signed_amount.abs(), TransactionType::Debit)
    } else {
        (signed_amount, TransactionType::Credit)
    };

    let raw_date = &record[2];
    let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
        ReconError::MalformedRecord {
            line,
            reason: format!("invalid date '{}'", raw_date),
        }
    })?;

    Ok(Transaction {
        id,
        amount,
        tx_type,
        occurred_at: start_of_day(date),
    })
}
